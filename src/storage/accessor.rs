//! Reader/writer contracts for the forward index and clustered postings.
//!
//! These four traits are the only way ingestion and query execution touch
//! stored data. Writers never overwrite: inserting a key that already exists
//! is a silent no-op, so concurrent inserts for the same key resolve to
//! exactly one winner.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::storage::StorageResult;
use crate::vector::{DocId, DocumentCluster, SparseVector, TokenId};

/// Fetches document vectors.
pub trait SparseVectorReader: Send + Sync {
    /// Returns `Ok(None)` for an unknown document. A stored empty vector is
    /// returned as `Some` with size zero.
    fn read(&self, doc_id: DocId) -> StorageResult<Option<Arc<SparseVector>>>;
}

/// Stores document vectors with skip-if-exists semantics.
pub trait SparseVectorWriter: Send + Sync {
    /// Returns `true` if the vector was stored, `false` if it was skipped.
    fn insert(&self, doc_id: DocId, vector: Arc<SparseVector>) -> StorageResult<bool>;
}

/// Owner of a reader and a writer bound to the same storage.
pub trait SparseVectorForwardIndex: Send + Sync {
    fn reader(&self) -> &dyn SparseVectorReader;
    fn writer(&self) -> &dyn SparseVectorWriter;
}

/// Fetches a term's clusters.
pub trait ClusteredPostingReader: Send + Sync {
    /// Returns `Ok(None)` for an unknown term.
    fn read(&self, term: TokenId) -> StorageResult<Option<Arc<PostingClusters>>>;

    /// All indexed terms in ascending order.
    fn terms(&self) -> BTreeSet<TokenId>;

    /// Number of indexed terms.
    fn size(&self) -> usize;
}

/// Stores a term's clusters with skip-if-exists semantics.
pub trait ClusteredPostingWriter: Send + Sync {
    fn insert(&self, term: TokenId, clusters: Vec<DocumentCluster>) -> StorageResult<bool>;
}

/// Owner of a clustered-posting reader and writer.
pub trait ClusteredPosting: Send + Sync {
    fn reader(&self) -> &dyn ClusteredPostingReader;
    fn writer(&self) -> &dyn ClusteredPostingWriter;
}

impl<T: SparseVectorReader + ?Sized> SparseVectorReader for &T {
    fn read(&self, doc_id: DocId) -> StorageResult<Option<Arc<SparseVector>>> {
        (**self).read(doc_id)
    }
}

impl<T: SparseVectorWriter + ?Sized> SparseVectorWriter for &T {
    fn insert(&self, doc_id: DocId, vector: Arc<SparseVector>) -> StorageResult<bool> {
        (**self).insert(doc_id, vector)
    }
}

impl<T: SparseVectorReader + ?Sized> SparseVectorReader for Arc<T> {
    fn read(&self, doc_id: DocId) -> StorageResult<Option<Arc<SparseVector>>> {
        (**self).read(doc_id)
    }
}

impl<T: SparseVectorWriter + ?Sized> SparseVectorWriter for Arc<T> {
    fn insert(&self, doc_id: DocId, vector: Arc<SparseVector>) -> StorageResult<bool> {
        (**self).insert(doc_id, vector)
    }
}

impl<T: ClusteredPostingReader + ?Sized> ClusteredPostingReader for Arc<T> {
    fn read(&self, term: TokenId) -> StorageResult<Option<Arc<PostingClusters>>> {
        (**self).read(term)
    }

    fn terms(&self) -> BTreeSet<TokenId> {
        (**self).terms()
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}

/// The clustered posting list of one term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingClusters {
    clusters: Vec<DocumentCluster>,
}

impl PostingClusters {
    #[must_use]
    pub fn new(clusters: Vec<DocumentCluster>) -> Self {
        Self { clusters }
    }

    #[must_use]
    pub fn clusters(&self) -> &[DocumentCluster] {
        &self.clusters
    }

    /// Number of clusters.
    #[must_use]
    pub fn size(&self) -> usize {
        self.clusters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total postings across every cluster.
    #[must_use]
    pub fn posting_count(&self) -> usize {
        self.clusters.iter().map(DocumentCluster::size).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentCluster> {
        self.clusters.iter()
    }

    #[must_use]
    pub fn ram_bytes_used(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .clusters
                .iter()
                .map(DocumentCluster::ram_bytes_used)
                .sum::<usize>()
    }
}

impl<'a> IntoIterator for &'a PostingClusters {
    type Item = &'a DocumentCluster;
    type IntoIter = std::slice::Iter<'a, DocumentCluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}
