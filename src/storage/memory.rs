//! DashMap-backed forward index and clustered posting store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::storage::{
    ClusteredPosting, ClusteredPostingReader, ClusteredPostingWriter, PostingClusters,
    SparseVectorForwardIndex, SparseVectorReader, SparseVectorWriter, StorageResult,
};
use crate::vector::{DocId, DocumentCluster, SparseVector, TokenId};

/// In-memory forward index with byte accounting and an optional budget.
///
/// With a budget the store behaves as a bounded cache: an insert that does
/// not fit evicts least recently used vectors until it does. A vector larger
/// than the whole budget is skipped and logged.
#[derive(Clone, Debug, Default)]
pub struct InMemoryForwardIndex {
    vectors: Arc<DashMap<DocId, Arc<SparseVector>>>,
    ram_bytes: Arc<AtomicUsize>,
    budget: Option<Arc<MemoryBudget>>,
}

#[derive(Debug)]
struct MemoryBudget {
    limit: usize,
    /// Access order of stored documents, least recent first.
    recency: Mutex<LruCache<DocId, ()>>,
}

impl InMemoryForwardIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_limit(limit_bytes: usize) -> Self {
        Self {
            budget: Some(Arc::new(MemoryBudget {
                limit: limit_bytes,
                recency: Mutex::new(LruCache::unbounded()),
            })),
            ..Self::default()
        }
    }

    /// Removes a vector and releases its accounting.
    pub fn erase(&self, doc_id: DocId) -> bool {
        match self.vectors.remove(&doc_id) {
            Some((_, vector)) => {
                self.ram_bytes
                    .fetch_sub(vector.ram_bytes_used(), Ordering::AcqRel);
                if let Some(budget) = &self.budget {
                    budget.recency.lock().pop(&doc_id);
                }
                true
            }
            None => false,
        }
    }

    pub fn ram_bytes_used(&self) -> usize {
        self.ram_bytes.load(Ordering::Acquire)
    }

    pub fn memory_limit(&self) -> Option<usize> {
        self.budget.as_ref().map(|budget| budget.limit)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, doc_id: DocId) -> bool {
        self.vectors.contains_key(&doc_id)
    }

    /// Snapshot of every stored vector ordered by document id.
    pub fn entries(&self) -> Vec<(DocId, Arc<SparseVector>)> {
        let mut entries: Vec<_> = self
            .vectors
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        entries.sort_unstable_by_key(|(doc_id, _)| *doc_id);
        entries
    }

    pub fn clear(&self) {
        self.vectors.clear();
        self.ram_bytes.store(0, Ordering::Release);
        if let Some(budget) = &self.budget {
            budget.recency.lock().clear();
        }
    }

    /// Claims `bytes` against the budget, evicting cold vectors as needed.
    ///
    /// The claim is taken before the check so concurrent inserts cannot
    /// overshoot the limit together.
    fn reserve(&self, budget: &MemoryBudget, bytes: usize) -> bool {
        if bytes > budget.limit {
            return false;
        }
        loop {
            let previous = self.ram_bytes.fetch_add(bytes, Ordering::AcqRel);
            if previous.saturating_add(bytes) <= budget.limit {
                return true;
            }
            self.ram_bytes.fetch_sub(bytes, Ordering::AcqRel);
            if !self.evict_least_recent(budget) {
                return false;
            }
        }
    }

    /// Drops the least recently used vector. False when nothing is evictable.
    fn evict_least_recent(&self, budget: &MemoryBudget) -> bool {
        let Some((victim, ())) = budget.recency.lock().pop_lru() else {
            return false;
        };
        if let Some((_, vector)) = self.vectors.remove(&victim) {
            self.ram_bytes
                .fetch_sub(vector.ram_bytes_used(), Ordering::AcqRel);
            debug!("Evicted vector for doc {victim} from the forward cache");
        }
        true
    }
}

impl SparseVectorReader for InMemoryForwardIndex {
    fn read(&self, doc_id: DocId) -> StorageResult<Option<Arc<SparseVector>>> {
        let hit = self.vectors.get(&doc_id).map(|entry| Arc::clone(entry.value()));
        if let (Some(_), Some(budget)) = (&hit, &self.budget) {
            budget.recency.lock().promote(&doc_id);
        }
        Ok(hit)
    }
}

impl SparseVectorWriter for InMemoryForwardIndex {
    fn insert(&self, doc_id: DocId, vector: Arc<SparseVector>) -> StorageResult<bool> {
        let bytes = vector.ram_bytes_used();
        let Some(budget) = &self.budget else {
            return Ok(match self.vectors.entry(doc_id) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(vector);
                    self.ram_bytes.fetch_add(bytes, Ordering::AcqRel);
                    true
                }
            });
        };

        if self.vectors.contains_key(&doc_id) {
            return Ok(false);
        }
        if !self.reserve(budget, bytes) {
            warn!(
                "Failed to cache vector for doc {doc_id} even after eviction: {bytes} bytes, {} byte budget",
                budget.limit
            );
            return Ok(false);
        }

        // The shard lock is released before the recency lock is taken.
        let inserted = match self.vectors.entry(doc_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(vector);
                true
            }
        };
        if inserted {
            budget.recency.lock().put(doc_id, ());
        } else {
            self.ram_bytes.fetch_sub(bytes, Ordering::AcqRel);
        }
        Ok(inserted)
    }
}

impl SparseVectorForwardIndex for InMemoryForwardIndex {
    fn reader(&self) -> &dyn SparseVectorReader {
        self
    }

    fn writer(&self) -> &dyn SparseVectorWriter {
        self
    }
}

/// In-memory term to clusters store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryClusteredPosting {
    postings: Arc<DashMap<TokenId, Arc<PostingClusters>>>,
    ram_bytes: Arc<AtomicUsize>,
}

impl InMemoryClusteredPosting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn erase(&self, term: TokenId) -> bool {
        match self.postings.remove(&term) {
            Some((_, clusters)) => {
                self.ram_bytes
                    .fetch_sub(clusters.ram_bytes_used(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Stores `clusters` for `term` in a single map write, returning the
    /// clusters it displaced.
    ///
    /// Readers see either the old or the new clusters, never a gap.
    pub fn replace(
        &self,
        term: TokenId,
        clusters: Vec<DocumentCluster>,
    ) -> Option<Arc<PostingClusters>> {
        let clusters = PostingClusters::new(clusters);
        self.ram_bytes
            .fetch_add(clusters.ram_bytes_used(), Ordering::Relaxed);
        let previous = self.postings.insert(term, Arc::new(clusters));
        if let Some(previous) = &previous {
            self.ram_bytes
                .fetch_sub(previous.ram_bytes_used(), Ordering::Relaxed);
        }
        previous
    }

    pub fn ram_bytes_used(&self) -> usize {
        self.ram_bytes.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Snapshot of every term ordered by token.
    pub fn entries(&self) -> Vec<(TokenId, Arc<PostingClusters>)> {
        let mut entries: Vec<_> = self
            .postings
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        entries.sort_unstable_by_key(|(term, _)| *term);
        entries
    }

    pub fn clear(&self) {
        self.postings.clear();
        self.ram_bytes.store(0, Ordering::Relaxed);
    }
}

impl ClusteredPostingReader for InMemoryClusteredPosting {
    fn read(&self, term: TokenId) -> StorageResult<Option<Arc<PostingClusters>>> {
        Ok(self.postings.get(&term).map(|entry| Arc::clone(entry.value())))
    }

    fn terms(&self) -> BTreeSet<TokenId> {
        self.postings.iter().map(|entry| *entry.key()).collect()
    }

    fn size(&self) -> usize {
        self.postings.len()
    }
}

impl ClusteredPostingWriter for InMemoryClusteredPosting {
    fn insert(&self, term: TokenId, clusters: Vec<DocumentCluster>) -> StorageResult<bool> {
        match self.postings.entry(term) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                let clusters = PostingClusters::new(clusters);
                self.ram_bytes
                    .fetch_add(clusters.ram_bytes_used(), Ordering::Relaxed);
                slot.insert(Arc::new(clusters));
                Ok(true)
            }
        }
    }
}

impl ClusteredPosting for InMemoryClusteredPosting {
    fn reader(&self) -> &dyn ClusteredPostingReader {
        self
    }

    fn writer(&self) -> &dyn ClusteredPostingWriter {
        self
    }
}
