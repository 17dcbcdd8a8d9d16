//! Document clusters and the doc-weight cursor used to walk them.
//!
//! A cluster is a slice of one term's posting list. Members are stored as
//! parallel `doc_ids`/`weights` arrays sorted by document id. The optional
//! summary vector bounds the score any member can reach, which lets the
//! query layer skip the whole cluster.

use crate::vector::doc_weight::DocWeight;
use crate::vector::sparse::SparseVector;
use crate::vector::types::DocId;

/// Forward-only cursor over `(doc_id, weight)` pairs in ascending doc order.
///
/// Exhaustion is reported with [`DocId::NO_MORE_DOCS`].
pub trait DocWeightIterator {
    /// Current document, or `None` before the first call to `next_doc`/`advance`.
    fn doc_id(&self) -> Option<DocId>;

    /// Weight at the current position. Zero when unpositioned or exhausted.
    fn weight(&self) -> u8;

    /// Moves to the next member.
    fn next_doc(&mut self) -> DocId;

    /// Moves to the first member whose id is `>= target`.
    fn advance(&mut self, target: DocId) -> DocId;

    /// Number of members not yet visited.
    fn cost(&self) -> usize;
}

/// A group of postings sharing one summary and one skip policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentCluster {
    summary: Option<SparseVector>,
    doc_ids: Vec<DocId>,
    weights: Vec<u8>,
    should_not_skip: bool,
}

impl DocumentCluster {
    /// Builds a cluster from postings in any order. The input is not modified.
    #[must_use]
    pub fn new(summary: Option<SparseVector>, docs: &[DocWeight], should_not_skip: bool) -> Self {
        let mut sorted = docs.to_vec();
        sorted.sort_by_key(|doc| doc.doc_id);

        let (doc_ids, weights) = sorted.into_iter().map(|d| (d.doc_id, d.weight)).unzip();
        Self {
            summary,
            doc_ids,
            weights,
            should_not_skip,
        }
    }

    /// Rebuilds a cluster from stored arrays.
    ///
    /// Returns `None` when the arrays disagree in length or are out of order.
    #[must_use]
    pub fn from_parts(
        summary: Option<SparseVector>,
        doc_ids: Vec<DocId>,
        weights: Vec<u8>,
        should_not_skip: bool,
    ) -> Option<Self> {
        if doc_ids.len() != weights.len() || doc_ids.windows(2).any(|w| w[0] > w[1]) {
            return None;
        }
        Some(Self {
            summary,
            doc_ids,
            weights,
            should_not_skip,
        })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.doc_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> Option<&SparseVector> {
        self.summary.as_ref()
    }

    /// Replaces the summary. `None` means members are always scored directly.
    pub fn set_summary(&mut self, summary: Option<SparseVector>) {
        self.summary = summary;
    }

    #[must_use]
    pub fn should_not_skip(&self) -> bool {
        self.should_not_skip
    }

    pub fn set_should_not_skip(&mut self, should_not_skip: bool) {
        self.should_not_skip = should_not_skip;
    }

    #[must_use]
    pub fn doc_ids(&self) -> &[DocId] {
        &self.doc_ids
    }

    #[must_use]
    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    /// Members in ascending doc order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = DocWeight> + '_ {
        self.doc_ids
            .iter()
            .zip(&self.weights)
            .map(|(&doc_id, &weight)| DocWeight::new(doc_id, weight))
    }

    #[must_use]
    pub fn cursor(&self) -> ClusterCursor<'_> {
        ClusterCursor {
            doc_ids: &self.doc_ids,
            weights: &self.weights,
            position: None,
        }
    }

    /// Shallow size, both member arrays, and the summary when present.
    #[must_use]
    pub fn ram_bytes_used(&self) -> usize {
        std::mem::size_of::<Self>()
            + std::mem::size_of_val(self.doc_ids.as_slice())
            + std::mem::size_of_val(self.weights.as_slice())
            + self.summary.as_ref().map_or(0, SparseVector::ram_bytes_used)
    }

    /// Nested accountable resources.
    #[must_use]
    pub fn child_resources(&self) -> Vec<&SparseVector> {
        self.summary.iter().collect()
    }
}

/// Cursor returned by [`DocumentCluster::cursor`].
#[derive(Debug, Clone)]
pub struct ClusterCursor<'a> {
    doc_ids: &'a [DocId],
    weights: &'a [u8],
    position: Option<usize>,
}

impl ClusterCursor<'_> {
    fn current(&self) -> DocId {
        self.position
            .and_then(|idx| self.doc_ids.get(idx).copied())
            .unwrap_or(DocId::NO_MORE_DOCS)
    }
}

impl DocWeightIterator for ClusterCursor<'_> {
    fn doc_id(&self) -> Option<DocId> {
        self.position.map(|_| self.current())
    }

    fn weight(&self) -> u8 {
        self.position
            .and_then(|idx| self.weights.get(idx).copied())
            .unwrap_or(0)
    }

    fn next_doc(&mut self) -> DocId {
        let next = self
            .position
            .map_or(0, |idx| (idx + 1).min(self.doc_ids.len()));
        self.position = Some(next);
        self.current()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        let start = self.position.unwrap_or(0).min(self.doc_ids.len());
        let offset = self.doc_ids[start..].partition_point(|&doc| doc < target);
        self.position = Some(start + offset);
        self.current()
    }

    fn cost(&self) -> usize {
        match self.position {
            None => self.doc_ids.len(),
            Some(idx) => self.doc_ids.len().saturating_sub(idx + 1),
        }
    }
}
