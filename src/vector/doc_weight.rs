use std::cmp::Ordering;

use crate::vector::types::DocId;

/// A posting entry: one document and its quantized weight for a term.
///
/// Ordering is by document id first; the weight only breaks ties so that
/// `Ord` stays consistent with `Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocWeight {
    pub doc_id: DocId,
    pub weight: u8,
}

impl DocWeight {
    #[must_use]
    pub const fn new(doc_id: DocId, weight: u8) -> Self {
        Self { doc_id, weight }
    }
}

impl PartialOrd for DocWeight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DocWeight {
    fn cmp(&self, other: &Self) -> Ordering {
        self.doc_id
            .cmp(&other.doc_id)
            .then(self.weight.cmp(&other.weight))
    }
}
