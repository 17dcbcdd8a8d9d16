use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::vector::DocId;

/// Bounded min-heap keeping the `k` best `(doc, quantized score)` pairs.
///
/// Among equal scores the lower document id ranks higher, so the result is
/// deterministic regardless of visit order.
#[derive(Debug, Clone)]
pub struct TopKHeap {
    capacity: usize,
    heap: BinaryHeap<Reverse<(u32, Reverse<DocId>)>>,
}

impl TopKHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
        }
    }

    /// Offers a candidate. Returns `true` if it was kept.
    pub fn push(&mut self, doc_id: DocId, score: u32) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let entry = Reverse((score, Reverse(doc_id)));
        if self.heap.len() < self.capacity {
            self.heap.push(entry);
            return true;
        }
        match self.heap.peek() {
            Some(worst) if entry < *worst => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Lowest score currently kept.
    pub fn min_score(&self) -> Option<u32> {
        self.heap.peek().map(|Reverse((score, _))| *score)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drains into score-descending, doc-ascending order.
    pub fn into_sorted_vec(self) -> Vec<(DocId, u32)> {
        // `Reverse` flips the ascending sort into best-first.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse((score, Reverse(doc_id)))| (doc_id, score))
            .collect()
    }
}
