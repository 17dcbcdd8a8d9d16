//! Posting-list helpers: top-k selection and cluster summaries.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::storage::{SparseVectorReader, StorageResult};
use crate::vector::{DocWeight, DocWeightIterator, DocumentCluster, Item, SparseVector, TokenId};

/// Keeps the `k` postings with the highest weight.
///
/// Returns every posting when `k >= postings.len()` and nothing when `k` is
/// zero. Order of the result is unspecified.
#[must_use]
pub fn top_k(postings: &[DocWeight], k: usize) -> Vec<DocWeight> {
    if postings.is_empty() || k == 0 {
        return Vec::new();
    }
    if k >= postings.len() {
        return postings.to_vec();
    }

    // Min-heap on weight; position breaks ties so earlier postings survive.
    let mut heap: BinaryHeap<Reverse<(u8, Reverse<usize>)>> = BinaryHeap::with_capacity(k + 1);
    for (position, posting) in postings.iter().enumerate() {
        heap.push(Reverse((posting.weight, Reverse(position))));
        if heap.len() > k {
            heap.pop();
        }
    }

    heap.into_iter()
        .map(|Reverse((_, Reverse(position)))| postings[position])
        .collect()
}

/// Builds and installs the summary of `cluster`.
///
/// The summary takes the per-token maximum across member vectors, then keeps
/// the heaviest tokens until their cumulative weight passes
/// `floor(total * summary_prune_ratio)`. Members without a stored vector are
/// ignored.
pub fn summarize(
    cluster: &mut DocumentCluster,
    reader: &dyn SparseVectorReader,
    summary_prune_ratio: f32,
) -> StorageResult<()> {
    let mut maxima: HashMap<TokenId, u8> = HashMap::new();
    let mut cursor = cluster.cursor();
    while !cursor.next_doc().is_terminated() {
        let Some(doc_id) = cursor.doc_id() else {
            break;
        };
        let Some(vector) = reader.read(doc_id)? else {
            continue;
        };
        for item in vector.iter() {
            maxima
                .entry(item.token)
                .and_modify(|weight| *weight = (*weight).max(item.weight))
                .or_insert(item.weight);
        }
    }

    let mut items: Vec<Item> = maxima
        .into_iter()
        .map(|(token, weight)| Item::new(token, weight))
        .collect();
    items.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.token.cmp(&b.token)));

    let total: u64 = items.iter().map(|item| u64::from(item.weight)).sum();
    let threshold = (total as f64 * f64::from(summary_prune_ratio)).floor() as u64;
    let mut cumulative = 0u64;
    let mut keep = 0usize;
    for item in &items {
        keep += 1;
        cumulative += u64::from(item.weight);
        if cumulative > threshold {
            break;
        }
    }
    items.truncate(keep);

    cluster.set_summary(Some(SparseVector::from_items(items)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryForwardIndex, SparseVectorWriter};
    use crate::vector::DocId;
    use std::sync::Arc;

    fn dw(id: u32, weight: u8) -> DocWeight {
        DocWeight::new(DocId::new(id), weight)
    }

    fn vector(pairs: &[(TokenId, u8)]) -> Arc<SparseVector> {
        Arc::new(SparseVector::from_items(
            pairs.iter().map(|&(t, w)| Item::new(t, w)),
        ))
    }

    #[test]
    fn test_top_k_selects_heaviest() {
        let postings = vec![dw(1, 10), dw(2, 250), dw(3, 30), dw(4, 200), dw(5, 5)];
        let mut selected = top_k(&postings, 2);
        selected.sort();
        assert_eq!(selected, vec![dw(2, 250), dw(4, 200)]);
    }

    #[test]
    fn test_top_k_edges() {
        let postings = vec![dw(1, 10), dw(2, 20)];
        assert!(top_k(&postings, 0).is_empty());
        assert!(top_k(&[], 5).is_empty());
        assert_eq!(top_k(&postings, 2), postings);
        assert_eq!(top_k(&postings, 10), postings);
    }

    #[test]
    fn test_top_k_treats_weights_as_unsigned() {
        let postings = vec![dw(1, 127), dw(2, 128), dw(3, 255)];
        let mut selected = top_k(&postings, 2);
        selected.sort();
        assert_eq!(selected, vec![dw(2, 128), dw(3, 255)]);
    }

    #[test]
    fn test_summarize_takes_max_and_prunes() {
        let index = InMemoryForwardIndex::new();
        index.insert(DocId::new(1), vector(&[(1, 100), (2, 10)])).unwrap();
        index.insert(DocId::new(2), vector(&[(1, 40), (3, 60)])).unwrap();

        let mut cluster = DocumentCluster::new(None, &[dw(1, 1), dw(2, 1)], false);
        // maxima {1:100, 2:10, 3:60}, total 170, threshold floor(85) = 85
        summarize(&mut cluster, &index, 0.5).unwrap();

        let summary = cluster.summary().unwrap();
        assert_eq!(summary.tokens(), &[1]);
        assert_eq!(summary.weights(), &[100]);
    }

    #[test]
    fn test_summarize_full_ratio_keeps_everything() {
        let index = InMemoryForwardIndex::new();
        index.insert(DocId::new(1), vector(&[(1, 100), (2, 10)])).unwrap();
        index.insert(DocId::new(2), vector(&[(3, 60)])).unwrap();

        let mut cluster = DocumentCluster::new(None, &[dw(2, 1), dw(1, 1)], false);
        summarize(&mut cluster, &index, 1.0).unwrap();

        let summary = cluster.summary().unwrap();
        assert_eq!(summary.tokens(), &[1, 2, 3]);
        assert_eq!(summary.weights(), &[100, 10, 60]);
    }

    #[test]
    fn test_summarize_ignores_absent_members() {
        let index = InMemoryForwardIndex::new();
        index.insert(DocId::new(1), vector(&[(7, 70)])).unwrap();

        let mut cluster = DocumentCluster::new(None, &[dw(1, 1), dw(9, 1)], false);
        summarize(&mut cluster, &index, 0.4).unwrap();
        assert_eq!(cluster.summary().unwrap().tokens(), &[7]);
    }

    #[test]
    fn test_summarize_without_vectors_is_empty() {
        let index = InMemoryForwardIndex::new();
        let mut cluster = DocumentCluster::new(None, &[dw(1, 1)], false);
        summarize(&mut cluster, &index, 0.4).unwrap();
        assert_eq!(cluster.summary().map(SparseVector::size), Some(0));
    }
}
