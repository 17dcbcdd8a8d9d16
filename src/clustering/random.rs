//! Random-center clustering.
//!
//! # Algorithm
//! 1. Pick `ceil(len * cluster_ratio)` distinct postings as centers
//! 2. Expand each center's document vector to dense form
//! 3. Assign every posting to the center with the highest dot product
//! 4. Summarize each non-empty cluster
//!
//! One pass, no refinement. Postings whose document has no stored vector
//! are dropped.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use tracing::debug;

use crate::clustering::postings::summarize;
use crate::clustering::{ClusteringAlgorithm, ClusteringResult};
use crate::storage::SparseVectorReader;
use crate::vector::{DocWeight, DocumentCluster};

/// Clusters postings around randomly chosen members.
#[derive(Debug, Clone)]
pub struct RandomClustering<R> {
    summary_prune_ratio: f32,
    cluster_ratio: f32,
    reader: R,
    seed: Option<u64>,
}

impl<R: SparseVectorReader> RandomClustering<R> {
    pub fn new(summary_prune_ratio: f32, cluster_ratio: f32, reader: R) -> Self {
        Self {
            summary_prune_ratio,
            cluster_ratio,
            reader,
            seed: None,
        }
    }

    /// Fixes the center selection for reproducible builds.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }
}

impl<R: SparseVectorReader> ClusteringAlgorithm for RandomClustering<R> {
    fn cluster(&self, postings: &[DocWeight]) -> ClusteringResult<Vec<DocumentCluster>> {
        if postings.is_empty() {
            return Ok(Vec::new());
        }
        if self.cluster_ratio <= 0.0 {
            return Ok(vec![DocumentCluster::new(None, postings, true)]);
        }

        let len = postings.len();
        let num_clusters = ((len as f32 * self.cluster_ratio).ceil() as usize).clamp(1, len);

        let mut rng = self.rng();
        let centers = index::sample(&mut rng, len, num_clusters);
        let mut dense_centers: Vec<Vec<u8>> = Vec::with_capacity(num_clusters);
        for center in centers.iter() {
            let dense = self
                .reader
                .read(postings[center].doc_id)?
                .map(|vector| vector.to_dense_vector())
                .unwrap_or_default();
            dense_centers.push(dense);
        }

        let mut groups: Vec<Vec<DocWeight>> = vec![Vec::new(); num_clusters];
        let mut dropped = 0usize;
        for posting in postings {
            let Some(vector) = self.reader.read(posting.doc_id)? else {
                dropped += 1;
                continue;
            };

            let mut best = 0usize;
            let mut best_score = 0u32;
            for (idx, dense) in dense_centers.iter().enumerate() {
                let score = vector.dot_product(dense);
                if idx == 0 || score > best_score {
                    best = idx;
                    best_score = score;
                }
            }
            groups[best].push(*posting);
        }

        if dropped > 0 {
            debug!("Dropped {dropped} of {len} postings without stored vectors");
        }

        let mut clusters = Vec::with_capacity(num_clusters);
        for group in groups.into_iter().filter(|group| !group.is_empty()) {
            let mut cluster = DocumentCluster::new(None, &group, false);
            summarize(&mut cluster, &self.reader, self.summary_prune_ratio)?;
            clusters.push(cluster);
        }
        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryForwardIndex, SparseVectorWriter, StorageError, StorageResult};
    use crate::vector::{DocId, Item, SparseVector, TokenId};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn dw(id: u32, weight: u8) -> DocWeight {
        DocWeight::new(DocId::new(id), weight)
    }

    fn store(vectors: &[(u32, &[(TokenId, u8)])]) -> InMemoryForwardIndex {
        let index = InMemoryForwardIndex::new();
        for (id, pairs) in vectors {
            let vector = SparseVector::from_items(pairs.iter().map(|&(t, w)| Item::new(t, w)));
            index.insert(DocId::new(*id), Arc::new(vector)).unwrap();
        }
        index
    }

    fn assigned(clusters: &[DocumentCluster]) -> Vec<u32> {
        let mut ids: Vec<u32> = clusters
            .iter()
            .flat_map(|c| c.doc_ids().iter().map(|d| d.get()))
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_empty_input() {
        let clustering = RandomClustering::new(0.4, 0.5, InMemoryForwardIndex::new());
        assert!(clustering.cluster(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_zero_ratio_single_cluster_without_reads() {
        struct Unreadable;
        impl SparseVectorReader for Unreadable {
            fn read(&self, _doc_id: DocId) -> StorageResult<Option<Arc<SparseVector>>> {
                Err(StorageError::Unavailable("no reads expected".to_string()))
            }
        }

        let postings = vec![dw(3, 1), dw(1, 2), dw(2, 3)];
        let clusters = RandomClustering::new(0.4, 0.0, Unreadable)
            .cluster(&postings)
            .unwrap();
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].should_not_skip());
        assert!(clusters[0].summary().is_none());
        assert_eq!(assigned(&clusters), vec![1, 2, 3]);
    }

    #[test]
    fn test_disjoint_vectors_form_their_own_clusters() {
        let index = store(&[
            (0, &[(1, 10)]),
            (1, &[(2, 20)]),
            (2, &[(3, 30)]),
            (3, &[(4, 40)]),
            (4, &[(5, 50)]),
        ]);
        let postings: Vec<DocWeight> = (0..5).map(|id| dw(id, 1)).collect();
        let clusters = RandomClustering::new(0.4, 0.5, index)
            .with_seed(7)
            .cluster(&postings)
            .unwrap();

        assert_eq!(clusters.len(), 3);
        for cluster in &clusters {
            assert!(cluster.summary().is_some());
            assert!(!cluster.should_not_skip());
        }
        assert_eq!(assigned(&clusters), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_absent_vectors_are_dropped() {
        let index = store(&[(0, &[(1, 10)]), (2, &[(3, 30)]), (4, &[(5, 50)])]);
        let postings: Vec<DocWeight> = (0..5).map(|id| dw(id, 1)).collect();
        let clusters = RandomClustering::new(0.4, 0.5, index)
            .with_seed(1)
            .cluster(&postings)
            .unwrap();

        assert!(!clusters.is_empty());
        assert_eq!(assigned(&clusters), vec![0, 2, 4]);
    }

    #[test]
    fn test_members_are_unique() {
        let vectors: Vec<(u32, Vec<(TokenId, u8)>)> = (0..40)
            .map(|id| (id, vec![((id % 7) as TokenId, 10 + id as u8), (100, 5)]))
            .collect();
        let refs: Vec<(u32, &[(TokenId, u8)])> =
            vectors.iter().map(|(id, v)| (*id, v.as_slice())).collect();
        let index = store(&refs);
        let postings: Vec<DocWeight> = (0..40).map(|id| dw(id, 1)).collect();

        let clusters = RandomClustering::new(0.4, 0.25, index)
            .with_seed(42)
            .cluster(&postings)
            .unwrap();
        let ids = assigned(&clusters);
        let unique: HashSet<u32> = ids.iter().copied().collect();
        assert_eq!(ids.len(), 40);
        assert_eq!(unique.len(), 40);
        assert!(clusters.len() <= 10);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let index = Arc::new(store(&[
            (0, &[(1, 10), (2, 3)]),
            (1, &[(2, 20)]),
            (2, &[(1, 30), (3, 9)]),
            (3, &[(4, 40)]),
            (4, &[(2, 50), (4, 1)]),
            (5, &[(6, 60)]),
        ]));
        let postings: Vec<DocWeight> = (0..6).map(|id| dw(id, 1)).collect();
        let a = RandomClustering::new(0.4, 0.5, Arc::clone(&index))
            .with_seed(99)
            .cluster(&postings)
            .unwrap();
        let b = RandomClustering::new(0.4, 0.5, index)
            .with_seed(99)
            .cluster(&postings)
            .unwrap();
        assert_eq!(a, b);
    }
}
