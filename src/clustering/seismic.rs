use tracing::debug;

use crate::clustering::postings::top_k;
use crate::clustering::{ClusteringAlgorithm, ClusteringResult};
use crate::vector::{DocWeight, DocumentCluster};

/// Posting lists shorter than this are kept as one unskippable cluster.
pub const MINIMAL_DOC_SIZE_TO_CLUSTER: usize = 10;

/// Cuts a posting list to its heaviest `n_postings` entries and hands the
/// rest to a clustering strategy.
#[derive(Debug, Clone)]
pub struct SeismicPostingClusterer<A> {
    n_postings: usize,
    algorithm: A,
}

impl<A: ClusteringAlgorithm> SeismicPostingClusterer<A> {
    pub fn new(n_postings: usize, algorithm: A) -> Self {
        Self {
            n_postings,
            algorithm,
        }
    }

    pub fn n_postings(&self) -> usize {
        self.n_postings
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Clusters one term's postings. The input is left untouched.
    pub fn cluster(&self, postings: &[DocWeight]) -> ClusteringResult<Vec<DocumentCluster>> {
        if postings.is_empty() {
            return Ok(Vec::new());
        }

        let selected = top_k(postings, self.n_postings);
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        if selected.len() < MINIMAL_DOC_SIZE_TO_CLUSTER {
            debug!(
                "Posting list of {} entries too small to cluster",
                selected.len()
            );
            return Ok(vec![DocumentCluster::new(None, &selected, true)]);
        }

        self.algorithm.cluster(&selected)
    }
}
