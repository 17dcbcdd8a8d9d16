//! Posting-list clustering.
//!
//! A term's postings are first cut to the highest-weight `n_postings`
//! entries, then partitioned by a pluggable [`ClusteringAlgorithm`] into
//! [`DocumentCluster`]s whose summaries let queries skip whole groups.
//!
//! [`DocumentCluster`]: crate::vector::DocumentCluster

mod params;
pub mod postings;
mod random;
mod seismic;

pub use params::{
    APPROXIMATE_THRESHOLD_FIELD, CLUSTER_RATIO_FIELD, DEFAULT_APPROXIMATE_THRESHOLD,
    DEFAULT_CLUSTER_RATIO, DEFAULT_SUMMARY_PRUNE_RATIO, N_POSTINGS_FIELD,
    POSTING_MINIMUM_LENGTH, POSTING_PRUNE_RATIO, SUMMARY_PRUNE_RATIO_FIELD, SeismicParams,
};
pub use random::RandomClustering;
pub use seismic::{MINIMAL_DOC_SIZE_TO_CLUSTER, SeismicPostingClusterer};

use thiserror::Error;

use crate::storage::StorageError;
use crate::vector::{DocWeight, DocumentCluster};

/// Errors raised while clustering postings or validating method parameters.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("Failed to read document vectors during clustering: {0}")]
    Storage(#[from] StorageError),

    #[error(
        "Invalid method parameters: {}\nSuggestion: Check n_postings, cluster_ratio, summary_prune_ratio and approximate_threshold",
        .0.join("; ")
    )]
    InvalidParameters(Vec<String>),
}

pub type ClusteringResult<T> = Result<T, ClusteringError>;

/// Partitions one term's postings into clusters.
pub trait ClusteringAlgorithm: Send + Sync {
    fn cluster(&self, postings: &[DocWeight]) -> ClusteringResult<Vec<DocumentCluster>>;
}

impl<T: ClusteringAlgorithm + ?Sized> ClusteringAlgorithm for Box<T> {
    fn cluster(&self, postings: &[DocWeight]) -> ClusteringResult<Vec<DocumentCluster>> {
        (**self).cluster(postings)
    }
}
