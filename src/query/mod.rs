//! Query execution over clustered postings.

mod heap;
mod searcher;

pub use heap::TopKHeap;
pub use searcher::{ScoredDoc, SearchResults, SearchStats, SeismicSearcher};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;
use crate::vector::DocId;

pub const DEFAULT_K: usize = 10;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_HEAP_FACTOR: f32 = 1.0;
pub const DEFAULT_BOOST: f32 = 1.0;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid query parameter: {0}\nSuggestion: k and top_n must be positive, heap_factor positive and finite")]
    InvalidParameter(String),

    #[error("Failed to read index during search: {0}")]
    Storage(#[from] StorageError),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Per-query knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Number of hits to return.
    pub k: usize,
    /// Number of query tokens kept, heaviest first.
    pub top_n: usize,
    /// Divides the heap minimum when deciding whether to skip a cluster.
    /// Larger values skip less.
    pub heap_factor: f32,
    pub boost: f32,
    /// Restricts hits to these documents.
    #[serde(default)]
    pub filter: Option<BTreeSet<DocId>>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            top_n: DEFAULT_TOP_N,
            heap_factor: DEFAULT_HEAP_FACTOR,
            boost: DEFAULT_BOOST,
            filter: None,
        }
    }
}

impl QueryParams {
    pub fn validate(&self) -> QueryResult<()> {
        if self.k == 0 {
            return Err(QueryError::InvalidParameter("k must be greater than 0".to_string()));
        }
        if self.top_n == 0 {
            return Err(QueryError::InvalidParameter(
                "top_n must be greater than 0".to_string(),
            ));
        }
        if !(self.heap_factor.is_finite() && self.heap_factor > 0.0) {
            return Err(QueryError::InvalidParameter(format!(
                "heap_factor must be positive and finite, got {}",
                self.heap_factor
            )));
        }
        if !(self.boost.is_finite() && self.boost >= 0.0) {
            return Err(QueryError::InvalidParameter(format!(
                "boost must be non-negative and finite, got {}",
                self.boost
            )));
        }
        Ok(())
    }

    /// Whether `doc_id` passes the filter.
    pub fn accepts(&self, doc_id: DocId) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter.contains(&doc_id))
    }
}
