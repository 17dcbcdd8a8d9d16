//! Embedded sparse-vector retrieval with clustered postings.
//!
//! Documents are stored as byte-quantized sparse vectors. Each term's posting
//! list is cut to its heaviest entries and grouped into clusters whose
//! summaries let a query skip groups that cannot beat the current top-k.

pub mod clustering;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod query;
pub mod storage;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use engine::{BuildStats, IndexConfig, IndexStats, SparseIndex};
pub use error::{ErrorContext, IndexError, IndexResult};
pub use query::{QueryParams, ScoredDoc, SearchResults};
pub use storage::{StorageError, StorageResult};
pub use vector::{DocId, QuantizationCeilings, SparseVector, TokenId};
