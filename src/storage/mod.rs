//! Storage for forward vectors and clustered postings.
//!
//! Everything outside this module goes through the reader/writer traits in
//! [`accessor`]. Two backends exist for the forward index (in-memory and
//! memory-mapped); clustered postings live in memory and are persisted as a
//! single snapshot file.

pub mod accessor;
pub mod error;
pub mod gated;
pub mod memory;
pub mod metadata;
pub mod mmap;
pub mod persistence;

pub use accessor::{
    ClusteredPosting, ClusteredPostingReader, ClusteredPostingWriter, PostingClusters,
    SparseVectorForwardIndex, SparseVectorReader, SparseVectorWriter,
};
pub use error::{StorageError, StorageResult};
pub use gated::CacheGatedForwardIndexReader;
pub use memory::{InMemoryClusteredPosting, InMemoryForwardIndex};
pub use metadata::{IndexMetadata, METADATA_FILE_NAME};
pub use mmap::MmapForwardIndex;
pub use persistence::{POSTINGS_FILE_NAME, load_postings, save_postings};
