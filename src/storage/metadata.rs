//! Metadata tracking for a saved index

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, StorageResult};
use crate::vector::{QuantizationCeilings, VectorResult};

/// File name of the metadata document inside an index directory.
pub const METADATA_FILE_NAME: &str = "index.meta";

/// Current metadata format version.
pub const METADATA_VERSION: u32 = 1;

/// Metadata about a saved index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Version of the index format
    pub version: u32,

    /// Number of vectors in the forward index
    pub doc_count: u64,

    /// Number of clustered terms
    pub term_count: u64,

    /// Field attributes, including both quantization ceilings
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Method parameters the postings were clustered with
    #[serde(default)]
    pub method_parameters: HashMap<String, String>,

    /// Last modification timestamp (seconds since the epoch)
    pub last_modified: u64,
}

impl Default for IndexMetadata {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION,
            doc_count: 0,
            term_count: 0,
            attributes: HashMap::new(),
            method_parameters: HashMap::new(),
            last_modified: utc_timestamp(),
        }
    }
}

impl IndexMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update counts after a build or load
    pub fn update_counts(&mut self, doc_count: u64, term_count: u64) {
        self.doc_count = doc_count;
        self.term_count = term_count;
        self.last_modified = utc_timestamp();
    }

    pub fn set_ceilings(&mut self, ceilings: &QuantizationCeilings) {
        ceilings.to_attributes(&mut self.attributes);
    }

    /// Ceilings recorded in the attributes, falling back to defaults.
    pub fn ceilings(&self) -> VectorResult<QuantizationCeilings> {
        QuantizationCeilings::from_attributes(&self.attributes)
    }

    /// Save metadata to `base_path/index.meta`
    pub fn save(&self, base_path: &Path) -> StorageResult<()> {
        let metadata_path = base_path.join(METADATA_FILE_NAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::Serialization(format!("Failed to serialize metadata: {e}")))?;
        fs::write(&metadata_path, json)?;
        Ok(())
    }

    /// Load metadata, returning `None` when the file does not exist
    pub fn load(base_path: &Path) -> StorageResult<Option<Self>> {
        let metadata_path = base_path.join(METADATA_FILE_NAME);
        if !metadata_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&metadata_path)?;
        let metadata: Self = serde_json::from_str(&json)
            .map_err(|e| StorageError::Serialization(format!("Failed to parse metadata: {e}")))?;

        if metadata.version != METADATA_VERSION {
            return Err(StorageError::VersionMismatch {
                expected: METADATA_VERSION,
                actual: metadata.version,
            });
        }
        Ok(Some(metadata))
    }
}

/// Current UTC timestamp in seconds since the Unix epoch.
pub fn utc_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_metadata_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(IndexMetadata::load(temp_dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut metadata = IndexMetadata::new();
        metadata.update_counts(42, 7);
        metadata.set_ceilings(&QuantizationCeilings::new(2.0, 8.0));
        metadata
            .method_parameters
            .insert("cluster_ratio".to_string(), "0.1".to_string());
        metadata.save(temp_dir.path()).unwrap();

        let loaded = IndexMetadata::load(temp_dir.path()).unwrap().unwrap();
        assert_eq!(loaded, metadata);
        assert_eq!(
            loaded.ceilings().unwrap(),
            QuantizationCeilings::new(2.0, 8.0)
        );
    }

    #[test]
    fn test_update_counts_refreshes_timestamp() {
        let mut metadata = IndexMetadata::new();
        metadata.last_modified = 0;
        metadata.update_counts(3, 1);

        let now = Utc::now().timestamp() as u64;
        assert!(metadata.last_modified > 1_600_000_000);
        assert!(metadata.last_modified <= now);
    }

    #[test]
    fn test_defaults_when_attributes_missing() {
        let metadata = IndexMetadata::new();
        assert_eq!(metadata.ceilings().unwrap(), QuantizationCeilings::default());
    }

    #[test]
    fn test_corrupt_metadata() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(METADATA_FILE_NAME), "{not json").unwrap();
        assert!(matches!(
            IndexMetadata::load(temp_dir.path()),
            Err(StorageError::Serialization(_))
        ));
    }
}
