//! Configuration module for the sparse index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SEISMIC_` and use double
//! underscores to separate nested levels:
//! - `SEISMIC_CLUSTERING__PARALLEL_THREADS=8` sets `clustering.parallel_threads`
//! - `SEISMIC_SEARCH__HEAP_FACTOR=1.5` sets `search.heap_factor`
//! - `SEISMIC_LOGGING__LEVEL=debug` sets `logging.level`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::clustering::{
    DEFAULT_APPROXIMATE_THRESHOLD, DEFAULT_CLUSTER_RATIO, DEFAULT_SUMMARY_PRUNE_RATIO,
    SeismicParams,
};
use crate::query::{DEFAULT_HEAP_FACTOR, DEFAULT_K, DEFAULT_TOP_N, QueryParams};
use crate::vector::{
    DEFAULT_QUANTIZATION_CEILING_INGEST, DEFAULT_QUANTIZATION_CEILING_SEARCH, QuantizationCeilings,
};

const CONFIG_DIR: &str = ".seismic";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "SEISMIC_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the index directory
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Quantization ceilings for ingest and search
    #[serde(default)]
    pub quantization: QuantizationConfig,

    /// Posting clustering parameters
    #[serde(default)]
    pub clustering: ClusteringConfig,

    /// Query defaults
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QuantizationConfig {
    #[serde(default = "default_ingest_ceiling")]
    pub ingest_ceiling: f32,

    #[serde(default = "default_search_ceiling")]
    pub search_ceiling: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusteringConfig {
    /// Per-term posting cap; absent means derived from the document count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_postings: Option<usize>,

    #[serde(default = "default_cluster_ratio")]
    pub cluster_ratio: f32,

    #[serde(default = "default_summary_prune_ratio")]
    pub summary_prune_ratio: f32,

    /// Builds over fewer documents skip clustering
    #[serde(default = "default_approximate_threshold")]
    pub approximate_threshold: usize,

    /// Number of parallel threads for building
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Fixed seed for center selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_k")]
    pub k: usize,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_heap_factor")]
    pub heap_factor: f32,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".seismic/index")
}
fn default_false() -> bool {
    false
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_ingest_ceiling() -> f32 {
    DEFAULT_QUANTIZATION_CEILING_INGEST
}
fn default_search_ceiling() -> f32 {
    DEFAULT_QUANTIZATION_CEILING_SEARCH
}
fn default_cluster_ratio() -> f32 {
    DEFAULT_CLUSTER_RATIO
}
fn default_summary_prune_ratio() -> f32 {
    DEFAULT_SUMMARY_PRUNE_RATIO
}
fn default_approximate_threshold() -> usize {
    DEFAULT_APPROXIMATE_THRESHOLD
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_k() -> usize {
    DEFAULT_K
}
fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
fn default_heap_factor() -> f32 {
    DEFAULT_HEAP_FACTOR
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            debug: false,
            logging: LoggingConfig::default(),
            quantization: QuantizationConfig::default(),
            clustering: ClusteringConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            ingest_ceiling: default_ingest_ceiling(),
            search_ceiling: default_search_ceiling(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            n_postings: None,
            cluster_ratio: default_cluster_ratio(),
            summary_prune_ratio: default_summary_prune_ratio(),
            approximate_threshold: default_approximate_threshold(),
            parallel_threads: default_parallel_threads(),
            seed: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            top_n: default_top_n(),
            heap_factor: default_heap_factor(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the workspace config by looking for a .seismic directory
    /// from the current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create `.seismic/settings.toml` in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(CONFIG_FILE);
        Self::write_config_template(&config_path, force)?;
        Ok(config_path)
    }

    /// Write a commented settings template to `path`
    pub fn write_config_template(
        path: &Path,
        force: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !force && path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# Seismic sparse index configuration

# Version of the configuration schema
version = 1

# Path to the index directory
index_path = ".seismic/index"

# Global debug mode
debug = false

[logging]
# error, warn, info, debug or trace
level = "warn"

[quantization]
# Weights are clamped to [0, ceiling] and mapped onto 0..=255
ingest_ceiling = {ingest:?}
search_ceiling = {search:?}

[clustering]
# Per-term posting cap. Leave unset to derive it from the document count.
# n_postings = 160

# Fraction of a posting list used as cluster centers, in (0, 1)
cluster_ratio = {cluster_ratio:?}

# Share of summary weight kept per cluster, in (0, 1]
summary_prune_ratio = {summary_prune_ratio:?}

# Indexes with fewer documents are not clustered
approximate_threshold = {approximate_threshold}

# Number of parallel threads for building (defaults to CPU count)
parallel_threads = {threads}

# Fixed seed for reproducible builds
# seed = 42

[search]
k = {k}
top_n = {top_n}
# Larger values skip fewer clusters
heap_factor = {heap_factor:?}
"#,
            ingest = DEFAULT_QUANTIZATION_CEILING_INGEST,
            search = DEFAULT_QUANTIZATION_CEILING_SEARCH,
            cluster_ratio = DEFAULT_CLUSTER_RATIO,
            summary_prune_ratio = DEFAULT_SUMMARY_PRUNE_RATIO,
            approximate_threshold = DEFAULT_APPROXIMATE_THRESHOLD,
            threads = num_cpus::get(),
            k = DEFAULT_K,
            top_n = DEFAULT_TOP_N,
            heap_factor = DEFAULT_HEAP_FACTOR,
        );

        std::fs::write(path, template)?;
        Ok(())
    }

    pub fn ceilings(&self) -> QuantizationCeilings {
        QuantizationCeilings::new(
            self.quantization.ingest_ceiling,
            self.quantization.search_ceiling,
        )
    }

    pub fn seismic_params(&self) -> SeismicParams {
        SeismicParams {
            n_postings: self.clustering.n_postings,
            cluster_ratio: self.clustering.cluster_ratio,
            summary_prune_ratio: self.clustering.summary_prune_ratio,
            approximate_threshold: self.clustering.approximate_threshold,
        }
    }

    /// Query defaults from the `[search]` section
    pub fn query_params(&self) -> QueryParams {
        QueryParams {
            k: self.search.k,
            top_n: self.search.top_n,
            heap_factor: self.search.heap_factor,
            ..QueryParams::default()
        }
    }
}
