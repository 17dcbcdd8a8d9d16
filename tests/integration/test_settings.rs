//! Settings files driving index construction.

use seismic_sparse::{IndexConfig, QuantizationCeilings, Settings, SparseIndex};
use tempfile::TempDir;

#[test]
fn test_template_loads_as_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join(".seismic").join("settings.toml");

    Settings::write_config_template(&path, false).unwrap();
    assert!(Settings::write_config_template(&path, false).is_err());
    Settings::write_config_template(&path, true).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    let defaults = Settings::default();
    assert_eq!(loaded.ceilings(), defaults.ceilings());
    assert_eq!(loaded.seismic_params(), defaults.seismic_params());
    assert_eq!(loaded.query_params(), defaults.query_params());
}

#[test]
fn test_settings_flow_into_index_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &path,
        r#"
[quantization]
ingest_ceiling = 1.0
search_ceiling = 2.0

[clustering]
cluster_ratio = 0.25
approximate_threshold = 50
parallel_threads = 3
seed = 9
"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    let config = IndexConfig::from(&settings);
    assert_eq!(config.ceilings, QuantizationCeilings::new(1.0, 2.0));
    assert_eq!(config.params.cluster_ratio, 0.25);
    assert_eq!(config.params.approximate_threshold, 50);
    assert_eq!(config.parallel_threads, 3);
    assert_eq!(config.seed, Some(9));

    let index = SparseIndex::in_memory(config).unwrap();
    for id in 0..20 {
        index
            .ingest(seismic_sparse::DocId::new(id), [("4", 0.5)])
            .unwrap();
    }
    // Fewer documents than the approximate threshold: no clustering.
    let stats = index.build().unwrap();
    assert!(stats.exhaustive);
    assert_eq!(stats.clusters, 1);
}

#[test]
fn test_invalid_settings_are_rejected_by_the_index() {
    let mut settings = Settings::default();
    settings.clustering.summary_prune_ratio = 0.0;
    let err = SparseIndex::in_memory(IndexConfig::from(&settings))
        .err()
        .unwrap();
    assert_eq!(err.status_code(), "INVALID_PARAMETERS");
}
