//! Query behavior through the engine: ranking, filters and skipping.

use std::collections::BTreeSet;

use seismic_sparse::{DocId, IndexConfig, QuantizationCeilings, QueryParams, SparseIndex};

/// 100 documents over tokens 1..=4; doc `i` leans toward token `i % 4 + 1`
/// with strength growing in `i`.
fn corpus() -> SparseIndex {
    let index = SparseIndex::in_memory(IndexConfig {
        ceilings: QuantizationCeilings::new(1.0, 1.0),
        parallel_threads: 4,
        seed: Some(1),
        ..IndexConfig::default()
    })
    .unwrap();
    for id in 0..100u32 {
        let main = (id % 4 + 1).to_string();
        let strength = 0.2 + 0.8 * id as f32 / 100.0;
        index
            .ingest(DocId::new(id), [(main.as_str(), strength), ("9", 0.1)])
            .unwrap();
    }
    index.build().unwrap();
    index
}

fn ids(index: &SparseIndex, query: &[(&str, f32)], params: &QueryParams) -> Vec<u32> {
    index
        .search(query.iter().copied(), params)
        .unwrap()
        .hits
        .iter()
        .map(|hit| hit.doc_id.get())
        .collect()
}

#[test]
fn test_exhaustive_ranking_with_generous_heap_factor() {
    let index = corpus();
    let params = QueryParams {
        k: 4,
        heap_factor: 1.0e6,
        ..QueryParams::default()
    };
    // Token 2 documents are 1, 5, 9, ..., 97; the strongest come last.
    assert_eq!(ids(&index, &[("2", 1.0)], &params), vec![97, 93, 89, 85]);
}

#[test]
fn test_scores_are_descending_and_rescaled() {
    let index = corpus();
    let params = QueryParams {
        k: 10,
        heap_factor: 1.0e6,
        ..QueryParams::default()
    };
    let results = index.search([("3", 1.0)], &params).unwrap();
    assert_eq!(results.hits.len(), 10);
    assert!(results.hits.windows(2).all(|w| w[0].score >= w[1].score));
    // Doc 98: quantized 0.984 * 255 ~ 251, query 255, ratio 1 / 255^2.
    let top = results.hits[0];
    assert_eq!(top.doc_id, DocId::new(98));
    assert!((top.score - 251.0 / 255.0).abs() < 0.01, "{}", top.score);
}

#[test]
fn test_small_filter_uses_exact_scoring() {
    let index = corpus();
    let params = QueryParams {
        k: 3,
        filter: Some(BTreeSet::from([DocId::new(4), DocId::new(8), DocId::new(500)])),
        ..QueryParams::default()
    };
    let results = index.search([("1", 1.0)], &params).unwrap();
    assert!(results.stats.exact);
    let found: Vec<u32> = results.hits.iter().map(|h| h.doc_id.get()).collect();
    assert_eq!(found, vec![8, 4]);
}

#[test]
fn test_large_filter_restricts_clustered_search() {
    let index = corpus();
    let allowed: BTreeSet<DocId> = (0..40).map(DocId::new).collect();
    let params = QueryParams {
        k: 2,
        heap_factor: 1.0e6,
        filter: Some(allowed),
        ..QueryParams::default()
    };
    let results = index.search([("1", 1.0)], &params).unwrap();
    assert!(!results.stats.exact);
    let found: Vec<u32> = results.hits.iter().map(|h| h.doc_id.get()).collect();
    assert_eq!(found, vec![36, 32]);
}

#[test]
fn test_unknown_tokens_return_nothing() {
    let index = corpus();
    let results = index.search([("12345", 1.0)], &QueryParams::default()).unwrap();
    assert!(results.hits.is_empty());
}

#[test]
fn test_invalid_query_parameters() {
    let index = corpus();
    let params = QueryParams {
        k: 0,
        ..QueryParams::default()
    };
    let err = index.search([("1", 1.0)], &params).unwrap_err();
    assert_eq!(err.status_code(), "INVALID_QUERY");
}

#[test]
fn test_heap_factor_below_one_skips_clusters() {
    let index = corpus();
    let params = QueryParams {
        k: 1,
        heap_factor: 0.01,
        ..QueryParams::default()
    };
    let results = index.search([("9", 1.0)], &params).unwrap();
    assert_eq!(results.hits.len(), 1);
    assert!(results.stats.clusters_skipped > 0);
}
