//! Document id handling at the ingestion boundary.

use std::sync::Arc;

use seismic_sparse::vector::SparseVector;
use seismic_sparse::{DocId, IndexConfig, IndexError, QueryParams, SparseIndex};
use tempfile::TempDir;

fn config() -> IndexConfig {
    IndexConfig {
        parallel_threads: 1,
        seed: Some(3),
        ..IndexConfig::default()
    }
}

#[test]
fn test_reserved_doc_id_is_rejected() {
    let index = SparseIndex::in_memory(config()).unwrap();

    let err = index
        .ingest(DocId::NO_MORE_DOCS, [("12", 1.0)])
        .unwrap_err();
    assert!(matches!(err, IndexError::ReservedDocId { .. }));
    assert_eq!(err.status_code(), "RESERVED_DOC_ID");
    assert!(!err.recovery_suggestions().is_empty());

    let err = index
        .ingest_quantized(DocId::NO_MORE_DOCS, Arc::new(SparseVector::default()))
        .unwrap_err();
    assert!(matches!(err, IndexError::ReservedDocId { doc_id: u32::MAX }));

    assert_eq!(index.doc_count(), 0);
    assert_eq!(index.stats().pending_terms, 0);
}

#[test]
fn test_largest_usable_doc_id_is_searchable() {
    let temp_dir = TempDir::new().unwrap();
    let index = SparseIndex::in_memory(config()).unwrap();
    let last = DocId::new(u32::MAX - 1);
    assert!(index.ingest(last, [("12", 1.0)]).unwrap());
    index.build().unwrap();
    index.save(temp_dir.path()).unwrap();

    let reopened = SparseIndex::open(temp_dir.path(), config()).unwrap();
    assert!(matches!(
        reopened.ingest(DocId::NO_MORE_DOCS, [("12", 1.0)]),
        Err(IndexError::ReservedDocId { .. })
    ));
    let hits = reopened
        .search([("12", 1.0)], &QueryParams::default())
        .unwrap()
        .hits;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, last);
}
