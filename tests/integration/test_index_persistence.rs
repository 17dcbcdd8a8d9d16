//! Saving, reopening and extending an on-disk index.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use seismic_sparse::storage::{ClusteredPostingReader, IndexMetadata, POSTINGS_FILE_NAME};
use seismic_sparse::{DocId, IndexConfig, QuantizationCeilings, QueryParams, SparseIndex};
use tempfile::TempDir;

fn config() -> IndexConfig {
    IndexConfig {
        ceilings: QuantizationCeilings::new(2.0, 4.0),
        parallel_threads: 2,
        seed: Some(42),
        ..IndexConfig::default()
    }
}

fn populate(index: &SparseIndex, ids: std::ops::Range<u32>) {
    for id in ids {
        let weight = (id % 10) as f32 / 5.0;
        let token = (id % 3).to_string();
        index
            .ingest(DocId::new(id), [(token.as_str(), weight), ("99", 0.5)])
            .unwrap();
    }
}

#[test]
fn test_save_writes_all_parts() {
    let temp_dir = TempDir::new().unwrap();
    let index = SparseIndex::in_memory(config()).unwrap();
    populate(&index, 0..30);
    index.build().unwrap();
    index.save(temp_dir.path()).unwrap();

    assert!(SparseIndex::exists(temp_dir.path()));
    assert!(temp_dir.path().join(POSTINGS_FILE_NAME).is_file());

    let metadata = IndexMetadata::load(temp_dir.path()).unwrap().unwrap();
    assert_eq!(metadata.doc_count, 30);
    assert_eq!(metadata.term_count, 4);
    assert_eq!(metadata.ceilings().unwrap(), QuantizationCeilings::new(2.0, 4.0));
}

#[test]
fn test_reopen_preserves_postings_and_results() {
    let temp_dir = TempDir::new().unwrap();
    let index = SparseIndex::in_memory(config()).unwrap();
    populate(&index, 0..60);
    index.build().unwrap();
    index.save(temp_dir.path()).unwrap();

    let reopened = SparseIndex::open(temp_dir.path(), IndexConfig::default()).unwrap();
    assert_eq!(reopened.ceilings(), QuantizationCeilings::new(2.0, 4.0));
    assert_eq!(reopened.config().params, index.config().params);
    for term in index.postings().terms() {
        assert_eq!(
            reopened.postings().read(term).unwrap(),
            index.postings().read(term).unwrap()
        );
    }

    let params = QueryParams {
        k: 5,
        ..QueryParams::default()
    };
    let query = [("1", 2.0), ("99", 1.0)];
    assert_eq!(
        reopened.search(query, &params).unwrap().hits,
        index.search(query, &params).unwrap().hits
    );
}

#[test]
fn test_reopened_index_accepts_new_documents() {
    let temp_dir = TempDir::new().unwrap();
    let index = SparseIndex::in_memory(config()).unwrap();
    populate(&index, 0..10);
    index.build().unwrap();
    index.save(temp_dir.path()).unwrap();
    drop(index);

    let reopened = SparseIndex::open(temp_dir.path(), config()).unwrap();
    populate(&reopened, 5..20);
    assert_eq!(reopened.doc_count(), 20);
    reopened.build().unwrap();
    reopened.save(temp_dir.path()).unwrap();

    let again = SparseIndex::open(temp_dir.path(), config()).unwrap();
    assert_eq!(again.doc_count(), 20);
    let token_99 = again.postings().read(99).unwrap().unwrap();
    assert_eq!(token_99.posting_count(), 20);
}

#[test]
fn test_save_to_another_directory_copies_vectors() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let index = SparseIndex::in_memory(config()).unwrap();
    populate(&index, 0..12);
    index.build().unwrap();
    index.save(first.path()).unwrap();

    let reopened = SparseIndex::open(first.path(), config()).unwrap();
    reopened.save(second.path()).unwrap();

    let copy = SparseIndex::open(second.path(), config()).unwrap();
    assert_eq!(copy.doc_count(), 12);
    assert_eq!(
        copy.vector(DocId::new(7)).unwrap(),
        index.vector(DocId::new(7)).unwrap()
    );
}

#[test]
fn test_save_over_existing_index_replaces_vectors() {
    let temp_dir = TempDir::new().unwrap();
    let first = SparseIndex::in_memory(config()).unwrap();
    first.ingest(DocId::new(1), [("5", 1.0)]).unwrap();
    first.build().unwrap();
    first.save(temp_dir.path()).unwrap();

    let second = SparseIndex::in_memory(config()).unwrap();
    second.ingest(DocId::new(1), [("7", 1.0)]).unwrap();
    second.build().unwrap();
    second.save(temp_dir.path()).unwrap();

    let reopened = SparseIndex::open(temp_dir.path(), config()).unwrap();
    let tokens: Vec<u16> = reopened
        .vector(DocId::new(1))
        .unwrap()
        .unwrap()
        .tokens()
        .to_vec();
    assert_eq!(tokens, vec![7]);

    let hits = reopened
        .search([("7", 1.0)], &QueryParams::default())
        .unwrap()
        .hits;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, DocId::new(1));
}

#[test]
fn test_save_smaller_index_over_larger_one() {
    let temp_dir = TempDir::new().unwrap();
    let large = SparseIndex::in_memory(config()).unwrap();
    populate(&large, 0..5);
    large.build().unwrap();
    large.save(temp_dir.path()).unwrap();

    let small = SparseIndex::in_memory(config()).unwrap();
    populate(&small, 0..1);
    small.build().unwrap();
    small.save(temp_dir.path()).unwrap();

    let reopened = SparseIndex::open(temp_dir.path(), config()).unwrap();
    assert_eq!(reopened.doc_count(), 1);
    assert!(reopened.vector(DocId::new(4)).unwrap().is_none());
    assert_eq!(IndexMetadata::load(temp_dir.path()).unwrap().unwrap().doc_count, 1);
}

#[test]
fn test_failed_build_keeps_pending_postings() {
    let temp_dir = TempDir::new().unwrap();
    let index = SparseIndex::in_memory(config()).unwrap();
    index.ingest(DocId::new(0), [("3", 1.0), ("4", 1.0)]).unwrap();
    index.build().unwrap();
    index.save(temp_dir.path()).unwrap();
    drop(index);

    let reopened = SparseIndex::open(temp_dir.path(), config()).unwrap();
    for id in 1..=12u32 {
        reopened
            .ingest(DocId::new(id), [("3", 0.5 + id as f32 * 0.1)])
            .unwrap();
    }

    // Doc 0 is the first record: header (16 bytes), doc id, entry count, then
    // tokens 3 and 4. Swapping the tokens makes the record unreadable.
    let path = temp_dir.path().join("forward_index.vec");
    let patch = |bytes: [u8; 4]| {
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(24)).unwrap();
        file.write_all(&bytes).unwrap();
        file.sync_all().unwrap();
    };
    patch([4, 0, 3, 0]);

    let err = reopened.build().unwrap_err();
    assert_eq!(err.status_code(), "CLUSTERING_ERROR");
    assert_eq!(reopened.stats().pending_terms, 1);
    assert_eq!(reopened.postings().read(3).unwrap().unwrap().posting_count(), 1);

    patch([3, 0, 4, 0]);
    let stats = reopened.build().unwrap();
    assert_eq!(stats.terms, 1);
    assert_eq!(reopened.stats().pending_terms, 0);
    assert_eq!(reopened.postings().read(3).unwrap().unwrap().posting_count(), 13);
}
