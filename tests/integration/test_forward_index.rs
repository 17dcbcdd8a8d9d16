//! Write-then-read behavior shared by every forward-index backend.

use std::sync::Arc;

use seismic_sparse::storage::{
    CacheGatedForwardIndexReader, InMemoryForwardIndex, MmapForwardIndex, SparseVectorForwardIndex,
    SparseVectorReader,
};
use seismic_sparse::vector::{DocId, Item, SparseVector};
use tempfile::TempDir;

fn vector(pairs: &[(u16, u8)]) -> Arc<SparseVector> {
    Arc::new(SparseVector::from_items(
        pairs.iter().map(|&(token, weight)| Item::new(token, weight)),
    ))
}

fn assert_write_once(index: &dyn SparseVectorForwardIndex) {
    let original = vector(&[(3, 10), (9, 200)]);
    let replacement = vector(&[(4, 1)]);
    let doc = DocId::new(5);

    assert!(index.writer().insert(doc, Arc::clone(&original)).unwrap());
    assert_eq!(index.reader().read(doc).unwrap().as_deref(), Some(&*original));

    assert!(!index.writer().insert(doc, replacement).unwrap());
    assert_eq!(index.reader().read(doc).unwrap().as_deref(), Some(&*original));

    assert!(index.reader().read(DocId::new(6)).unwrap().is_none());
}

#[test]
fn test_in_memory_write_then_read() {
    assert_write_once(&InMemoryForwardIndex::new());
}

#[test]
fn test_mmap_write_then_read() {
    let temp_dir = TempDir::new().unwrap();
    let index = MmapForwardIndex::open_or_create(temp_dir.path()).unwrap();
    assert_write_once(&index);
}

#[test]
fn test_empty_vector_is_present_not_absent() {
    let index = InMemoryForwardIndex::new();
    let doc = DocId::new(1);
    assert!(index.writer().insert(doc, vector(&[])).unwrap());
    let stored = index.reader().read(doc).unwrap().unwrap();
    assert_eq!(stored.size(), 0);
}

#[test]
fn test_cache_gated_reader_over_mmap() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(MmapForwardIndex::open_or_create(temp_dir.path()).unwrap());
    store
        .insert_batch(&[(DocId::new(1), vector(&[(1, 1)])), (DocId::new(2), vector(&[(2, 2)]))])
        .unwrap();

    let gated = CacheGatedForwardIndexReader::new(InMemoryForwardIndex::new(), Arc::clone(&store));
    assert!(gated.cache().is_empty());
    let first = gated.read(DocId::new(2)).unwrap().unwrap();
    assert_eq!(first.weight_of(2), Some(2));
    assert!(gated.cache().contains(DocId::new(2)));
    assert!(!gated.cache().contains(DocId::new(1)));
}

#[test]
fn test_concurrent_inserts_have_one_winner() {
    let index = Arc::new(InMemoryForwardIndex::new());
    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let index = Arc::clone(&index);
                scope.spawn(move || {
                    usize::from(index.writer().insert(DocId::new(9), vector(&[(1, i)])).unwrap())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(winners, 1);
    assert_eq!(index.len(), 1);
}
