//! Clustering a small corpus end to end through the public accessors.

use std::sync::Arc;

use seismic_sparse::clustering::{RandomClustering, SeismicPostingClusterer};
use seismic_sparse::storage::{InMemoryForwardIndex, SparseVectorWriter};
use seismic_sparse::vector::{ByteQuantizer, DocId, DocWeight, SparseVector};

const TOK_A: &str = "100";
const TOK_B: &str = "200";

fn corpus() -> (InMemoryForwardIndex, Vec<DocWeight>) {
    let quantizer = ByteQuantizer::new(1.0);
    let forward = InMemoryForwardIndex::new();
    let docs: [(u32, Vec<(&str, f32)>); 3] = [
        (1, vec![(TOK_A, 0.9)]),
        (2, vec![(TOK_A, 0.2), (TOK_B, 0.5)]),
        (3, vec![(TOK_B, 0.8)]),
    ];

    let mut tok_a_postings = Vec::new();
    for (id, pairs) in docs {
        let vector = SparseVector::from_string_map(pairs, &quantizer).unwrap();
        if let Some(weight) = vector.weight_of(TOK_A.parse().unwrap()) {
            tok_a_postings.push(DocWeight::new(DocId::new(id), weight));
        }
        assert!(forward.insert(DocId::new(id), Arc::new(vector)).unwrap());
    }
    (forward, tok_a_postings)
}

#[test]
fn test_small_posting_list_becomes_one_unskippable_cluster() {
    let (forward, postings) = corpus();
    let as_pairs: Vec<(u32, u8)> = postings.iter().map(|p| (p.doc_id.get(), p.weight)).collect();
    assert_eq!(as_pairs, vec![(1, 230), (2, 51)]);

    let clusterer = SeismicPostingClusterer::new(10, RandomClustering::new(0.4, 0.1, &forward));
    let clusters = clusterer.cluster(&postings).unwrap();

    assert_eq!(clusters.len(), 1);
    assert!(clusters[0].should_not_skip());
    assert!(clusters[0].summary().is_none());
    assert_eq!(clusters[0].size(), 2);
}

fn graded_corpus(docs: u32) -> (InMemoryForwardIndex, Vec<DocWeight>) {
    let quantizer = ByteQuantizer::new(1.0);
    let forward = InMemoryForwardIndex::new();
    let mut postings = Vec::new();
    for id in 0..docs {
        let weight = id as f32 / docs as f32;
        let vector =
            SparseVector::from_string_map([("1", weight), ("2", 1.0 - weight)], &quantizer).unwrap();
        postings.push(DocWeight::new(DocId::new(id), vector.weight_of(1).unwrap_or(0)));
        forward.insert(DocId::new(id), Arc::new(vector)).unwrap();
    }
    (forward, postings)
}

#[test]
fn test_large_posting_list_is_cut_and_clustered() {
    let (forward, postings) = graded_corpus(50);

    let clusterer = SeismicPostingClusterer::new(
        20,
        RandomClustering::new(0.4, 0.2, &forward).with_seed(11),
    );
    let clusters = clusterer.cluster(&postings).unwrap();

    let mut members: Vec<u32> = clusters
        .iter()
        .flat_map(|c| c.iter().map(|d| d.doc_id.get()))
        .collect();
    members.sort_unstable();
    // The 20 heaviest token-1 postings are docs 30..50.
    assert_eq!(members, (30..50).collect::<Vec<_>>());
    assert!(clusters.iter().all(|c| !c.should_not_skip()));
    assert!(clusters.iter().all(|c| c.summary().is_some_and(|s| !s.is_empty())));
}

#[test]
fn test_seeded_clustering_is_reproducible() {
    let (forward, postings) = graded_corpus(30);

    let run = |seed: u64| {
        SeismicPostingClusterer::new(30, RandomClustering::new(0.5, 0.3, &forward).with_seed(seed))
            .cluster(&postings)
            .unwrap()
    };
    assert_eq!(run(3), run(3));
}
