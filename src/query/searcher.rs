//! Top-k retrieval over clustered postings.
//!
//! # Algorithm
//! 1. Keep the `top_n` heaviest query tokens and expand them to dense form
//! 2. For each query token, heaviest first, walk its clusters
//! 3. A skippable cluster with a summary is passed over when the heap is full
//!    and `summary · query < heap_min / heap_factor`
//! 4. Every other cluster scores its unvisited members exactly
//!
//! A filter no larger than `k` bypasses the clusters entirely and scores each
//! filtered document directly.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::query::heap::TopKHeap;
use crate::query::{QueryParams, QueryResult};
use crate::storage::{ClusteredPostingReader, SparseVectorReader};
use crate::vector::{DocId, DocWeightIterator, QuantizationCeilings, SparseVector};

/// One search hit with its rescaled score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f32,
}

/// Counters gathered during one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub clusters_visited: usize,
    pub clusters_skipped: usize,
    pub docs_scored: usize,
    pub exact: bool,
}

/// Hits in score-descending order plus the counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub hits: Vec<ScoredDoc>,
    pub stats: SearchStats,
}

/// Executes queries against a clustered posting store and a forward index.
pub struct SeismicSearcher<'a> {
    postings: &'a dyn ClusteredPostingReader,
    vectors: &'a dyn SparseVectorReader,
    ceilings: QuantizationCeilings,
}

impl<'a> SeismicSearcher<'a> {
    pub fn new(
        postings: &'a dyn ClusteredPostingReader,
        vectors: &'a dyn SparseVectorReader,
        ceilings: QuantizationCeilings,
    ) -> Self {
        Self {
            postings,
            vectors,
            ceilings,
        }
    }

    /// Searches with a query already quantized by the search ceiling.
    pub fn search(&self, query: &SparseVector, params: &QueryParams) -> QueryResult<SearchResults> {
        params.validate()?;

        let pruned = query.prune_top_n(params.top_n);
        let dense = pruned.to_dense_vector();

        let mut heap = TopKHeap::new(params.k);
        let mut stats = SearchStats::default();

        match params.filter.as_ref() {
            Some(filter) if filter.len() <= params.k => {
                stats.exact = true;
                for &doc_id in filter {
                    self.score_doc(doc_id, &dense, &mut heap, &mut stats)?;
                }
            }
            _ => self.search_clusters(&pruned, &dense, params, &mut heap, &mut stats)?,
        }

        debug!(
            "Search finished: exact={}, visited={}, skipped={}, scored={}",
            stats.exact, stats.clusters_visited, stats.clusters_skipped, stats.docs_scored
        );

        let hits = heap
            .into_sorted_vec()
            .into_iter()
            .map(|(doc_id, score)| ScoredDoc {
                doc_id,
                score: self.ceilings.rescale(score, params.boost),
            })
            .collect();
        Ok(SearchResults { hits, stats })
    }

    fn search_clusters(
        &self,
        query: &SparseVector,
        dense: &[u8],
        params: &QueryParams,
        heap: &mut TopKHeap,
        stats: &mut SearchStats,
    ) -> QueryResult<()> {
        let mut tokens: Vec<_> = query.iter().collect();
        tokens.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.token.cmp(&b.token)));

        let mut visited: HashSet<DocId> = HashSet::new();
        for item in tokens {
            let Some(clusters) = self.postings.read(item.token)? else {
                continue;
            };

            for cluster in clusters.iter() {
                if let Some(summary) = cluster.summary().filter(|_| !cluster.should_not_skip()) {
                    let bound = summary.dot_product(dense) as f32;
                    let skip = heap.is_full()
                        && heap
                            .min_score()
                            .is_some_and(|min| bound < min as f32 / params.heap_factor);
                    if skip {
                        stats.clusters_skipped += 1;
                        continue;
                    }
                }

                stats.clusters_visited += 1;
                let mut cursor = cluster.cursor();
                while !cursor.next_doc().is_terminated() {
                    let Some(doc_id) = cursor.doc_id() else {
                        break;
                    };
                    if !params.accepts(doc_id) || !visited.insert(doc_id) {
                        continue;
                    }
                    self.score_doc(doc_id, dense, heap, stats)?;
                }
            }
        }
        Ok(())
    }

    fn score_doc(
        &self,
        doc_id: DocId,
        dense: &[u8],
        heap: &mut TopKHeap,
        stats: &mut SearchStats,
    ) -> QueryResult<()> {
        let Some(vector) = self.vectors.read(doc_id)? else {
            return Ok(());
        };
        stats.docs_scored += 1;
        let score = vector.dot_product(dense);
        if score > 0 {
            heap.push(doc_id, score);
        }
        Ok(())
    }
}
