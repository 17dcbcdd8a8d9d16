//! Sparse index that orchestrates ingestion, clustering and search.
//!
//! This module is the main entry point: it owns the forward index, the
//! clustered postings and the per-term posting buffers that accumulate until
//! the next [`SparseIndex::build`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clustering::{
    ClusteringResult, RandomClustering, SeismicParams, SeismicPostingClusterer,
};
use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::query::{QueryParams, SearchResults, SeismicSearcher};
use crate::storage::{
    CacheGatedForwardIndexReader, ClusteredPostingReader, InMemoryClusteredPosting, InMemoryForwardIndex, IndexMetadata, METADATA_FILE_NAME,
    MmapForwardIndex, POSTINGS_FILE_NAME, SparseVectorForwardIndex, SparseVectorReader,
    SparseVectorWriter, load_postings, save_postings,
};
use crate::vector::{
    DocId, DocWeight, DocumentCluster, QuantizationCeilings, SparseVector, TokenId,
};

/// Construction options for a [`SparseIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub ceilings: QuantizationCeilings,
    pub params: SeismicParams,
    pub parallel_threads: usize,
    pub seed: Option<u64>,
    /// Byte budget of the vector cache in front of an on-disk forward index.
    pub cache_bytes: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ceilings: QuantizationCeilings::default(),
            params: SeismicParams::default(),
            parallel_threads: num_cpus::get(),
            seed: None,
            cache_bytes: None,
        }
    }
}

impl From<&Settings> for IndexConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            ceilings: settings.ceilings(),
            params: settings.seismic_params(),
            parallel_threads: settings.clustering.parallel_threads,
            seed: settings.clustering.seed,
            cache_bytes: None,
        }
    }
}

/// Outcome of one [`SparseIndex::build`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildStats {
    pub terms: usize,
    pub clusters: usize,
    pub postings: usize,
    pub n_postings: usize,
    /// True when the document count was below the approximate threshold.
    pub exhaustive: bool,
    pub elapsed: Duration,
}

/// Snapshot of index size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub doc_count: usize,
    pub term_count: usize,
    pub cluster_count: usize,
    pub posting_count: usize,
    pub pending_terms: usize,
    pub posting_bytes: usize,
    pub cache_bytes: usize,
}

/// Forward index backed by a memory-mapped file with a read-through cache.
struct DiskForwardIndex {
    store: Arc<MmapForwardIndex>,
    reader: CacheGatedForwardIndexReader<InMemoryForwardIndex, Arc<MmapForwardIndex>>,
}

impl SparseVectorForwardIndex for DiskForwardIndex {
    fn reader(&self) -> &dyn SparseVectorReader {
        &self.reader
    }

    fn writer(&self) -> &dyn SparseVectorWriter {
        self.store.as_ref()
    }
}

enum ForwardStorage {
    Memory(InMemoryForwardIndex),
    Disk(DiskForwardIndex),
}

impl ForwardStorage {
    fn index(&self) -> &dyn SparseVectorForwardIndex {
        match self {
            Self::Memory(index) => index,
            Self::Disk(index) => index,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Memory(index) => index.len(),
            Self::Disk(index) => index.store.len(),
        }
    }

    fn cache_bytes(&self) -> usize {
        match self {
            Self::Memory(index) => index.ram_bytes_used(),
            Self::Disk(index) => index.reader.cache().ram_bytes_used(),
        }
    }
}

/// Embedded sparse-vector index.
pub struct SparseIndex {
    config: IndexConfig,
    forward: ForwardStorage,
    postings: InMemoryClusteredPosting,
    pending: DashMap<TokenId, Vec<DocWeight>>,
    build_lock: Mutex<()>,
}

impl SparseIndex {
    /// Creates an empty index held entirely in memory.
    pub fn in_memory(config: IndexConfig) -> IndexResult<Self> {
        config.params.validate()?;
        Ok(Self {
            config,
            forward: ForwardStorage::Memory(InMemoryForwardIndex::new()),
            postings: InMemoryClusteredPosting::new(),
            pending: DashMap::new(),
            build_lock: Mutex::new(()),
        })
    }

    /// Whether `dir` holds a saved index.
    pub fn exists(dir: impl AsRef<Path>) -> bool {
        dir.as_ref().join(METADATA_FILE_NAME).is_file()
    }

    /// Opens an index saved in `dir`.
    ///
    /// Ceilings and method parameters come from the saved metadata; threads,
    /// seed and cache budget come from `config`.
    pub fn open(dir: impl AsRef<Path>, config: IndexConfig) -> IndexResult<Self> {
        let dir = dir.as_ref();
        let metadata = IndexMetadata::load(dir)?.ok_or_else(|| IndexError::IndexNotFound {
            path: dir.to_path_buf(),
        })?;

        let ceilings = metadata.ceilings()?;
        let params = if metadata.method_parameters.is_empty() {
            config.params
        } else {
            SeismicParams::from_map(&metadata.method_parameters)?
        };

        let store = Arc::new(MmapForwardIndex::open(dir)?);
        let cache = match config.cache_bytes {
            Some(limit) => InMemoryForwardIndex::with_memory_limit(limit),
            None => InMemoryForwardIndex::new(),
        };
        let forward = DiskForwardIndex {
            reader: CacheGatedForwardIndexReader::new(cache, Arc::clone(&store)),
            store,
        };

        let postings = InMemoryClusteredPosting::new();
        let postings_path = dir.join(POSTINGS_FILE_NAME);
        if postings_path.exists() {
            load_postings(&postings_path, &postings)?;
        }

        if metadata.doc_count as usize != forward.store.len() {
            return Err(IndexError::IndexCorrupted {
                reason: format!(
                    "metadata records {} documents, forward index holds {}",
                    metadata.doc_count,
                    forward.store.len()
                ),
            });
        }

        info!(
            "Opened index at {} ({} documents, {} terms)",
            dir.display(),
            forward.store.len(),
            postings.size()
        );
        Ok(Self {
            config: IndexConfig {
                ceilings,
                params,
                ..config
            },
            forward: ForwardStorage::Disk(forward),
            postings,
            pending: DashMap::new(),
            build_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn ceilings(&self) -> QuantizationCeilings {
        self.config.ceilings
    }

    /// Quantizes a raw `token -> weight` map with the ingest ceiling and
    /// stores it.
    ///
    /// Returns `false` when `doc_id` was already indexed; the new vector is
    /// then ignored entirely.
    pub fn ingest<K: AsRef<str>>(
        &self,
        doc_id: DocId,
        vector: impl IntoIterator<Item = (K, f32)>,
    ) -> IndexResult<bool> {
        let quantizer = self.config.ceilings.ingest_quantizer();
        let vector = SparseVector::from_string_map(vector, &quantizer)?;
        self.ingest_quantized(doc_id, Arc::new(vector))
    }

    /// Stores an already quantized vector.
    ///
    /// [`DocId::NO_MORE_DOCS`] marks exhausted iterators and is rejected.
    pub fn ingest_quantized(&self, doc_id: DocId, vector: Arc<SparseVector>) -> IndexResult<bool> {
        if doc_id.is_terminated() {
            return Err(IndexError::ReservedDocId {
                doc_id: doc_id.get(),
            });
        }
        if !self.forward.index().writer().insert(doc_id, Arc::clone(&vector))? {
            debug!("Document {doc_id} already indexed, skipping");
            return Ok(false);
        }

        for item in vector.iter() {
            self.pending
                .entry(item.token)
                .or_default()
                .push(DocWeight::new(doc_id, item.weight));
        }
        Ok(true)
    }

    /// Clusters every term touched since the last build.
    ///
    /// Nothing is committed unless every term clusters successfully; on error
    /// the pending postings and the previous clusters are left as they were.
    pub fn build(&self) -> IndexResult<BuildStats> {
        self.build_with_progress(|| {})
    }

    /// Like [`SparseIndex::build`], calling `on_term` after each term.
    pub fn build_with_progress<F>(&self, on_term: F) -> IndexResult<BuildStats>
    where
        F: Fn() + Sync,
    {
        let _guard = self.build_lock.lock();
        let start = Instant::now();
        let terms: Vec<TokenId> = self.pending.iter().map(|entry| *entry.key()).collect();

        // (term, pending entries consumed, full posting list)
        let mut work: Vec<(TokenId, usize, Vec<DocWeight>)> = Vec::with_capacity(terms.len());
        for term in terms {
            let Some(mut postings) = self.pending.get(&term).map(|entry| entry.value().clone())
            else {
                continue;
            };
            let consumed = postings.len();
            // Fold previously built members back in so a rebuild sees the whole list.
            if let Some(existing) = self.postings.read(term)? {
                postings.extend(existing.iter().flat_map(DocumentCluster::iter));
            }
            work.push((term, consumed, postings));
        }

        let doc_count = self.forward.len();
        let n_postings = self.config.params.resolve_n_postings(doc_count);
        let exhaustive = doc_count < self.config.params.approximate_threshold;
        info!(
            "Building {} terms over {doc_count} documents (n_postings={n_postings}, exhaustive={exhaustive})",
            work.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.parallel_threads.max(1))
            .build()
            .map_err(|e| IndexError::General(format!("Failed to create thread pool: {e}")))?;

        let reader = self.forward.index().reader();
        let results: ClusteringResult<Vec<(TokenId, usize, Vec<DocumentCluster>)>> =
            pool.install(|| {
                work.par_iter()
                    .map(|(term, consumed, postings)| {
                        let clusters = if exhaustive {
                            vec![DocumentCluster::new(None, postings, true)]
                        } else {
                            self.clusterer(*term, n_postings, reader).cluster(postings)?
                        };
                        on_term();
                        Ok((*term, *consumed, clusters))
                    })
                    .collect()
            });
        let results = results.inspect_err(|e| {
            warn!("Build failed, {} pending terms kept: {e}", work.len());
        })?;

        let mut stats = BuildStats {
            n_postings,
            exhaustive,
            ..BuildStats::default()
        };
        for (term, consumed, clusters) in results {
            stats.terms += 1;
            stats.clusters += clusters.len();
            stats.postings += clusters.iter().map(DocumentCluster::size).sum::<usize>();
            self.postings.replace(term, clusters);
            self.release_pending(term, consumed);
        }
        stats.elapsed = start.elapsed();

        info!(
            "Built {} terms into {} clusters in {:.2?}",
            stats.terms, stats.clusters, stats.elapsed
        );
        Ok(stats)
    }

    /// Drops the first `consumed` pending postings of `term`. Postings
    /// ingested while the build ran stay queued for the next one.
    fn release_pending(&self, term: TokenId, consumed: usize) {
        if let Entry::Occupied(mut entry) = self.pending.entry(term) {
            let postings = entry.get_mut();
            postings.drain(..consumed.min(postings.len()));
            if postings.is_empty() {
                entry.remove();
            }
        }
    }

    fn clusterer<'a>(
        &self,
        term: TokenId,
        n_postings: usize,
        reader: &'a dyn SparseVectorReader,
    ) -> SeismicPostingClusterer<RandomClustering<&'a dyn SparseVectorReader>> {
        let params = &self.config.params;
        let mut algorithm =
            RandomClustering::new(params.summary_prune_ratio, params.cluster_ratio, reader);
        if let Some(seed) = self.config.seed {
            algorithm = algorithm.with_seed(seed ^ u64::from(term));
        }
        SeismicPostingClusterer::new(n_postings, algorithm)
    }

    /// Searches with a raw `token -> weight` query.
    pub fn search<K: AsRef<str>>(
        &self,
        query: impl IntoIterator<Item = (K, f32)>,
        params: &QueryParams,
    ) -> IndexResult<SearchResults> {
        if !self.pending.is_empty() {
            warn!(
                "{} terms ingested since the last build are not searchable yet",
                self.pending.len()
            );
        }
        let quantizer = self.config.ceilings.search_quantizer();
        let query = SparseVector::from_string_map(query, &quantizer)?;
        let searcher = SeismicSearcher::new(
            &self.postings,
            self.forward.index().reader(),
            self.config.ceilings,
        );
        Ok(searcher.search(&query, params)?)
    }

    /// Stored vector of `doc_id`.
    pub fn vector(&self, doc_id: DocId) -> IndexResult<Option<Arc<SparseVector>>> {
        Ok(self.forward.index().reader().read(doc_id)?)
    }

    /// Clustered postings, for inspection.
    pub fn postings(&self) -> &dyn ClusteredPostingReader {
        &self.postings
    }

    /// Writes forward vectors, clustered postings and metadata into `dir`.
    ///
    /// Terms ingested since the last build are not saved.
    pub fn save(&self, dir: impl AsRef<Path>) -> IndexResult<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| IndexError::FileWrite {
            path: dir.to_path_buf(),
            source,
        })?;
        if !self.pending.is_empty() {
            warn!(
                "Saving without building: {} pending terms are dropped",
                self.pending.len()
            );
        }

        // Any forward file already in `dir` is replaced, never appended to.
        match &self.forward {
            ForwardStorage::Memory(index) => {
                let store = MmapForwardIndex::create(dir, &index.entries())?;
                debug!("Wrote {} vectors to {}", store.len(), store.path().display());
            }
            ForwardStorage::Disk(index) => {
                if !same_dir(index.store.path(), dir) {
                    let mut batch = Vec::with_capacity(index.store.len());
                    for doc_id in index.store.doc_ids() {
                        if let Some(vector) = index.store.read(doc_id)? {
                            batch.push((doc_id, vector));
                        }
                    }
                    MmapForwardIndex::create(dir, &batch)?;
                }
            }
        }

        save_postings(&dir.join(POSTINGS_FILE_NAME), &self.postings)?;

        let mut metadata = IndexMetadata::new();
        metadata.update_counts(self.forward.len() as u64, self.postings.size() as u64);
        metadata.set_ceilings(&self.config.ceilings);
        metadata.method_parameters = self.config.params.to_map();
        metadata.save(dir)?;

        info!(
            "Saved index to {} ({} documents, {} terms)",
            dir.display(),
            metadata.doc_count,
            metadata.term_count
        );
        Ok(())
    }

    pub fn doc_count(&self) -> usize {
        self.forward.len()
    }

    pub fn stats(&self) -> IndexStats {
        let entries = self.postings.entries();
        IndexStats {
            doc_count: self.forward.len(),
            term_count: entries.len(),
            cluster_count: entries.iter().map(|(_, clusters)| clusters.size()).sum(),
            posting_count: entries
                .iter()
                .map(|(_, clusters)| clusters.posting_count())
                .sum(),
            pending_terms: self.pending.len(),
            posting_bytes: self.postings.ram_bytes_used(),
            cache_bytes: self.forward.cache_bytes(),
        }
    }
}

fn same_dir(file: &Path, dir: &Path) -> bool {
    let canonical = |path: &Path| path.canonicalize().unwrap_or_else(|_| PathBuf::from(path));
    file.parent()
        .is_some_and(|parent| canonical(parent) == canonical(dir))
}
