//! Read-through cache in front of a slower forward-index reader.

use std::sync::Arc;

use tracing::debug;

use crate::storage::{SparseVectorReader, SparseVectorWriter, StorageResult};
use crate::vector::{DocId, SparseVector};

/// Serves reads from a cache, falling back to a backing reader on a miss.
///
/// Misses are written into the cache through its writer, so the cache's own
/// skip-if-exists and eviction rules decide what is retained.
pub struct CacheGatedForwardIndexReader<C, B> {
    cache: C,
    backing: B,
}

impl<C, B> CacheGatedForwardIndexReader<C, B>
where
    C: SparseVectorReader + SparseVectorWriter,
    B: SparseVectorReader,
{
    pub fn new(cache: C, backing: B) -> Self {
        Self { cache, backing }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }
}

impl<C, B> SparseVectorReader for CacheGatedForwardIndexReader<C, B>
where
    C: SparseVectorReader + SparseVectorWriter,
    B: SparseVectorReader,
{
    fn read(&self, doc_id: DocId) -> StorageResult<Option<Arc<SparseVector>>> {
        if let Some(vector) = self.cache.read(doc_id)? {
            return Ok(Some(vector));
        }

        let Some(vector) = self.backing.read(doc_id)? else {
            return Ok(None);
        };
        if !self.cache.insert(doc_id, Arc::clone(&vector))? {
            debug!("Vector for doc {doc_id} not retained by cache");
        }
        Ok(Some(vector))
    }
}
