//! Snapshot format for clustered postings.
//!
//! # Layout
//!
//! - Header (12 bytes): magic `SCLP`, version, term count
//! - Per term: token `u16`, cluster count `u32`, then per cluster:
//!   - flags `u8` (bit 0 should_not_skip, bit 1 has_summary)
//!   - summary, when present: `n: u32`, `n` tokens `u16`, `n` weights `u8`
//!   - member count `u32`, doc ids `u32`, weights `u8`
//!
//! All integers are little-endian.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::storage::{ClusteredPostingReader, ClusteredPostingWriter, StorageError, StorageResult};
use crate::vector::{DocId, DocumentCluster, SparseVector, TokenId};

const MAGIC_BYTES: &[u8; 4] = b"SCLP";
const SNAPSHOT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 12;

const FLAG_SHOULD_NOT_SKIP: u8 = 0b01;
const FLAG_HAS_SUMMARY: u8 = 0b10;

/// Default snapshot file name inside an index directory.
pub const POSTINGS_FILE_NAME: &str = "postings.clp";

/// Writes every term readable from `reader` to `path`, replacing the file.
///
/// Returns the number of terms written.
pub fn save_postings(path: &Path, reader: &dyn ClusteredPostingReader) -> StorageResult<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Written beside the target and renamed into place.
    let tmp_path = path.with_extension("clp.tmp");
    let terms = reader.terms();
    let declared = terms.len();
    let mut written = 0usize;
    {
        let mut out = BufWriter::new(File::create(&tmp_path)?);
        out.write_all(MAGIC_BYTES)?;
        out.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        out.write_all(&(declared as u32).to_le_bytes())?;

        for term in terms {
            let Some(clusters) = reader.read(term)? else {
                continue;
            };
            out.write_all(&term.to_le_bytes())?;
            out.write_all(&(clusters.size() as u32).to_le_bytes())?;
            for cluster in clusters.iter() {
                write_cluster(&mut out, cluster)?;
            }
            written += 1;
        }
        out.flush()?;
    }

    if written != declared {
        // A term disappeared between listing and reading; patch the count.
        patch_term_count(&tmp_path, written)?;
    }
    fs::rename(&tmp_path, path)?;

    info!("Saved {written} clustered terms to {}", path.display());
    Ok(written)
}

/// Loads a snapshot into `writer`. Terms already present in the writer are
/// skipped.
///
/// The whole file is decoded before anything is inserted, so a corrupt
/// snapshot leaves `writer` unchanged. Returns the number of terms newly
/// inserted.
pub fn load_postings(path: &Path, writer: &dyn ClusteredPostingWriter) -> StorageResult<usize> {
    let bytes = fs::read(path)?;
    let mut cursor = SnapshotCursor {
        bytes: &bytes,
        offset: 0,
        path: path.to_path_buf(),
    };

    let magic = cursor.take(4)?;
    if magic != MAGIC_BYTES {
        return Err(cursor.invalid("invalid magic bytes"));
    }
    let version = cursor.u32()?;
    if version != SNAPSHOT_VERSION {
        return Err(StorageError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            actual: version,
        });
    }

    let term_count = cursor.u32()? as usize;
    let mut terms: Vec<(TokenId, Vec<DocumentCluster>)> =
        Vec::with_capacity(term_count.min(bytes.len()));
    for _ in 0..term_count {
        let term = cursor.u16()?;
        let cluster_count = cursor.u32()? as usize;
        let mut clusters = Vec::with_capacity(cluster_count.min(bytes.len()));
        for _ in 0..cluster_count {
            clusters.push(read_cluster(&mut cursor)?);
        }
        terms.push((term, clusters));
    }

    if cursor.offset != bytes.len() {
        return Err(cursor.invalid("trailing bytes after last term"));
    }

    let mut inserted = 0usize;
    for (term, clusters) in terms {
        if writer.insert(term, clusters)? {
            inserted += 1;
        } else {
            debug!("Term {term} already present, snapshot entry skipped");
        }
    }

    info!(
        "Loaded {inserted} of {term_count} clustered terms from {}",
        path.display()
    );
    Ok(inserted)
}

fn write_cluster(out: &mut impl Write, cluster: &DocumentCluster) -> std::io::Result<()> {
    let mut flags = 0u8;
    if cluster.should_not_skip() {
        flags |= FLAG_SHOULD_NOT_SKIP;
    }
    if cluster.summary().is_some() {
        flags |= FLAG_HAS_SUMMARY;
    }
    out.write_all(&[flags])?;

    if let Some(summary) = cluster.summary() {
        out.write_all(&(summary.size() as u32).to_le_bytes())?;
        for token in summary.tokens() {
            out.write_all(&token.to_le_bytes())?;
        }
        out.write_all(summary.weights())?;
    }

    out.write_all(&(cluster.size() as u32).to_le_bytes())?;
    for doc_id in cluster.doc_ids() {
        out.write_all(&doc_id.to_bytes())?;
    }
    out.write_all(cluster.weights())
}

fn read_cluster(cursor: &mut SnapshotCursor<'_>) -> StorageResult<DocumentCluster> {
    let flags = cursor.take(1)?[0];
    if flags & !(FLAG_SHOULD_NOT_SKIP | FLAG_HAS_SUMMARY) != 0 {
        return Err(cursor.invalid("unknown cluster flags"));
    }

    let summary = if flags & FLAG_HAS_SUMMARY != 0 {
        let n = cursor.u32()? as usize;
        let tokens: Vec<TokenId> = cursor
            .take(n.saturating_mul(2))?
            .chunks_exact(2)
            .map(|pair| TokenId::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let weights = cursor.take(n)?.to_vec();
        Some(
            SparseVector::from_sorted_parts(tokens, weights)
                .ok_or_else(|| cursor.invalid("unsorted summary tokens"))?,
        )
    } else {
        None
    };

    let members = cursor.u32()? as usize;
    let doc_ids: Vec<DocId> = cursor
        .take(members.saturating_mul(4))?
        .chunks_exact(4)
        .map(|chunk| DocId::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let weights = cursor.take(members)?.to_vec();

    DocumentCluster::from_parts(summary, doc_ids, weights, flags & FLAG_SHOULD_NOT_SKIP != 0)
        .ok_or_else(|| cursor.invalid("cluster members out of order"))
}

fn patch_term_count(path: &Path, count: usize) -> StorageResult<()> {
    use std::io::{Seek, SeekFrom};

    let mut file = fs::OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start((HEADER_SIZE - 4) as u64))?;
    file.write_all(&(count as u32).to_le_bytes())?;
    Ok(())
}

struct SnapshotCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
    path: PathBuf,
}

impl<'a> SnapshotCursor<'a> {
    fn take(&mut self, len: usize) -> StorageResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| self.invalid("unexpected end of snapshot"))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u16(&mut self) -> StorageResult<u16> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self) -> StorageResult<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn invalid(&self, reason: &str) -> StorageError {
        StorageError::InvalidFormat {
            path: self.path.clone(),
            reason: format!("{reason} (byte {})", self.offset),
        }
    }
}
