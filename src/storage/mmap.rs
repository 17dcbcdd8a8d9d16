//! Memory-mapped, append-only forward index.
//!
//! # Storage Format
//!
//! - Header (16 bytes): magic `SFWD`, version, vector count, reserved
//! - Records: `doc_id: u32`, `n: u32`, `n` tokens as `u16`, `n` weights as `u8`
//!
//! All integers are little-endian. An offset table keyed by document id is
//! rebuilt on open; the map is refreshed after every write so readers only
//! ever take a shared lock.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::storage::{
    SparseVectorForwardIndex, SparseVectorReader, SparseVectorWriter, StorageError, StorageResult,
};
use crate::vector::{DocId, SparseVector, TokenId};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes to identify forward index files.
const MAGIC_BYTES: &[u8; 4] = b"SFWD";

/// Byte offset of the vector count inside the header.
const COUNT_OFFSET: u64 = 8;

/// Fixed part of every record: doc id and entry count.
const RECORD_PREFIX: usize = 8;

const FILE_NAME: &str = "forward_index.vec";

#[derive(Debug)]
struct MmapState {
    mmap: Option<Mmap>,
    offsets: HashMap<DocId, usize>,
}

/// File-backed forward index.
#[derive(Debug)]
pub struct MmapForwardIndex {
    path: PathBuf,
    state: RwLock<MmapState>,
}

impl MmapForwardIndex {
    /// Opens the index in `base_path`, creating an empty file if needed.
    pub fn open_or_create(base_path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = base_path.as_ref().join(FILE_NAME);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&path)?;
            write_header(&mut file)?;
            file.flush()?;
            debug!("Created forward index at {}", path.display());
        }
        Self::open(base_path)
    }

    /// Opens an existing index. Fails if the file is missing or corrupt.
    pub fn open(base_path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = base_path.as_ref().join(FILE_NAME);
        if !path.exists() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Forward index file not found: {path:?}"),
            )));
        }

        let file = File::open(&path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let count = read_header(&mmap, &path)?;
        let offsets = scan_records(&mmap, &path)?;

        if offsets.len() != count {
            return Err(StorageError::InvalidFormat {
                path,
                reason: format!(
                    "header declares {count} vectors, found {}",
                    offsets.len()
                ),
            });
        }

        info!(
            "Opened forward index {} with {} vectors",
            path.display(),
            offsets.len()
        );
        Ok(Self {
            path,
            state: RwLock::new(MmapState {
                mmap: Some(mmap),
                offsets,
            }),
        })
    }

    /// Writes a fresh index holding exactly `vectors`, replacing any file
    /// already in `base_path`.
    ///
    /// The file is assembled beside the target and renamed into place, so a
    /// failed write leaves the previous index untouched.
    pub fn create(
        base_path: impl AsRef<Path>,
        vectors: &[(DocId, Arc<SparseVector>)],
    ) -> StorageResult<Self> {
        let base_path = base_path.as_ref();
        std::fs::create_dir_all(base_path)?;
        let path = base_path.join(FILE_NAME);
        let tmp_path = path.with_extension("vec.tmp");

        let written = (|| -> io::Result<usize> {
            let mut file = File::create(&tmp_path)?;
            write_header(&mut file)?;
            let records = {
                let mut writer = BufWriter::new(&mut file);
                let records =
                    append_records(&mut writer, HEADER_SIZE, &HashMap::new(), vectors)?;
                writer.flush()?;
                records
            };
            write_count(&mut file, records.len())?;
            file.sync_all()?;
            Ok(records.len())
        })();
        let written = match written {
            Ok(written) => written,
            Err(err) => {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(err.into());
            }
        };
        std::fs::rename(&tmp_path, &path)?;

        debug!("Wrote {written} vectors to {}", path.display());
        Self::open(base_path)
    }

    /// Appends a batch of vectors under one lock and one remap.
    ///
    /// Returns how many were stored; documents already present are skipped.
    /// A failed write truncates the file back to its length before the batch.
    pub fn insert_batch(&self, vectors: &[(DocId, Arc<SparseVector>)]) -> StorageResult<usize> {
        let mut state = self.state.write();
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let start_len = file.metadata()?.len();
        let offset = usize::try_from(start_len).map_err(|_| StorageError::InvalidFormat {
            path: self.path.clone(),
            reason: "file exceeds addressable size".to_string(),
        })?;

        let appended = {
            let mut writer = BufWriter::new(&file);
            append_records(&mut writer, offset, &state.offsets, vectors)
                .and_then(|records| writer.flush().map(|()| records))
        };
        let new_offsets = rollback_on_error(&file, start_len, &self.path, appended)?;
        if new_offsets.is_empty() {
            return Ok(0);
        }

        let stored = new_offsets.len();
        rollback_on_error(
            &file,
            start_len,
            &self.path,
            update_header_count(&self.path, state.offsets.len() + stored),
        )?;
        state.offsets.extend(new_offsets);
        // Remap so readers see the appended records.
        state.mmap = None;
        let file = File::open(&self.path)?;
        state.mmap = Some(unsafe { MmapOptions::new().map(&file)? });

        debug!("Appended {stored} vectors to {}", self.path.display());
        Ok(stored)
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.state.read().offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored document ids in ascending order.
    pub fn doc_ids(&self) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self.state.read().offsets.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the backing file in bytes.
    pub fn file_size(&self) -> Result<u64, io::Error> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

impl SparseVectorReader for MmapForwardIndex {
    fn read(&self, doc_id: DocId) -> StorageResult<Option<Arc<SparseVector>>> {
        let state = self.state.read();
        let Some(&offset) = state.offsets.get(&doc_id) else {
            return Ok(None);
        };
        let mmap = state.mmap.as_ref().ok_or_else(|| {
            StorageError::Unavailable(format!("{} is not mapped", self.path.display()))
        })?;
        let (_, vector, _) = decode_record(mmap, offset, &self.path)?;
        Ok(Some(Arc::new(vector)))
    }
}

impl SparseVectorWriter for MmapForwardIndex {
    fn insert(&self, doc_id: DocId, vector: Arc<SparseVector>) -> StorageResult<bool> {
        Ok(self.insert_batch(&[(doc_id, vector)])? == 1)
    }
}

impl SparseVectorForwardIndex for MmapForwardIndex {
    fn reader(&self) -> &dyn SparseVectorReader {
        self
    }

    fn writer(&self) -> &dyn SparseVectorWriter {
        self
    }
}

fn write_header(file: &mut File) -> Result<(), io::Error> {
    file.write_all(MAGIC_BYTES)?;
    file.write_all(&STORAGE_VERSION.to_le_bytes())?;
    file.write_all(&0u32.to_le_bytes())?;
    file.write_all(&0u32.to_le_bytes())?;
    Ok(())
}

fn read_header(bytes: &[u8], path: &Path) -> StorageResult<usize> {
    if bytes.len() < HEADER_SIZE {
        return Err(StorageError::InvalidFormat {
            path: path.to_path_buf(),
            reason: "file too small to contain header".to_string(),
        });
    }
    if &bytes[0..4] != MAGIC_BYTES {
        return Err(StorageError::InvalidFormat {
            path: path.to_path_buf(),
            reason: "invalid magic bytes".to_string(),
        });
    }

    let version = read_u32(bytes, 4);
    if version != STORAGE_VERSION {
        return Err(StorageError::VersionMismatch {
            expected: STORAGE_VERSION,
            actual: version,
        });
    }

    Ok(read_u32(bytes, 8) as usize)
}

fn update_header_count(path: &Path, count: usize) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    write_count(&mut file, count)
}

fn write_count(file: &mut File, count: usize) -> io::Result<()> {
    file.seek(SeekFrom::Start(COUNT_OFFSET))?;
    file.write_all(&(count as u32).to_le_bytes())?;
    file.flush()
}

/// Cuts `file` back to `len` when `result` failed, then surfaces the error.
fn rollback_on_error<T>(
    file: &File,
    len: u64,
    path: &Path,
    result: io::Result<T>,
) -> StorageResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!(
                "Write to {} failed, truncating to {len} bytes: {err}",
                path.display()
            );
            file.set_len(len)?;
            Err(err.into())
        }
    }
}

/// Writes every vector not in `existing` and not repeated earlier in the
/// batch, returning the offsets of the written records.
fn append_records(
    writer: &mut impl Write,
    mut offset: usize,
    existing: &HashMap<DocId, usize>,
    vectors: &[(DocId, Arc<SparseVector>)],
) -> io::Result<Vec<(DocId, usize)>> {
    let mut seen: HashSet<DocId> = HashSet::with_capacity(vectors.len());
    let mut new_offsets = Vec::new();
    for (doc_id, vector) in vectors {
        if existing.contains_key(doc_id) || !seen.insert(*doc_id) {
            continue;
        }
        let written = write_record(writer, *doc_id, vector)?;
        new_offsets.push((*doc_id, offset));
        offset += written;
    }
    Ok(new_offsets)
}

fn scan_records(bytes: &[u8], path: &Path) -> StorageResult<HashMap<DocId, usize>> {
    let mut offsets = HashMap::new();
    let mut offset = HEADER_SIZE;
    while offset < bytes.len() {
        let (doc_id, _, len) = decode_record(bytes, offset, path)?;
        offsets.entry(doc_id).or_insert(offset);
        offset += len;
    }
    Ok(offsets)
}

fn write_record(writer: &mut impl Write, doc_id: DocId, vector: &SparseVector) -> io::Result<usize> {
    writer.write_all(&doc_id.to_bytes())?;
    writer.write_all(&(vector.size() as u32).to_le_bytes())?;
    for token in vector.tokens() {
        writer.write_all(&token.to_le_bytes())?;
    }
    writer.write_all(vector.weights())?;
    Ok(RECORD_PREFIX + vector.size() * 3)
}

/// Decodes the record at `offset`, returning it with its encoded length.
fn decode_record(bytes: &[u8], offset: usize, path: &Path) -> StorageResult<(DocId, SparseVector, usize)> {
    let truncated = || StorageError::InvalidFormat {
        path: path.to_path_buf(),
        reason: format!("truncated record at byte {offset}"),
    };

    if offset + RECORD_PREFIX > bytes.len() {
        return Err(truncated());
    }
    let doc_id = DocId::new(read_u32(bytes, offset));
    let n = read_u32(bytes, offset + 4) as usize;
    let len = RECORD_PREFIX + n * 3;
    if offset + len > bytes.len() {
        return Err(truncated());
    }

    let tokens_start = offset + RECORD_PREFIX;
    let weights_start = tokens_start + n * 2;
    let tokens: Vec<TokenId> = bytes[tokens_start..weights_start]
        .chunks_exact(2)
        .map(|pair| TokenId::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let weights = bytes[weights_start..weights_start + n].to_vec();

    let vector =
        SparseVector::from_sorted_parts(tokens, weights).ok_or_else(|| StorageError::InvalidFormat {
            path: path.to_path_buf(),
            reason: format!("unsorted tokens in record for doc {doc_id}"),
        })?;
    Ok((doc_id, vector, len))
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
