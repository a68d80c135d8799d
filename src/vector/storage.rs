//! Memory-mapped storage for chunk embeddings.
//!
//! File layout (little-endian):
//!
//! ```text
//! "DCVS" | version: u32 | dimension: u32 | { chunk_id: u32, [f32; dimension] }*
//! ```
//!
//! Records are append-only. The map is refreshed after every append so reads
//! always see what has been written.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;

use crate::documents::ChunkId;

const MAGIC: &[u8; 4] = b"DCVS";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum VectorStorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid vector file header: {0}")]
    InvalidHeader(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector file is corrupted: {0}")]
    Corrupted(String),
}

/// Append-only vector file with a read-only memory map over it.
#[derive(Debug)]
pub struct MmapVectorStorage {
    path: PathBuf,
    dimension: usize,
    mmap: Mmap,
}

impl MmapVectorStorage {
    /// Create a new, empty vector file, replacing any existing one.
    pub fn create(path: impl AsRef<Path>, dimension: usize) -> Result<Self, VectorStorageError> {
        let path = path.as_ref().to_path_buf();
        if dimension == 0 {
            return Err(VectorStorageError::InvalidHeader(
                "dimension must be non-zero".to_string(),
            ));
        }

        let mut file = File::create(&path)?;
        file.write_all(MAGIC)?;
        file.write_all(&VERSION.to_le_bytes())?;
        file.write_all(&(dimension as u32).to_le_bytes())?;
        file.sync_all()?;

        Self::open(path)
    }

    /// Open an existing vector file and validate its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorStorageError> {
        let path = path.as_ref().to_path_buf();
        let mmap = map_file(&path)?;

        if mmap.len() < HEADER_LEN || &mmap[0..4] != MAGIC {
            return Err(VectorStorageError::InvalidHeader(format!(
                "{} is not a vector file",
                path.display()
            )));
        }

        let version = read_u32(&mmap, 4);
        if version != VERSION {
            return Err(VectorStorageError::InvalidHeader(format!(
                "unsupported version {version}"
            )));
        }

        let dimension = read_u32(&mmap, 8) as usize;
        if dimension == 0 {
            return Err(VectorStorageError::InvalidHeader(
                "dimension is zero".to_string(),
            ));
        }

        let storage = Self {
            path,
            dimension,
            mmap,
        };

        let body = storage.mmap.len() - HEADER_LEN;
        if body % storage.record_len() != 0 {
            return Err(VectorStorageError::Corrupted(format!(
                "{body} bytes of records is not a multiple of the record size {}",
                storage.record_len()
            )));
        }

        Ok(storage)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        (self.mmap.len() - HEADER_LEN) / self.record_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a batch of vectors and refresh the map.
    pub fn write_batch(&mut self, vectors: &[(ChunkId, &[f32])]) -> Result<(), VectorStorageError> {
        for (_, vector) in vectors {
            if vector.len() != self.dimension {
                return Err(VectorStorageError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for (id, vector) in vectors {
            writer.write_all(&id.to_bytes())?;
            for value in vector.iter() {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;

        self.mmap = map_file(&self.path)?;
        Ok(())
    }

    /// Iterate over all records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ChunkId, Vec<f32>)> + '_ {
        self.mmap[HEADER_LEN..]
            .chunks_exact(self.record_len())
            .filter_map(|record| {
                let id = ChunkId::from_bytes([record[0], record[1], record[2], record[3]])?;
                let vector = record[4..]
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                Some((id, vector))
            })
    }

    fn record_len(&self) -> usize {
        4 + self.dimension * 4
    }
}

fn map_file(path: &Path) -> Result<Mmap, VectorStorageError> {
    let file = File::open(path)?;
    // SAFETY: the file is only ever appended to by this process, and the map
    // is replaced after every append.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(n: u32) -> ChunkId {
        ChunkId::from_u32(n).unwrap()
    }

    #[test]
    fn test_create_write_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.bin");

        let mut storage = MmapVectorStorage::create(&path, 3).unwrap();
        assert!(storage.is_empty());

        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 0.5, -0.5];
        storage
            .write_batch(&[(id(1), &a[..]), (id(2), &b[..])])
            .unwrap();
        assert_eq!(storage.len(), 2);

        let reopened = MmapVectorStorage::open(&path).unwrap();
        assert_eq!(reopened.dimension(), 3);
        let records: Vec<_> = reopened.iter().collect();
        assert_eq!(records, vec![(id(1), a.to_vec()), (id(2), b.to_vec())]);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = MmapVectorStorage::create(temp_dir.path().join("v.bin"), 4).unwrap();

        let short = [1.0, 2.0];
        let result = storage.write_batch(&[(id(1), &short[..])]);
        assert!(matches!(
            result,
            Err(VectorStorageError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_rejects_foreign_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("v.bin");
        std::fs::write(&path, b"not a vector file at all").unwrap();

        assert!(matches!(
            MmapVectorStorage::open(&path),
            Err(VectorStorageError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_truncated_record_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("v.bin");
        let mut storage = MmapVectorStorage::create(&path, 2).unwrap();
        let v = [1.0, 2.0];
        storage.write_batch(&[(id(7), &v[..])]).unwrap();
        drop(storage);

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.pop();
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            MmapVectorStorage::open(&path),
            Err(VectorStorageError::Corrupted(_))
        ));
    }
}
