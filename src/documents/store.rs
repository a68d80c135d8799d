//! Persisted vector store for document chunks.
//!
//! Combines a tantivy index for chunk text and metadata with a memory-mapped
//! vector file searched by exact cosine similarity.
//!
//! Layout under the store directory:
//! - `tantivy/`    - chunk metadata and text
//! - `vectors.bin` - embeddings keyed by chunk id
//! - `store.json`  - embedding model, dimension and counters

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::directory::error::OpenDirectoryError;
use tantivy::query::TermQuery;
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use thiserror::Error;

use super::schema::DocumentSchema;
use super::types::{Chunk, ChunkId, DocumentMetadata};
use crate::vector::{MmapVectorStorage, VectorStorageError, cosine_similarity};

const TANTIVY_DIR: &str = "tantivy";
const VECTORS_FILE: &str = "vectors.bin";
const META_FILE: &str = "store.json";
const STORE_FORMAT_VERSION: u32 = 1;

/// Tantivy writer heap.
const WRITER_HEAP_SIZE: usize = 50_000_000;

/// Errors from vector store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Directory error: {0}")]
    Directory(#[from] OpenDirectoryError),

    #[error("Vector storage error: {0}")]
    VectorStorage(#[from] VectorStorageError),

    #[error("Invalid store metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("no vector store at {} (run `docchat index` first)", .0.display())]
    NotFound(PathBuf),

    #[error("embedding dimension mismatch: store has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{chunks} chunks but {embeddings} embeddings")]
    CountMismatch { chunks: usize, embeddings: usize },

    #[error("chunk id space exhausted")]
    IdsExhausted,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl ScoredChunk {
    pub fn source(&self) -> String {
        self.chunk.metadata.source_display()
    }
}

/// Contents of `store.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub next_chunk_id: u32,
    pub created_at: String,
}

/// Chunk store with exact nearest-neighbour search.
pub struct VectorStore {
    base_path: PathBuf,
    index: Index,
    reader: IndexReader,
    schema: DocumentSchema,
    writer: Mutex<Option<IndexWriter<TantivyDocument>>>,
    vectors: MmapVectorStorage,
    meta: StoreMeta,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("base_path", &self.base_path)
            .field("embedding_model", &self.meta.embedding_model)
            .field("dimension", &self.meta.dimension)
            .field("chunk_count", &self.meta.chunk_count)
            .finish()
    }
}

impl VectorStore {
    /// Create an empty store, removing any previous store at `base_path`.
    ///
    /// Only the store's own files are removed; unrelated files in the directory
    /// are left alone.
    pub fn create(
        base_path: impl AsRef<Path>,
        embedding_model: &str,
        dimension: usize,
    ) -> StoreResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;

        let index_path = base_path.join(TANTIVY_DIR);
        if index_path.exists() {
            std::fs::remove_dir_all(&index_path)?;
        }
        for file in [VECTORS_FILE, META_FILE] {
            let path = base_path.join(file);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        std::fs::create_dir_all(&index_path)?;

        let (tantivy_schema, schema) = DocumentSchema::build();
        let dir = MmapDirectory::open(&index_path)?;
        let index = Index::create(dir, tantivy_schema, IndexSettings::default())?;
        let reader = Self::reader_for(&index)?;

        let vectors = MmapVectorStorage::create(base_path.join(VECTORS_FILE), dimension)?;

        let meta = StoreMeta {
            format_version: STORE_FORMAT_VERSION,
            embedding_model: embedding_model.to_string(),
            dimension,
            chunk_count: 0,
            next_chunk_id: 1,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let store = Self {
            base_path,
            index,
            reader,
            schema,
            writer: Mutex::new(None),
            vectors,
            meta,
        };
        store.save_meta()?;

        Ok(store)
    }

    /// Open an existing store.
    pub fn open(base_path: impl AsRef<Path>) -> StoreResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        let meta_path = base_path.join(META_FILE);
        if !meta_path.exists() {
            return Err(StoreError::NotFound(base_path));
        }

        let meta: StoreMeta = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)?;

        let index = Index::open_in_dir(base_path.join(TANTIVY_DIR))?;
        let reader = Self::reader_for(&index)?;
        reader.reload()?;

        let vectors = MmapVectorStorage::open(base_path.join(VECTORS_FILE))?;
        if vectors.dimension() != meta.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: meta.dimension,
                actual: vectors.dimension(),
            });
        }

        let (_, schema) = DocumentSchema::build();

        Ok(Self {
            base_path,
            index,
            reader,
            schema,
            writer: Mutex::new(None),
            vectors,
            meta,
        })
    }

    /// Check whether a store exists at `base_path`.
    pub fn exists(base_path: impl AsRef<Path>) -> bool {
        base_path.as_ref().join(META_FILE).exists()
    }

    fn reader_for(index: &Index) -> StoreResult<IndexReader> {
        Ok(index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    pub fn dimension(&self) -> usize {
        self.meta.dimension
    }

    pub fn embedding_model(&self) -> &str {
        &self.meta.embedding_model
    }

    /// Number of committed chunks.
    pub fn len(&self) -> usize {
        self.meta.chunk_count
    }

    pub fn is_empty(&self) -> bool {
        self.meta.chunk_count == 0
    }

    /// Add chunks with their embeddings. Call [`commit`](Self::commit) to persist.
    pub fn add(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> StoreResult<Vec<ChunkId>> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.meta.dimension) {
            return Err(StoreError::DimensionMismatch {
                expected: self.meta.dimension,
                actual: bad.len(),
            });
        }

        let mut ids = Vec::with_capacity(chunks.len());
        for _ in chunks {
            ids.push(self.allocate_chunk_id()?);
        }

        {
            let mut writer_guard = self.writer.lock();
            if writer_guard.is_none() {
                *writer_guard = Some(self.index.writer(WRITER_HEAP_SIZE)?);
            }
            if let Some(writer) = writer_guard.as_mut() {
                let indexed_at = chrono::Utc::now().timestamp().max(0) as u64;
                for (id, chunk) in ids.iter().zip(chunks) {
                    writer.add_document(self.to_document(*id, chunk, indexed_at))?;
                }
            }
        }

        let pairs: Vec<(ChunkId, &[f32])> = ids
            .iter()
            .copied()
            .zip(embeddings.iter().map(Vec::as_slice))
            .collect();
        self.vectors.write_batch(&pairs)?;

        self.meta.chunk_count += chunks.len();
        Ok(ids)
    }

    /// Commit pending chunks and persist store metadata.
    pub fn commit(&mut self) -> StoreResult<()> {
        {
            let mut writer_guard = self.writer.lock();
            if writer_guard.is_none() {
                *writer_guard = Some(self.index.writer(WRITER_HEAP_SIZE)?);
            }
            if let Some(writer) = writer_guard.as_mut() {
                writer.commit()?;
            }
        }

        self.reader.reload()?;
        self.save_meta()
    }

    /// Top-K chunks by cosine similarity to `query`, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> StoreResult<Vec<ScoredChunk>> {
        if query.len() != self.meta.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.meta.dimension,
                actual: query.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(ChunkId, f32)> = self
            .vectors
            .iter()
            .map(|(id, vector)| (id, cosine_similarity(query, &vector)))
            .filter(|(_, score)| score.is_finite())
            .collect();

        // Ties keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        let mut results = Vec::with_capacity(scored.len());
        for (id, score) in scored {
            if let Some(chunk) = self.get_chunk(id)? {
                results.push(ScoredChunk { chunk, score });
            }
        }

        Ok(results)
    }

    /// Fetch a committed chunk by id.
    pub fn get_chunk(&self, id: ChunkId) -> StoreResult<Option<Chunk>> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_u64(self.schema.chunk_id, id.get() as u64);
        let query = TermQuery::new(term, IndexRecordOption::Basic);

        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        let Some((_score, address)) = top_docs.first() else {
            return Ok(None);
        };

        let doc: TantivyDocument = searcher.doc(*address)?;
        Ok(Some(self.to_chunk(&doc)))
    }

    fn allocate_chunk_id(&mut self) -> StoreResult<ChunkId> {
        let id = ChunkId::from_u32(self.meta.next_chunk_id).ok_or(StoreError::IdsExhausted)?;
        self.meta.next_chunk_id = self
            .meta
            .next_chunk_id
            .checked_add(1)
            .ok_or(StoreError::IdsExhausted)?;
        Ok(id)
    }

    fn to_document(&self, id: ChunkId, chunk: &Chunk, indexed_at: u64) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_u64(self.schema.chunk_id, id.get() as u64);
        doc.add_text(
            self.schema.source_path,
            chunk.metadata.source.to_string_lossy().as_ref(),
        );
        doc.add_text(self.schema.content, &chunk.content);
        doc.add_u64(self.schema.chunk_index, chunk.index as u64);
        doc.add_u64(self.schema.char_start, chunk.char_range.0 as u64);
        doc.add_u64(self.schema.char_end, chunk.char_range.1 as u64);
        if let Some(page) = chunk.metadata.page {
            doc.add_u64(self.schema.page, page as u64);
        }
        if let Some(sheet) = &chunk.metadata.sheet {
            doc.add_text(self.schema.sheet, sheet);
        }
        doc.add_u64(self.schema.indexed_at, indexed_at);
        doc
    }

    fn to_chunk(&self, doc: &TantivyDocument) -> Chunk {
        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let number = |field| doc.get_first(field).and_then(|v| v.as_u64());

        let mut metadata = DocumentMetadata::new(text(self.schema.source_path).unwrap_or_default());
        metadata.page = number(self.schema.page).map(|p| p as u32);
        metadata.sheet = text(self.schema.sheet);

        Chunk {
            content: text(self.schema.content).unwrap_or_default(),
            char_range: (
                number(self.schema.char_start).unwrap_or(0) as usize,
                number(self.schema.char_end).unwrap_or(0) as usize,
            ),
            index: number(self.schema.chunk_index).unwrap_or(0) as usize,
            metadata,
        }
    }

    fn save_meta(&self) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&self.meta)?;
        std::fs::write(self.base_path.join(META_FILE), json)?;
        Ok(())
    }
}
