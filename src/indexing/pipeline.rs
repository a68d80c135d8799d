//! Walk → Load → Chunk → Embed → Store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::walker::DocumentWalker;
use crate::documents::{
    Chunk, Chunker, ChunkingConfig, Document, SlidingWindowChunker, StoreError, VectorStore,
    load_document,
};
use crate::logging::record;
use crate::vector::{EmbeddingError, EmbeddingGenerator};

/// Chunks embedded per call to the generator.
pub const EMBEDDING_BATCH_SIZE: usize = 64;

/// Errors that abort an indexing run.
///
/// Per-file load errors are not here: they are collected in [`IndexReport`].
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("cannot read documents directory {}: {source}", .path.display())]
    Root {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Progress updates during indexing.
#[derive(Debug, Clone)]
pub enum IndexProgress<'a> {
    /// Loading a file
    LoadingFile {
        current: usize,
        total: usize,
        path: &'a Path,
    },
    /// Embedding chunks, reported after each batch
    GeneratingEmbeddings { current: usize, total: usize },
}

/// A file that failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Statistics from an indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// Regular files found under the root (supported or not).
    pub files_seen: usize,
    pub files_loaded: usize,
    /// Files with an unsupported extension.
    pub files_skipped: usize,
    pub failures: Vec<LoadFailure>,
    pub documents: usize,
    pub chunks: usize,
    pub load_time: Duration,
    pub embedding_time: Duration,
    pub total_time: Duration,
}

/// Parameterised indexing pipeline.
pub struct IndexingPipeline {
    generator: Arc<dyn EmbeddingGenerator>,
    chunker: Box<dyn Chunker>,
    chunking: ChunkingConfig,
    store_path: PathBuf,
    walker: DocumentWalker,
}

impl IndexingPipeline {
    pub fn new(
        generator: Arc<dyn EmbeddingGenerator>,
        chunking: ChunkingConfig,
        store_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            generator,
            chunker: Box::new(SlidingWindowChunker::new()),
            chunking,
            store_path: store_path.into(),
            walker: DocumentWalker::new(),
        }
    }

    pub fn run(&self, docs_dir: &Path) -> Result<IndexReport, IndexError> {
        self.run_with_progress(docs_dir, |_| {})
    }

    /// Index every supported file under `docs_dir`, replacing the store.
    ///
    /// The existing store is only removed once the walk has succeeded.
    pub fn run_with_progress<F>(
        &self,
        docs_dir: &Path,
        mut on_progress: F,
    ) -> Result<IndexReport, IndexError>
    where
        F: FnMut(IndexProgress<'_>),
    {
        let started = Instant::now();
        let mut report = IndexReport::default();

        tracing::info!(target: "index", "{}", record::index_started(docs_dir));

        let walk = self.walker.walk(docs_dir).map_err(|source| IndexError::Root {
            path: docs_dir.to_path_buf(),
            source,
        })?;
        report.files_seen = walk.total();
        report.files_skipped = walk.skipped.len();

        // Load
        let load_started = Instant::now();
        let total_files = walk.files.len();
        let mut documents: Vec<Document> = Vec::new();
        for (idx, (path, _format)) in walk.files.iter().enumerate() {
            on_progress(IndexProgress::LoadingFile {
                current: idx + 1,
                total: total_files,
                path,
            });

            let file_started = Instant::now();
            match load_document(path) {
                Ok(docs) => {
                    tracing::info!(
                        target: "index",
                        "{}",
                        record::loaded(path, docs.len(), file_started.elapsed())
                    );
                    report.files_loaded += 1;
                    documents.extend(docs);
                }
                Err(e) => {
                    tracing::warn!(target: "index", "{}", record::load_failed(path, &e));
                    report.failures.push(LoadFailure {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report.load_time = load_started.elapsed();
        report.documents = documents.len();

        // Chunk
        let chunks = self.chunker.chunk_all(&documents, &self.chunking);
        drop(documents);
        report.chunks = chunks.len();
        tracing::info!(target: "index", "{}", record::chunks(chunks.len()));
        if chunks.is_empty() {
            tracing::warn!(
                target: "index",
                "no chunks generated from {}; the vector store will be empty",
                docs_dir.display()
            );
        }

        // Embed and store
        let embed_started = Instant::now();
        let mut store = VectorStore::create(
            &self.store_path,
            self.generator.model_name(),
            self.generator.dimension(),
        )?;
        self.embed_batched(&mut store, &chunks, &mut on_progress)?;
        store.commit()?;

        report.embedding_time = embed_started.elapsed();
        report.total_time = started.elapsed();
        tracing::info!(target: "index", "{}", record::embedding_time(report.embedding_time));
        tracing::info!(target: "index", "{}", record::total_time(report.total_time));

        Ok(report)
    }

    fn embed_batched<F>(
        &self,
        store: &mut VectorStore,
        chunks: &[Chunk],
        on_progress: &mut F,
    ) -> Result<(), IndexError>
    where
        F: FnMut(IndexProgress<'_>),
    {
        let total = chunks.len();
        let mut processed = 0;

        for batch in chunks.chunks(EMBEDDING_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let embeddings = self.generator.generate_embeddings(&texts)?;
            store.add(batch, &embeddings)?;

            processed += batch.len();
            on_progress(IndexProgress::GeneratingEmbeddings {
                current: processed,
                total,
            });
        }

        Ok(())
    }
}
