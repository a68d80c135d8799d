//! Document loading, chunking and vector storage.
//!
//! This module provides:
//! - Format-specific loaders (PDF, DOCX, XLSX, plain text)
//! - Sliding-window chunking over characters
//! - The persisted vector store used for retrieval

pub mod chunker;
pub mod config;
pub mod loader;
pub mod schema;
pub mod store;
pub mod types;

pub use chunker::{Chunker, RawChunk, SlidingWindowChunker};
pub use config::ChunkingConfig;
pub use loader::{DocumentFormat, LoadError, load_document};
pub use schema::DocumentSchema;
pub use store::{ScoredChunk, StoreError, StoreMeta, VectorStore};
pub use types::{Chunk, ChunkId, Document, DocumentMetadata};

use crate::config::Settings;
use crate::vector::EmbeddingGenerator;

/// Open the configured vector store and check it matches the embedder.
pub fn open_store(
    settings: &Settings,
    generator: &dyn EmbeddingGenerator,
) -> Result<VectorStore, StoreError> {
    let path = &settings.paths.vectorstore_dir;
    let store = VectorStore::open(path)?;

    if store.dimension() != generator.dimension() {
        return Err(StoreError::DimensionMismatch {
            expected: store.dimension(),
            actual: generator.dimension(),
        });
    }
    if store.embedding_model() != generator.model_name() {
        tracing::warn!(
            target: "documents",
            "store was built with '{}' but the configured embedding model is '{}'",
            store.embedding_model(),
            generator.model_name()
        );
    }

    tracing::info!(
        target: "documents",
        "loaded vector store from {} ({} chunks)",
        path.display(),
        store.len()
    );
    Ok(store)
}
