//! Retrieval of relevant chunks for a question.

use std::sync::Arc;

use thiserror::Error;

use crate::documents::{ScoredChunk, StoreError, VectorStore};
use crate::vector::{EmbeddingError, EmbeddingGenerator};

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("failed to embed question: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),
}

/// Finds the chunks most similar to a question.
///
/// Implementations block (embedding, disk); async callers run them on the
/// blocking pool.
pub trait Retriever: Send + Sync {
    /// Up to `top_k` chunks, best first.
    fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RetrievalError>;
}

/// Embeds the question and searches the vector store.
pub struct StoreRetriever {
    store: VectorStore,
    generator: Arc<dyn EmbeddingGenerator>,
}

impl StoreRetriever {
    pub fn new(store: VectorStore, generator: Arc<dyn EmbeddingGenerator>) -> Self {
        Self { store, generator }
    }
}

impl Retriever for StoreRetriever {
    fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let query = self.generator.embed_one(question)?;
        Ok(self.store.search(&query, top_k)?)
    }
}
