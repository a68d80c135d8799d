//! Indexing of a documents directory into the vector store.

pub mod pipeline;
pub mod walker;

pub use pipeline::{
    EMBEDDING_BATCH_SIZE, IndexError, IndexProgress, IndexReport, IndexingPipeline, LoadFailure,
};
pub use walker::{DocumentWalker, WalkResult};
