//! docchat: document-grounded question answering over local files.
//!
//! Indexing walks a documents directory, splits every supported file into
//! overlapping chunks and stores their embeddings. Querying embeds a
//! question, retrieves the closest chunks and asks a local LLM to answer
//! from them.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod documents;
pub mod indexing;
pub mod llm;
pub mod logging;
pub mod query;
pub mod vector;
#[cfg(feature = "http-server")]
pub mod web;

pub use config::Settings;
pub use documents::{Chunk, ChunkId, Document, VectorStore};
pub use indexing::{IndexReport, IndexingPipeline};
pub use query::{ChatTurn, Conversation, QueryPipeline};
