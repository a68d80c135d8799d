//! Question answering over the vector store.

pub mod history;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use history::{ChatTurn, Conversation};
pub use pipeline::{NO_SOURCES_MARKER, QueryError, QueryPipeline, render_answer};
pub use prompt::{PromptTemplate, RenderedPrompt};
pub use retriever::{RetrievalError, Retriever, StoreRetriever};
