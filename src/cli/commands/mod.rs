//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module. Setup shared by the
//! question-answering front-ends lives here.

pub mod ask;
pub mod chat;
pub mod index;
pub mod init;
pub mod logs;
pub mod serve;

use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;
use crate::documents::open_store;
use crate::llm::LlamaServerClient;
use crate::logging::{self, LogFile};
use crate::query::{QueryPipeline, StoreRetriever};
use crate::vector::{EmbeddingGenerator, FastEmbedGenerator};

/// Route logs for this front-end to its canonical file.
pub fn init_logging(settings: &Settings, log: LogFile) -> anyhow::Result<()> {
    let path = log.path_in(&settings.paths.logs_dir);
    logging::init_with_config(&settings.logging, Some(&path))
        .with_context(|| format!("cannot open log file {}", path.display()))
}

/// Load the configured embedding model.
pub fn build_generator(settings: &Settings) -> anyhow::Result<Arc<dyn EmbeddingGenerator>> {
    let generator = FastEmbedGenerator::from_config(&settings.embedding)
        .with_context(|| format!("cannot load embedding model '{}'", settings.embedding.model))?;
    Ok(Arc::new(generator))
}

/// Embedder, store, retriever and LLM client wired into a query pipeline.
///
/// Blocks while the embedding model loads; async callers run it on the
/// blocking pool.
pub fn build_pipeline(settings: &Settings) -> anyhow::Result<QueryPipeline> {
    let generator = build_generator(settings)?;

    let store = open_store(settings, generator.as_ref()).with_context(|| {
        format!(
            "cannot open vector store at {} (run 'docchat index' first)",
            settings.paths.vectorstore_dir.display()
        )
    })?;
    if store.is_empty() {
        tracing::warn!(target: "cli", "vector store is empty; answers will have no sources");
    }

    let retriever = Arc::new(StoreRetriever::new(store, generator));
    let llm = Arc::new(LlamaServerClient::from_config(&settings.llm)?);
    crate::log_event!("cli", "llm endpoint", "{}", llm.endpoint());

    Ok(QueryPipeline::from_settings(settings, retriever, llm)?)
}

/// [`build_pipeline`] off the async runtime.
pub async fn build_pipeline_async(settings: &Settings) -> anyhow::Result<QueryPipeline> {
    let settings = settings.clone();
    tokio::task::spawn_blocking(move || build_pipeline(&settings))
        .await
        .context("pipeline setup task failed")?
}
