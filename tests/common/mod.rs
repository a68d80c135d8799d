//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docchat::config::Settings;
use docchat::documents::{ChunkingConfig, VectorStore};
use docchat::indexing::IndexingPipeline;
use docchat::llm::{ChatMessage, GenerationParams, LanguageModel, LlmError};
use docchat::query::{QueryPipeline, StoreRetriever};
use docchat::vector::{EmbeddingError, EmbeddingGenerator};
use parking_lot::Mutex;

pub const HASH_DIMENSION: usize = 64;

/// Bag-of-words embedder: each lowercase word hashes into one bucket.
///
/// Texts sharing words end up close under cosine similarity, which is
/// enough to exercise retrieval without downloading a model.
pub struct HashEmbedder;

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % HASH_DIMENSION as u64) as usize
}

impl EmbeddingGenerator for HashEmbedder {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; HASH_DIMENSION];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    vector[bucket(&word.to_lowercase())] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        HASH_DIMENSION
    }

    fn model_name(&self) -> &str {
        "test-hash"
    }
}

/// Language model that replays scripted replies and records every request.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> Result<String, LlmError> {
        self.requests.lock().push(messages.to_vec());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("scripted answer".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Language model that blocks inside `complete` until released.
#[derive(Default)]
pub struct GatedLlm {
    pub entered: tokio::sync::Notify,
    pub release: tokio::sync::Notify,
}

#[async_trait]
impl LanguageModel for GatedLlm {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> Result<String, LlmError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("released".to_string())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Write `files` (relative path, content) under `root`.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

/// Index `docs_dir` into `store_dir` with the hash embedder.
pub fn index(docs_dir: &Path, store_dir: &Path, chunking: ChunkingConfig) -> docchat::IndexReport {
    IndexingPipeline::new(Arc::new(HashEmbedder), chunking, store_dir)
        .run(docs_dir)
        .unwrap()
}

/// Query pipeline over an indexed store and a scripted model.
pub fn pipeline(settings: &Settings, store_dir: &Path, llm: Arc<dyn LanguageModel>) -> QueryPipeline {
    let store = VectorStore::open(store_dir).unwrap();
    let retriever = Arc::new(StoreRetriever::new(store, Arc::new(HashEmbedder)));
    QueryPipeline::from_settings(settings, retriever, llm).unwrap()
}

pub fn sample_docs() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "animals/llamas.txt",
            "Llamas are domesticated South American camelids used as pack animals.",
        ),
        (
            "space/mars.md",
            "Mars is the fourth planet from the Sun and has two small moons.",
        ),
        (
            "cooking/bread.txt",
            "Bread dough needs flour, water, yeast and salt before baking.",
        ),
    ]
}
