//! Text embedding generation.

use std::path::Path;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::EmbeddingConfig;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("unknown embedding model '{0}'")]
    UnknownModel(String),

    #[error("failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("failed to generate embeddings: {0}")]
    Generation(String),

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Produces fixed-dimension vectors for text.
///
/// The same generator must be used at index time and query time; the vector
/// store records the model name and dimension to enforce this.
pub trait EmbeddingGenerator: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Dimension of every produced vector.
    fn dimension(&self) -> usize;

    /// Identifier stored alongside the vectors.
    fn model_name(&self) -> &str;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.generate_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch {
                expected: 1,
                actual: 0,
            })
    }
}

/// Accepted names for each supported model: short enum-style name first,
/// then the Hugging Face repository id.
const MODEL_TABLE: &[(&str, &str, EmbeddingModel)] = &[
    (
        "AllMiniLML6V2",
        "sentence-transformers/all-MiniLM-L6-v2",
        EmbeddingModel::AllMiniLML6V2,
    ),
    (
        "AllMiniLML12V2",
        "sentence-transformers/all-MiniLM-L12-v2",
        EmbeddingModel::AllMiniLML12V2,
    ),
    (
        "BGESmallENV15",
        "BAAI/bge-small-en-v1.5",
        EmbeddingModel::BGESmallENV15,
    ),
    (
        "BGEBaseENV15",
        "BAAI/bge-base-en-v1.5",
        EmbeddingModel::BGEBaseENV15,
    ),
    (
        "ParaphraseMLMiniLML12V2",
        "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
        EmbeddingModel::ParaphraseMLMiniLML12V2,
    ),
    (
        "ParaphraseMLMpnetBaseV2",
        "sentence-transformers/paraphrase-multilingual-mpnet-base-v2",
        EmbeddingModel::ParaphraseMLMpnetBaseV2,
    ),
    (
        "MultilingualE5Small",
        "intfloat/multilingual-e5-small",
        EmbeddingModel::MultilingualE5Small,
    ),
    (
        "MultilingualE5Base",
        "intfloat/multilingual-e5-base",
        EmbeddingModel::MultilingualE5Base,
    ),
    (
        "MultilingualE5Large",
        "intfloat/multilingual-e5-large",
        EmbeddingModel::MultilingualE5Large,
    ),
];

/// Resolve a configured model name (case-insensitive).
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    let wanted = name.trim();
    MODEL_TABLE
        .iter()
        .find(|(short, repo, _)| {
            short.eq_ignore_ascii_case(wanted) || repo.eq_ignore_ascii_case(wanted)
        })
        .map(|(_, _, model)| model.clone())
        .ok_or_else(|| EmbeddingError::UnknownModel(name.to_string()))
}

/// Names accepted by [`parse_embedding_model`], for help output.
pub fn supported_models() -> impl Iterator<Item = &'static str> {
    MODEL_TABLE.iter().map(|(_, repo, _)| *repo)
}

/// Local embedding model backed by fastembed.
///
/// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a mutex;
/// concurrent callers are serialised.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    dimension: usize,
    model_name: String,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Load the model named in the embedding configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model = parse_embedding_model(&config.model)?;
        Self::new(
            model,
            config.model.trim().to_string(),
            &config.effective_cache_dir(),
            config.show_download_progress,
        )
    }

    pub fn new(
        model: EmbeddingModel,
        model_name: String,
        cache_dir: &Path,
        show_download_progress: bool,
    ) -> Result<Self, EmbeddingError> {
        tracing::info!(
            target: "embedding",
            "Loading embedding model {model_name} (cache: {})",
            cache_dir.display()
        );

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

        // Probe once to learn the output dimension
        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?;
        let dimension = probe.first().map(Vec::len).ok_or_else(|| {
            EmbeddingError::ModelInit("model returned no embedding for probe".to_string())
        })?;

        tracing::debug!(target: "embedding", "Embedding model ready: {dimension} dimensions");

        Ok(Self {
            model: Mutex::new(text_model),
            dimension,
            model_name,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
