//! Configuration for the document chat system.
//!
//! Settings are layered with figment:
//! - Default values
//! - TOML configuration file (`docchat.toml` unless `--config` is given)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DOCCHAT_` and use double underscores
//! to separate nested levels:
//! - `DOCCHAT_SIMILARITY_SEARCH__TOP_K=5` sets `similarity_search.top_k`
//! - `DOCCHAT_CHAIN__TYPE=conversational` sets `chain.type`
//! - `DOCCHAT_PATHS__DOCS_DIR=/data/docs` sets `paths.docs_dir`
//!
//! The settings object is built once at process start and passed by reference to
//! every component. Validation failures are fatal before any query is served.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::documents::ChunkingConfig;

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "docchat.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "DOCCHAT_";

/// Placeholder for retrieved context in the prompt template.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Placeholder for the user question in the prompt template.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("active model '{name}' is not defined in [llm.models] (configured: {available})")]
    UnknownModel { name: String, available: String },

    #[error("unsupported chain type '{0}' (expected 'retrieval_qa' or 'conversational')")]
    UnsupportedChainType(String),

    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Language model settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval settings
    #[serde(default)]
    pub similarity_search: SimilaritySearchConfig,

    /// Prompt template
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Answer chain selection
    #[serde(default)]
    pub chain: ChainConfig,

    /// Answer presentation
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Document chunking
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Web chat server
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    /// Root directory scanned for documents
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Directory holding the persisted vector store
    #[serde(default = "default_vectorstore_dir")]
    pub vectorstore_dir: PathBuf,

    /// Directory for log files
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    /// Key into `models` selecting the profile in use
    #[serde(default = "default_active_model")]
    pub active_model: String,

    /// Named model profiles
    #[serde(default = "default_models")]
    pub models: IndexMap<String, ModelConfig>,

    /// Log request/response details at debug level
    #[serde(default)]
    pub verbose: bool,

    /// Base URL of the llama.cpp server (OpenAI-compatible API)
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Upper bound for a single completion request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// GGUF model file served by llama-server; its stem is sent as the model name
    pub model_path: PathBuf,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Context window in tokens
    #[serde(default = "default_context_size")]
    pub context_size: u32,

    #[serde(default = "default_n_batch")]
    pub n_batch: u32,

    #[serde(default = "default_n_threads")]
    pub n_threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding model name (fastembed variant or Hugging Face id)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded model files are cached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Show model download progress on first use
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimilaritySearchConfig {
    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    /// Template with `{context}` and `{question}` placeholders
    #[serde(default = "default_prompt_template")]
    pub template: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChainConfig {
    /// `retrieval_qa` or `conversational`
    #[serde(rename = "type", default = "default_chain_type")]
    pub kind: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetadataConfig {
    /// Append the list of source documents to every answer
    #[serde(default = "default_true")]
    pub show_source_in_response: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Level written to the log file
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Level echoed to stderr
    #[serde(default = "default_console_level")]
    pub console: String,

    /// Per-target overrides, e.g. `tantivy = "warn"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Bind address for `docchat serve`
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// How the query pipeline talks to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    /// One stateless prompt per question
    RetrievalQa,
    /// Prior turns are sent along with the prompt
    Conversational,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainType::RetrievalQa => "retrieval_qa",
            ChainType::Conversational => "conversational",
        }
    }
}

impl FromStr for ChainType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retrieval_qa" => Ok(ChainType::RetrievalQa),
            "conversational" => Ok(ChainType::Conversational),
            other => Err(ConfigError::UnsupportedChainType(other.to_string())),
        }
    }
}

// Default value functions
fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}
fn default_vectorstore_dir() -> PathBuf {
    PathBuf::from("vectorstore")
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_active_model() -> String {
    "default".to_string()
}
fn default_models() -> IndexMap<String, ModelConfig> {
    let mut models = IndexMap::new();
    models.insert(default_active_model(), ModelConfig::default());
    models
}
fn default_llm_endpoint() -> String {
    "http://127.0.0.1:8080/v1".to_string()
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    512
}
fn default_context_size() -> u32 {
    4096
}
fn default_n_batch() -> u32 {
    512
}
fn default_n_threads() -> usize {
    num_cpus::get()
}
fn default_embedding_model() -> String {
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string()
}
fn default_top_k() -> usize {
    3
}
fn default_prompt_template() -> String {
    "Use only the following context to answer the question. \
If the context does not contain the answer, say that you do not know.\n\n\
Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
        .to_string()
}
fn default_chain_type() -> String {
    ChainType::RetrievalQa.as_str().to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_console_level() -> String {
    "warn".to_string()
}
fn default_bind() -> String {
    "127.0.0.1:7860".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            vectorstore_dir: default_vectorstore_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            active_model: default_active_model(),
            models: default_models(),
            verbose: false,
            endpoint: default_llm_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.gguf"),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            context_size: default_context_size(),
            n_batch: default_n_batch(),
            n_threads: default_n_threads(),
        }
    }
}

impl ModelConfig {
    /// Name sent as the `model` field of a completion request.
    pub fn model_name(&self) -> String {
        self.model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.model_path.to_string_lossy().into_owned())
    }

    /// Characters of retrieved context that fit next to the answer budget.
    ///
    /// Uses a rough estimate of four characters per token.
    pub fn context_budget_chars(&self) -> usize {
        let available_tokens = self.context_size.saturating_sub(self.max_tokens) as usize;
        available_tokens * 4
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl EmbeddingConfig {
    /// Model cache directory, falling back to the user cache dir.
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("docchat")
                .join("models")
        })
    }
}

impl Default for SimilaritySearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: default_prompt_template(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            kind: default_chain_type(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            show_source_in_response: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: default_console_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Settings {
    /// Build the layered figment for a config file path.
    pub fn figment(config_path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration.
    ///
    /// Uses `docchat.toml` in the current directory when no path is given.
    /// A missing file is not an error: defaults and environment still apply.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let settings: Settings = Self::figment(&path).extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every cross-field invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let model = self.active_model()?;

        if !(0.0..=2.0).contains(&model.temperature) {
            return Err(ConfigError::Invalid {
                key: "llm.models.temperature",
                reason: format!("{} is outside 0.0..=2.0", model.temperature),
            });
        }
        if model.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "llm.models.max_tokens",
                reason: "must be at least 1".to_string(),
            });
        }
        if model.context_size <= model.max_tokens {
            return Err(ConfigError::Invalid {
                key: "llm.models.context_size",
                reason: format!(
                    "context_size ({}) must be greater than max_tokens ({})",
                    model.context_size, model.max_tokens
                ),
            });
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "llm.request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.similarity_search.top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "similarity_search.top_k",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "embedding.model",
                reason: "must not be empty".to_string(),
            });
        }

        self.chunking
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                key: "chunking",
                reason,
            })?;

        if !self.prompt.template.contains(CONTEXT_PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder(CONTEXT_PLACEHOLDER));
        }
        if !self.prompt.template.contains(QUESTION_PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder(QUESTION_PLACEHOLDER));
        }

        self.chain_type()?;
        Ok(())
    }

    /// The selected model profile.
    pub fn active_model(&self) -> Result<&ModelConfig, ConfigError> {
        self.llm
            .models
            .get(&self.llm.active_model)
            .ok_or_else(|| ConfigError::UnknownModel {
                name: self.llm.active_model.clone(),
                available: self
                    .llm
                    .models
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Parsed chain type.
    pub fn chain_type(&self) -> Result<ChainType, ConfigError> {
        self.chain.kind.parse()
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a default settings file.
    pub fn init_config_file(path: impl AsRef<Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let path = path.as_ref();
        if !force && path.exists() {
            return Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!(
                    "{} already exists. Use --force to overwrite",
                    path.display()
                ),
            )));
        }

        Settings::default().save(path)?;
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn load_file(content: &str) -> Result<Settings, ConfigError> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docchat.toml");
        fs::write(&path, content).unwrap();
        Settings::load(Some(&path))
    }

    #[test]
    fn test_default_settings_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.similarity_search.top_k, 3);
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.overlap, 100);
        assert_eq!(settings.chain_type().unwrap(), ChainType::RetrievalQa);
    }

    #[test]
    fn test_load_from_toml() {
        let settings = load_file(
            r#"
[paths]
docs_dir = "my-docs"

[llm]
active_model = "mistral"

[llm.models.mistral]
model_path = "models/mistral-7b-instruct.Q4_K_M.gguf"
temperature = 0.1
max_tokens = 256
context_size = 2048
n_batch = 256
n_threads = 8

[similarity_search]
top_k = 5

[chain]
type = "conversational"
"#,
        )
        .unwrap();

        assert_eq!(settings.paths.docs_dir, PathBuf::from("my-docs"));
        assert_eq!(settings.similarity_search.top_k, 5);
        assert_eq!(settings.chain_type().unwrap(), ChainType::Conversational);

        let model = settings.active_model().unwrap();
        assert_eq!(model.max_tokens, 256);
        assert_eq!(model.model_name(), "mistral-7b-instruct.Q4_K_M");
        // Unspecified sections keep defaults
        assert_eq!(settings.paths.logs_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_unsupported_chain_type_is_rejected() {
        let err = load_file("[chain]\ntype = \"map_reduce\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedChainType(ref t) if t == "map_reduce"));
    }

    #[test]
    fn test_unknown_active_model_is_rejected() {
        let err = load_file("[llm]\nactive_model = \"missing\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_template_without_placeholders_is_rejected() {
        let err = load_file("[prompt]\ntemplate = \"Question: {question}\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingPlaceholder("{context}")));

        let err = load_file("[prompt]\ntemplate = \"Context: {context}\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingPlaceholder("{question}")));
    }

    #[test]
    fn test_invalid_chunking_is_rejected() {
        let err = load_file("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "chunking", .. }));
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let err = load_file("[similarity_search]\ntop_k = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "similarity_search.top_k",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_file_is_a_load_error() {
        let err = load_file("[similarity_search]\ntop_k = \"three\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_env_override() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docchat.toml");
        fs::write(&path, "[server]\nbind = \"0.0.0.0:9000\"\n").unwrap();

        unsafe {
            std::env::set_var("DOCCHAT_SERVER__BIND", "127.0.0.1:9999");
        }
        let settings = Settings::load(Some(&path));
        unsafe {
            std::env::remove_var("DOCCHAT_SERVER__BIND");
        }

        assert_eq!(settings.unwrap().server.bind, "127.0.0.1:9999");
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("docchat.toml");

        let mut settings = Settings::default();
        settings.similarity_search.top_k = 7;
        settings.save(&path).unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded.similarity_search.top_k, 7);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docchat.toml");

        Settings::init_config_file(&path, false).unwrap();
        assert!(Settings::init_config_file(&path, false).is_err());
        assert!(Settings::init_config_file(&path, true).is_ok());
    }

    #[test]
    fn test_context_budget() {
        let model = ModelConfig {
            context_size: 4096,
            max_tokens: 1024,
            ..Default::default()
        };
        assert_eq!(model.context_budget_chars(), 3072 * 4);
    }
}
