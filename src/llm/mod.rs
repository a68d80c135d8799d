//! Language model access.
//!
//! The query pipeline talks to a [`LanguageModel`]. The production
//! implementation is [`LlamaServerClient`], which calls a llama.cpp server
//! through its OpenAI-compatible chat completions endpoint.

mod llama_server;

pub use llama_server::LlamaServerClient;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ModelConfig;

/// Inference errors. Always scoped to the turn that caused them.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request to language model failed: {0}")]
    Transport(String),

    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model did not answer within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("language model returned an empty response")]
    EmptyResponse,

    #[error("invalid response from language model: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with each request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&ModelConfig> for GenerationParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model: config.model_name(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// A chat-completion language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a conversation, returning the assistant's reply.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, LlmError>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}
