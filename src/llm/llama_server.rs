//! llama.cpp server client (OpenAI-compatible `/chat/completions`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, GenerationParams, LanguageModel, LlmError};
use crate::config::LlmConfig;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for a running `llama-server`.
#[derive(Debug, Clone)]
pub struct LlamaServerClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    verbose: bool,
}

impl LlamaServerClient {
    /// Create a client for `endpoint` (e.g. `http://127.0.0.1:8080/v1`).
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout,
            verbose: false,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let mut client = Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        client.verbose = config.verbose;
        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    fn map_transport(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl LanguageModel for LlamaServerClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        };

        if self.verbose {
            tracing::debug!(
                target: "llm",
                "POST {} ({} messages, max_tokens={})",
                self.completions_url(),
                messages.len(),
                params.max_tokens
            );
        }

        let response = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout)
            } else {
                LlmError::InvalidResponse(e.to_string())
            }
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(content)
    }

    fn name(&self) -> &str {
        "llama-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalization() {
        let client = LlamaServerClient::new("http://127.0.0.1:8080/v1/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:8080/v1");
        assert_eq!(
            client.completions_url(),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::user("hello")];
        let request = CompletionRequest {
            model: "m",
            messages: &messages,
            temperature: 0.5,
            max_tokens: 16,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 16);
        assert_eq!(json["stream"], false);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening
        let client =
            LlamaServerClient::new("http://127.0.0.1:9/v1", Duration::from_secs(2)).unwrap();
        let params = GenerationParams {
            model: "m".to_string(),
            temperature: 0.0,
            max_tokens: 8,
        };

        let result = client.complete(&[ChatMessage::user("hi")], &params).await;
        assert!(matches!(
            result,
            Err(LlmError::Transport(_)) | Err(LlmError::Timeout(_))
        ));
    }
}
