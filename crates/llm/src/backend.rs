//! Ollama chat backend
//!
//! Talks to the Ollama `/api/chat` endpoint (non-streaming). Transient
//! failures are retried with exponential backoff; every request is
//! bounded by the configured deadline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use voice_relay_core::{ChatModel, Result, Turn};

use crate::LlmError;

/// Chat backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// API endpoint
    pub endpoint: String,
    /// Per-request deadline
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

/// Ollama chat backend
#[derive(Clone)]
pub struct OllamaChat {
    client: Client,
    config: LlmConfig,
}

impl OllamaChat {
    /// Create a new backend.
    pub fn new(config: LlmConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint, path)
    }

    /// Execute a single chat request (used by the retry loop).
    async fn execute_request(
        &self,
        request: &OllamaChatRequest,
    ) -> std::result::Result<OllamaChatResponse, LlmError> {
        let response = self
            .client
            .post(self.api_url("/chat"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 5xx errors are retryable, 4xx are not.
            if status.is_server_error() {
                return Err(LlmError::Network(format!("server error {status}: {body}")));
            }
            if status == reqwest::StatusCode::NOT_FOUND && body.contains("model") {
                return Err(LlmError::ModelNotFound(self.config.model.clone()));
            }
            return Err(LlmError::Api(format!("{status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    fn is_retryable(error: &LlmError) -> bool {
        matches!(error, LlmError::Network(_) | LlmError::Timeout(_))
    }

    async fn chat_inner(&self, history: &[Turn]) -> std::result::Result<String, LlmError> {
        let request = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: history.iter().map(OllamaMessage::from).collect(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
                num_predict: Some(self.config.max_tokens as i32),
            }),
        };

        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    "chat request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.config.max_retries
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&request).await {
                Ok(result) => {
                    let reply = result.message.content.trim().to_string();
                    if reply.is_empty() {
                        return Err(LlmError::InvalidResponse("empty reply".to_string()));
                    }
                    return Ok(reply);
                }
                Err(e) if Self::is_retryable(&e) => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Network("max retries exceeded".to_string())))
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn chat(&self, history: &[Turn]) -> Result<String> {
        let deadline = self.config.timeout;
        match tokio::time::timeout(deadline, self.chat_inner(history)).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(LlmError::Timeout(deadline.as_millis() as u64).into()),
        }
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.config.endpoint))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl From<&Turn> for OllamaMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[allow(dead_code)]
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_relay_core::TurnRole;

    #[test]
    fn config_default() {
        let config = LlmConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.temperature, 0.7);
    }

    #[test]
    fn message_conversion() {
        let turn = Turn::user("alice: hello");
        let msg = OllamaMessage::from(&turn);
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "alice: hello");

        let turn = Turn::new(TurnRole::System, "persona");
        assert_eq!(OllamaMessage::from(&turn).role, "system");
    }

    #[test]
    fn retryable_classification() {
        assert!(OllamaChat::is_retryable(&LlmError::Network("x".into())));
        assert!(OllamaChat::is_retryable(&LlmError::Timeout(1)));
        assert!(!OllamaChat::is_retryable(&LlmError::Api("bad".into())));
        assert!(!OllamaChat::is_retryable(&LlmError::ModelNotFound("m".into())));
    }

    #[tokio::test]
    async fn chat_against_unreachable_endpoint_fails_fast() {
        let backend = OllamaChat::new(LlmConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(500),
            max_retries: 0,
            ..Default::default()
        })
        .unwrap();

        let history = vec![Turn::system("persona"), Turn::user("alice: hi")];
        let err = backend.chat(&history).await.unwrap_err();
        assert!(err.chat_failure().is_some());
        assert!(!backend.is_available().await);
    }
}
