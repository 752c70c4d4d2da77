//! Chat-completion client used to read bills with an LLM.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{ExtractionError, Result};

/// A model that answers a prompt with a JSON document.
///
/// Implemented by [`OpenAiClient`]; tests plug in canned replies.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Fails when the model can't be called at all (e.g. no API key).
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Send `prompt` and return the raw reply text.
    async fn complete_json(&self, prompt: &str) -> Result<String>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Network {
                message: format!("failed to build HTTP client: {e}"),
                attempts: 0,
            })?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_request(&self, request: &ChatCompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!("Sending request to {}: model={}", url, request.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::malformed(format!("unreadable completion envelope: {e}")))?;

        if let Some(usage) = &response.usage {
            info!(
                "LLM response: {} tokens (prompt: {}, completion: {})",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ExtractionError::malformed("empty response from model"))
    }

    fn transport_error(&self, e: reqwest::Error) -> ExtractionError {
        if e.is_timeout() {
            ExtractionError::Timeout {
                seconds: self.config.timeout_secs,
                attempts: 1,
            }
        } else {
            ExtractionError::Network {
                message: e.to_string(),
                attempts: 1,
            }
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAiClient {
    fn ensure_ready(&self) -> Result<()> {
        if self.config.api_key.trim().is_empty() {
            return Err(ExtractionError::MissingCredential);
        }
        Ok(())
    }

    async fn complete_json(&self, prompt: &str) -> Result<String> {
        self.ensure_ready()?;

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: 0.0,
            response_format: Some(ResponseFormat::JsonObject),
        };

        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 1;
        loop {
            match self.send_request(&request).await {
                Ok(content) => return Ok(content),
                Err(e) if is_retryable(&e) && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "LLM call failed, retrying");
                    let backoff = self.config.retry_backoff_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => return Err(with_attempts(e, attempt)),
            }
        }
    }
}

/// Transport failures, timeouts, rate limits and server errors are worth another try.
fn is_retryable(err: &ExtractionError) -> bool {
    match err {
        ExtractionError::Timeout { .. } | ExtractionError::Network { .. } => true,
        ExtractionError::Api { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

fn with_attempts(err: ExtractionError, attempts: u32) -> ExtractionError {
    match err {
        ExtractionError::Timeout { seconds, .. } => ExtractionError::Timeout { seconds, attempts },
        ExtractionError::Network { message, .. } => ExtractionError::Network { message, attempts },
        other => other,
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonObject,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// ============================================================================
// Message types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
