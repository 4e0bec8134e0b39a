//! Generation backends for grounded answering.
//!
//! [`GenerationClient`] is the single seam over language-model backends:
//! one method, `generate(prompt) -> text`. [`ChatClient`] implements it
//! against any OpenAI-compatible chat-completions endpoint; the supported
//! backend variants (OpenAI, Groq) differ only in base URL and model,
//! selected by configuration at startup.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{RagError, Result};
use crate::prompt::Prompt;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_GROQ_MODEL: &str = "llama-3.1-70b-versatile";

/// A language-model backend that turns a grounded prompt into answer text.
///
/// Failures surface as
/// [`RagError::GenerationUnavailable`](crate::RagError::GenerationUnavailable);
/// implementations must never return a partial answer.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate answer text for the given prompt.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Retry policy for transient network failures.
///
/// Only transport errors (connect/timeout) and HTTP 5xx responses are
/// retried, with exponential backoff between attempts. Authentication and
/// quota failures are surfaced immediately. The defaults (3 attempts,
/// 250 ms initial delay, doubling) are a starting point, not a contract.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts before the failure is surfaced.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff: Duration::from_millis(250) }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// A [`GenerationClient`] for OpenAI-compatible chat-completions APIs.
///
/// # Example
///
/// ```rust,ignore
/// use kb_rag::ChatClient;
///
/// let client = ChatClient::groq(std::env::var("GROQ_API_KEY")?)?;
/// let answer = client.generate(&prompt).await?;
/// ```
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    provider: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl ChatClient {
    /// Create a client for the OpenAI chat-completions API.
    pub fn openai(api_key: impl Into<String>) -> Result<Self> {
        Self::compatible("OpenAI", api_key, OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL)
    }

    /// Create a client for the Groq chat-completions API.
    pub fn groq(api_key: impl Into<String>) -> Result<Self> {
        Self::compatible("Groq", api_key, GROQ_BASE_URL, DEFAULT_GROQ_MODEL)
    }

    /// Create a client for any OpenAI-compatible endpoint.
    pub fn compatible(
        provider: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let provider = provider.into();
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::GenerationUnavailable {
                provider,
                message: "API key must not be empty".into(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            provider,
            temperature: 0.2,
            max_tokens: 800,
            retry: RetryPolicy::default(),
        })
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the retry policy for transient failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn unavailable(&self, message: String) -> RagError {
        RagError::GenerationUnavailable { provider: self.provider.clone(), message }
    }

    /// One request attempt. Returns `Ok(Err(reason))` for transient
    /// failures that may be retried.
    async fn attempt(&self, prompt: &Prompt) -> Result<std::result::Result<String, String>> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = match self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
        {
            Ok(response) => response,
            // Transport errors are transient: connect failures, timeouts.
            Err(e) => return Ok(Err(format!("request failed: {e}"))),
        };

        let status = response.status();
        if status.is_server_error() {
            return Ok(Err(format!("server error {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = %self.provider, %status, "chat API error");
            return Err(self.unavailable(format!("API returned {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("failed to parse response: {e}")))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| self.unavailable("API returned no choices".into()))?;

        Ok(Ok(answer.trim().to_string()))
    }
}

#[async_trait]
impl GenerationClient for ChatClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let mut last_failure = String::new();

        for attempt in 1..=self.retry.max_attempts {
            debug!(provider = %self.provider, model = %self.model, attempt, "chat completion request");

            match self.attempt(prompt).await? {
                Ok(answer) => return Ok(answer),
                Err(reason) => {
                    warn!(provider = %self.provider, attempt, reason = %reason, "transient generation failure");
                    last_failure = reason;
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }
        }

        error!(provider = %self.provider, attempts = self.retry.max_attempts, "generation retries exhausted");
        Err(self.unavailable(format!(
            "{} attempts failed, last error: {last_failure}",
            self.retry.max_attempts
        )))
    }
}

// ── Chat-completions wire types ────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy { max_attempts: 3, initial_backoff: Duration::from_millis(100) };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(ChatClient::openai("").is_err());
        assert!(ChatClient::groq("").is_err());
    }
}
