//! OpenAI-compatible Provider
//!
//! Client for the `/chat/completions` API shared by OpenAI and Groq.
//!
//! - `POST {base}/chat/completions` - single-turn completion
//! - `GET {base}/models` - reachability probe

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::ProviderError;
use super::http::{read_json, send_with_retry, PooledClient, RetryPolicy, PROBE_TIMEOUT};
use super::id::ProviderId;
use super::traits::{GenerateRequest, LlmProvider};

/// Default OpenAI API base
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Groq API base
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
#[derive(Debug)]
pub struct OpenAiCompatProvider {
    id: ProviderId,
    base_url: String,
    api_key: Option<String>,
    key_env: &'static str,
    client: PooledClient,
    retry: RetryPolicy,
}

impl OpenAiCompatProvider {
    /// Create a client for `id` against `base_url`
    pub fn new(
        id: ProviderId,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let key_env = match id {
            ProviderId::Groq => "GROQ_API_KEY",
            _ => "OPENAI_API_KEY",
        };
        Self {
            id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            key_env,
            client: PooledClient::new(timeout),
            retry: RetryPolicy::default(),
        }
    }

    /// OpenAI client
    #[must_use]
    pub fn openai(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self::new(
            ProviderId::OpenAi,
            base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key,
            timeout,
        )
    }

    /// Groq client
    #[must_use]
    pub fn groq(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self::new(
            ProviderId::Groq,
            base_url.unwrap_or_else(|| GROQ_BASE_URL.to_string()),
            api_key,
            timeout,
        )
    }

    /// Replace the internal retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_key(self.id, self.key_env))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        let key = self.require_key()?;
        let client = self.client.get(self.id)?;
        let url = self.completions_url();
        let body = serde_json::json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
        });

        let response = send_with_retry(self.id, &self.retry, || {
            client.post(&url).bearer_auth(key).json(&body)
        })
        .await?;

        let completion: ChatCompletion = read_json(self.id, response).await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: self.id,
                message: "response contained no choices".to_string(),
            })
    }

    async fn check_reachable(&self) -> bool {
        let (Ok(key), Ok(client)) = (self.require_key(), self.client.get(self.id)) else {
            return false;
        };
        client
            .get(self.models_url())
            .bearer_auth(key)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn close(&self) {
        if self.client.close() {
            tracing::debug!(provider = %self.id, "Released HTTP connection pool");
        }
    }
}
