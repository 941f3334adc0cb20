//! Gemini Provider
//!
//! Client for Google's `generateContent` REST API.
//!
//! - `POST {base}/models/{model}:generateContent?key=...`
//! - `GET {base}/models/{default}?key=...` as the reachability probe

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::ProviderError;
use super::http::{read_json, send_with_retry, PooledClient, RetryPolicy, PROBE_TIMEOUT};
use super::id::ProviderId;
use super::traits::{GenerateRequest, LlmProvider};

/// Default Gemini API base
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when the caller's model is blank or not a Gemini model
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini calls are slow to first byte; the HTTP timeout never goes below this
const MIN_CLIENT_TIMEOUT: Duration = Duration::from_secs(45);

const MAX_OUTPUT_TOKENS: u32 = 8192;
const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }
}

/// Map a caller-supplied model onto a Gemini model name
#[must_use]
pub fn resolve_model(model: &str) -> &str {
    let model = model.trim();
    if model.starts_with("gemini-") {
        model
    } else {
        GEMINI_DEFAULT_MODEL
    }
}

/// Gemini API client
#[derive(Debug)]
pub struct GeminiProvider {
    base_url: String,
    api_key: Option<String>,
    client: PooledClient,
    retry: RetryPolicy,
}

impl GeminiProvider {
    /// Create a new client. `timeout` is raised to the 45s floor when lower.
    #[must_use]
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let base_url = base_url.unwrap_or_else(|| GEMINI_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: PooledClient::new(timeout.max(MIN_CLIENT_TIMEOUT)),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the internal retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_key(ProviderId::Gemini, "GEMINI_API_KEY"))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        let key = self.require_key()?;
        let client = self.client.get(ProviderId::Gemini)?;
        let url = self.generate_url(resolve_model(&request.model));
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "temperature": request.temperature.clamp(0.0, MAX_TEMPERATURE),
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
        });

        let response = send_with_retry(ProviderId::Gemini, &self.retry, || {
            client.post(&url).query(&[("key", key)]).json(&body)
        })
        .await?;

        let parsed: GenerateContentResponse = read_json(ProviderId::Gemini, response).await?;
        Ok(parsed.into_text())
    }

    async fn check_reachable(&self) -> bool {
        let (Ok(key), Ok(client)) = (self.require_key(), self.client.get(ProviderId::Gemini))
        else {
            return false;
        };
        client
            .get(format!("{}/models/{}", self.base_url, GEMINI_DEFAULT_MODEL))
            .query(&[("key", key)])
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn close(&self) {
        if self.client.close() {
            tracing::debug!(provider = %ProviderId::Gemini, "Released HTTP connection pool");
        }
    }
}
