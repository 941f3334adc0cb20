//! Ollama Provider
//!
//! Client for a self-hosted Ollama server. This is the local fallback, so it
//! needs no credentials and its probe is the signal the router trusts most.
//!
//! - `POST /api/generate` - non-streaming generation
//! - `GET /api/tags` - reachability probe

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::ProviderError;
use super::http::{read_json, send_with_retry, PooledClient, RetryPolicy, PROBE_TIMEOUT};
use super::id::ProviderId;
use super::traits::{GenerateRequest, LlmProvider};

/// Default Ollama server address
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Ollama API client
#[derive(Debug)]
pub struct OllamaProvider {
    base_url: String,
    client: PooledClient,
    retry: RetryPolicy,
}

impl OllamaProvider {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: PooledClient::new(timeout),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the internal retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Server address this client talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(OLLAMA_BASE_URL, Duration::from_secs(30))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        let client = self.client.get(ProviderId::Ollama)?;
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": { "temperature": request.temperature },
        });

        let response = send_with_retry(ProviderId::Ollama, &self.retry, || {
            client.post(&url).json(&body)
        })
        .await?;

        let parsed: OllamaGenerateResponse = read_json(ProviderId::Ollama, response).await?;
        Ok(parsed.response.unwrap_or_default())
    }

    async fn check_reachable(&self) -> bool {
        let Ok(client) = self.client.get(ProviderId::Ollama) else {
            return false;
        };
        match client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::debug!(base_url = %self.base_url, error = %e, "Ollama probe failed");
                false
            }
        }
    }

    async fn close(&self) {
        if self.client.close() {
            tracing::debug!(provider = %ProviderId::Ollama, "Released HTTP connection pool");
        }
    }
}
