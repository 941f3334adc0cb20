//! Shared HTTP plumbing for provider clients
//!
//! - [`PooledClient`]: lazily built, pooled `reqwest::Client` that can be
//!   released on fatal errors and rebuilt on next use
//! - [`RetryPolicy`]: the single short retry on transient responses
//! - [`send_with_retry`]: send a request, classify the outcome, retry once

use std::time::Duration;

use parking_lot::Mutex;

use super::error::ProviderError;
use super::id::ProviderId;

/// Timeout for reachability probes issued by provider clients
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Retry Policy
// ============================================================================

/// Internal retry behavior of a provider client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Fixed delay before a retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy with the default retry count and a custom backoff
    #[must_use]
    pub fn with_backoff(backoff: Duration) -> Self {
        Self {
            backoff,
            ..Self::default()
        }
    }

    /// Never retry
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Whether attempt number `attempt` (0-indexed) may be followed by another
    #[must_use]
    pub fn should_retry(&self, attempt: u32, err: &ProviderError) -> bool {
        attempt < self.max_retries && err.is_transient()
    }
}

// ============================================================================
// Pooled Client
// ============================================================================

/// Owner of a provider's connection pool
#[derive(Debug)]
pub(crate) struct PooledClient {
    timeout: Duration,
    slot: Mutex<Option<reqwest::Client>>,
}

impl PooledClient {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            slot: Mutex::new(None),
        }
    }

    /// Get the pooled client, building it on first use or after [`close`](Self::close)
    pub(crate) fn get(&self, provider: ProviderId) -> Result<reqwest::Client, ProviderError> {
        let mut slot = self.slot.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProviderError::Unreachable {
                provider,
                message: format!("failed to build HTTP client: {e}"),
            })?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drop the pool so idle connections are released. Returns whether one existed.
    pub(crate) fn close(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.slot.lock().is_some()
    }
}

// ============================================================================
// Request Execution
// ============================================================================

/// Send a request built by `build`, retrying once on a transient failure
///
/// Non-success statuses are classified with [`ProviderError::from_status`];
/// the response is returned only when the status is a success.
pub(crate) async fn send_with_retry<F>(
    provider: ProviderId,
    retry: &RetryPolicy,
    build: F,
) -> Result<reqwest::Response, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let err = match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                ProviderError::from_status(provider, status, &body)
            }
            Err(e) => ProviderError::from_transport(provider, &e),
        };

        if !retry.should_retry(attempt, &err) {
            return Err(err);
        }

        tracing::debug!(
            provider = %provider,
            attempt = attempt + 1,
            backoff_ms = retry.backoff.as_millis() as u64,
            error = %err,
            "Transient provider failure, retrying"
        );
        tokio::time::sleep(retry.backoff).await;
        attempt += 1;
    }
}

/// Decode a JSON body into `T`, mapping failures to [`ProviderError::InvalidResponse`]
pub(crate) async fn read_json<T>(
    provider: ProviderId,
    response: reqwest::Response,
) -> Result<T, ProviderError>
where
    T: serde::de::DeserializeOwned,
{
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse {
            provider,
            message: e.to_string(),
        })
}
