//! Provider Trait
//!
//! The uniform capability the router needs from every backend: generate text,
//! answer a cheap reachability probe, and release pooled connections.
//! Implementations own their wire format, credentials and internal retry.

use async_trait::async_trait;

use super::error::ProviderError;
use super::id::ProviderId;

/// Default sampling temperature when the caller gives none
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A single text-generation call
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateRequest {
    /// The prompt to complete
    pub prompt: String,
    /// Backend-specific model identifier (already resolved, never blank)
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl GenerateRequest {
    /// Create a new request with prompt and model
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// LLM provider trait
///
/// Implement this trait to plug a backend into the router.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Which provider this client talks to
    fn id(&self) -> ProviderId;

    /// Whether the client has the credentials it needs
    fn has_credentials(&self) -> bool {
        true
    }

    /// Generate a completion
    ///
    /// May retry once internally on a transient failure; only the final
    /// outcome is returned.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError>;

    /// Bounded health probe. Never errors; an unreachable backend is `false`.
    async fn check_reachable(&self) -> bool;

    /// Release pooled connections. The client stays usable and reconnects lazily.
    async fn close(&self);
}
