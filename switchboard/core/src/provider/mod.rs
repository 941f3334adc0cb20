//! LLM Provider Integration
//!
//! Uniform access to the backends the router can dispatch to, through the
//! [`LlmProvider`] trait.
//!
//! # Available Providers
//!
//! - **OpenAI** and **Groq**: OpenAI-compatible chat completions
//! - **Gemini**: Google `generateContent`
//! - **Ollama**: self-hosted server, the local fallback
//!
//! # Usage
//!
//! ```ignore
//! use switchboard_core::provider::{ProviderSet, ProviderSettings};
//!
//! let providers = ProviderSet::from_settings(&ProviderSettings::default());
//! let ollama = providers.get(ProviderId::Ollama).unwrap();
//! let text = ollama.generate(&GenerateRequest::new("Hello!", "llama3.2")).await?;
//! ```

mod error;
mod gemini;
mod http;
mod id;
mod ollama;
mod openai;
mod traits;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use error::{ErrorClass, ProviderError};
pub use gemini::{resolve_model as resolve_gemini_model, GeminiProvider, GEMINI_BASE_URL};
pub use http::RetryPolicy;
pub use id::{ParseProviderError, ProviderId, RequestedProvider};
pub use ollama::{OllamaProvider, OLLAMA_BASE_URL};
pub use openai::{OpenAiCompatProvider, GROQ_BASE_URL, OPENAI_BASE_URL};
pub use traits::{GenerateRequest, LlmProvider, DEFAULT_TEMPERATURE};

// ============================================================================
// Provider Settings
// ============================================================================

/// Connection settings for every provider client
#[derive(Clone)]
pub struct ProviderSettings {
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    /// Groq API key
    pub groq_api_key: Option<String>,
    /// Gemini API key
    pub gemini_api_key: Option<String>,
    /// Override for the OpenAI API base
    pub openai_base_url: Option<String>,
    /// Override for the Groq API base
    pub groq_base_url: Option<String>,
    /// Override for the Gemini API base
    pub gemini_base_url: Option<String>,
    /// Ollama server address
    pub ollama_base_url: String,
    /// HTTP client timeout for generation calls
    pub request_timeout: Duration,
    /// Internal retry on transient failures
    pub retry: RetryPolicy,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            groq_api_key: None,
            gemini_api_key: None,
            openai_base_url: None,
            groq_base_url: None,
            gemini_base_url: None,
            ollama_base_url: OLLAMA_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

// Keys never reach logs.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(key: &Option<String>) -> &'static str {
            if key.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("ProviderSettings")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("groq_api_key", &redact(&self.groq_api_key))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("groq_base_url", &self.groq_base_url)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

// ============================================================================
// Provider Set
// ============================================================================

/// The provider clients available to a router, keyed by identity
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: BTreeMap<ProviderId, Arc<dyn LlmProvider>>,
}

impl ProviderSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one client per provider from settings
    #[must_use]
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let timeout = settings.request_timeout;
        Self::new()
            .with(
                OpenAiCompatProvider::openai(
                    settings.openai_base_url.clone(),
                    settings.openai_api_key.clone(),
                    timeout,
                )
                .with_retry(settings.retry.clone()),
            )
            .with(
                OpenAiCompatProvider::groq(
                    settings.groq_base_url.clone(),
                    settings.groq_api_key.clone(),
                    timeout,
                )
                .with_retry(settings.retry.clone()),
            )
            .with(
                GeminiProvider::new(
                    settings.gemini_base_url.clone(),
                    settings.gemini_api_key.clone(),
                    timeout,
                )
                .with_retry(settings.retry.clone()),
            )
            .with(
                OllamaProvider::new(settings.ollama_base_url.clone(), timeout)
                    .with_retry(settings.retry.clone()),
            )
    }

    /// Add a provider, replacing any client registered under the same id
    #[must_use]
    pub fn with(mut self, provider: impl LlmProvider + 'static) -> Self {
        self.insert(Arc::new(provider));
        self
    }

    /// Add a shared provider, replacing any client registered under the same id
    pub fn insert(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.id(), provider);
    }

    /// Client for `id`, if registered
    #[must_use]
    pub fn get(&self, id: ProviderId) -> Option<&Arc<dyn LlmProvider>> {
        self.providers.get(&id)
    }

    /// Whether a client is registered for `id`
    #[must_use]
    pub fn contains(&self, id: ProviderId) -> bool {
        self.providers.contains_key(&id)
    }

    /// Registered ids in stable order
    pub fn ids(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.providers.keys().copied()
    }

    /// Registered clients in stable order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn LlmProvider>> {
        self.providers.values()
    }

    /// Number of registered clients
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no client is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_registers_every_provider() {
        let set = ProviderSet::from_settings(&ProviderSettings::default());

        assert_eq!(set.len(), 4);
        assert_eq!(set.ids().collect::<Vec<_>>(), ProviderId::ALL.to_vec());
        for id in ProviderId::ALL {
            assert_eq!(set.get(id).map(|p| p.id()), Some(id));
        }
    }

    #[test]
    fn test_credentials_follow_settings() {
        let settings = ProviderSettings {
            groq_api_key: Some("gsk-test".to_string()),
            ..ProviderSettings::default()
        };
        let set = ProviderSet::from_settings(&settings);

        assert!(set.get(ProviderId::Groq).unwrap().has_credentials());
        assert!(!set.get(ProviderId::OpenAi).unwrap().has_credentials());
        assert!(set.get(ProviderId::Ollama).unwrap().has_credentials());
    }

    #[test]
    fn test_with_replaces_same_id() {
        let set = ProviderSet::new()
            .with(OllamaProvider::new("http://a:11434", Duration::from_secs(1)))
            .with(OllamaProvider::new("http://b:11434", Duration::from_secs(1)));
        assert_eq!(set.len(), 1);
        assert!(!set.contains(ProviderId::Gemini));
    }

    #[test]
    fn test_settings_debug_redacts_keys() {
        let settings = ProviderSettings {
            openai_api_key: Some("sk-secret".to_string()),
            ..ProviderSettings::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<set>"));
    }
}
