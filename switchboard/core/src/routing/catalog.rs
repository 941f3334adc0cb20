//! Provider Catalog
//!
//! Static capability table. Read-only after construction and used only as
//! scoring input and for default model names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Reasoning weight assumed for a provider missing from the catalog
pub const DEFAULT_REASONING_WEIGHT: f64 = 0.5;

/// Coarse reasoning capability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningTier {
    /// Small local models
    Low,
    /// Mid-sized hosted models
    Medium,
    /// Frontier models
    High,
}

/// Coarse latency class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTier {
    /// Runs on local hardware
    Local,
    /// Typical hosted API
    Medium,
    /// Specialised inference hardware
    UltraFast,
}

/// Static description of a provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Reasoning capability in [0, 1], fed to the scorer
    pub reasoning_weight: f64,
    /// Reasoning tier
    pub reasoning: ReasoningTier,
    /// Speed tier
    pub speed: SpeedTier,
    /// Context window in tokens
    pub max_tokens: u32,
    /// Model used when the caller gives none
    pub default_model: String,
}

impl ProviderProfile {
    /// Built-in profile for `provider`
    #[must_use]
    pub fn standard(provider: ProviderId) -> Self {
        let (reasoning_weight, reasoning, speed, max_tokens, default_model) = match provider {
            ProviderId::OpenAi => (1.0, ReasoningTier::High, SpeedTier::Medium, 128_000, "gpt-4o-mini"),
            ProviderId::Groq => (
                0.6,
                ReasoningTier::Medium,
                SpeedTier::UltraFast,
                32_000,
                "llama-3.1-8b-instant",
            ),
            ProviderId::Gemini => (
                1.0,
                ReasoningTier::High,
                SpeedTier::Medium,
                1_000_000,
                "gemini-1.5-flash",
            ),
            ProviderId::Ollama => (0.3, ReasoningTier::Low, SpeedTier::Local, 8_000, "llama3.2"),
        };
        Self {
            reasoning_weight,
            reasoning,
            speed,
            max_tokens,
            default_model: default_model.to_string(),
        }
    }
}

/// Capability table keyed by provider
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderCatalog {
    profiles: BTreeMap<ProviderId, ProviderProfile>,
}

impl ProviderCatalog {
    /// Catalog with no entries; every provider scores with the default weight
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog with the built-in profile of every provider
    #[must_use]
    pub fn standard() -> Self {
        ProviderId::ALL
            .into_iter()
            .fold(Self::empty(), |catalog, p| {
                catalog.with_profile(p, ProviderProfile::standard(p))
            })
    }

    /// Add or replace a profile
    #[must_use]
    pub fn with_profile(mut self, provider: ProviderId, profile: ProviderProfile) -> Self {
        self.profiles.insert(provider, profile);
        self
    }

    /// Profile for `provider`, if present
    #[must_use]
    pub fn get(&self, provider: ProviderId) -> Option<&ProviderProfile> {
        self.profiles.get(&provider)
    }

    /// Reasoning weight of `provider`, falling back to [`DEFAULT_REASONING_WEIGHT`]
    #[must_use]
    pub fn reasoning_weight(&self, provider: ProviderId) -> f64 {
        self.get(provider)
            .map_or(DEFAULT_REASONING_WEIGHT, |p| p.reasoning_weight)
    }

    /// Default model of `provider`, falling back to the built-in profile
    #[must_use]
    pub fn default_model(&self, provider: ProviderId) -> String {
        self.get(provider).map_or_else(
            || ProviderProfile::standard(provider).default_model,
            |p| p.default_model.clone(),
        )
    }
}
