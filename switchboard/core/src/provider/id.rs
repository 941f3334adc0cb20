//! Provider Identity
//!
//! The fixed set of backends the router knows about. The declaration order of
//! [`ProviderId::ALL`] is the stable iteration order used everywhere a
//! deterministic walk over providers matters (candidate selection, snapshots).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a provider name cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown provider '{0}' (expected one of: openai, groq, gemini, ollama, auto)")]
pub struct ParseProviderError(pub String);

/// Identity of a backend provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// OpenAI chat completions
    OpenAi,
    /// Groq (OpenAI-compatible API)
    Groq,
    /// Google Gemini
    Gemini,
    /// Self-hosted Ollama server
    Ollama,
}

impl ProviderId {
    /// Every provider, in stable iteration order
    pub const ALL: [ProviderId; 4] = [Self::OpenAi, Self::Groq, Self::Gemini, Self::Ollama];

    /// The self-hosted provider used as last resort
    pub const LOCAL_FALLBACK: ProviderId = Self::Ollama;

    /// Wire name of the provider
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }

    /// Whether this is the designated local fallback
    #[must_use]
    pub fn is_local_fallback(self) -> bool {
        self == Self::LOCAL_FALLBACK
    }

    /// Whether calling this provider requires an API key
    #[must_use]
    pub fn requires_api_key(self) -> bool {
        !self.is_local_fallback()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "groq" => Ok(Self::Groq),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ParseProviderError(s.to_string())),
        }
    }
}

/// Provider requested by the caller: a concrete backend or automatic selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RequestedProvider {
    /// Let the router pick using health and capability scores
    #[default]
    Auto,
    /// Use this provider unless its circuit is open
    Explicit(ProviderId),
}

impl From<ProviderId> for RequestedProvider {
    fn from(id: ProviderId) -> Self {
        Self::Explicit(id)
    }
}

impl fmt::Display for RequestedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Explicit(id) => id.fmt(f),
        }
    }
}

impl FromStr for RequestedProvider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse().map(Self::Explicit)
    }
}

impl TryFrom<String> for RequestedProvider {
    type Error = ParseProviderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RequestedProvider> for String {
    fn from(value: RequestedProvider) -> Self {
        value.to_string()
    }
}
