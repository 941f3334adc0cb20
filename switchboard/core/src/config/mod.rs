//! TOML Configuration File Support
//!
//! Centralized configuration loading for the router and its provider
//! clients, with an optional TOML file at
//! `~/.config/switchboard/switchboard.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [routing]
//! request_timeout_secs = 30
//! probe_timeout_secs = 5
//! retry_backoff_ms = 2000
//!
//! [circuit_breaker]
//! failure_threshold = 3
//! failure_window_secs = 60
//! cooldown_secs = 60
//!
//! [scoring]
//! ewma_alpha = 0.2
//! failure_weight = 0.5
//! latency_weight = 0.3
//! reasoning_weight = 0.2
//!
//! [providers]
//! ollama_base_url = "http://localhost:11434"
//! groq_api_key = "gsk_..."
//! ```
//!
//! # Environment
//!
//! `OPENAI_API_KEY`, `GROQ_API_KEY`, `GEMINI_API_KEY`, `OLLAMA_BASE_URL`,
//! `REQUEST_TIMEOUT` (seconds), `SWITCHBOARD_PROBE_TIMEOUT` (seconds),
//! `SWITCHBOARD_FAILURE_THRESHOLD`, `SWITCHBOARD_FAILURE_WINDOW` (seconds),
//! `SWITCHBOARD_COOLDOWN` (seconds), `SWITCHBOARD_EWMA_ALPHA`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{ProviderSettings, RetryPolicy};
use crate::routing::RouterConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Routing section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingToml {
    /// Per-call deadline in seconds
    pub request_timeout_secs: Option<f64>,

    /// Local reachability probe deadline in seconds
    pub probe_timeout_secs: Option<f64>,

    /// Delay before a provider client's single retry, in milliseconds
    pub retry_backoff_ms: Option<u64>,
}

/// Circuit breaker section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerToml {
    /// Failures inside the window that open the circuit
    pub failure_threshold: Option<usize>,

    /// Failure window in seconds
    pub failure_window_secs: Option<u64>,

    /// Open duration in seconds
    pub cooldown_secs: Option<u64>,
}

/// Scoring section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringToml {
    /// Latency average smoothing factor
    pub ewma_alpha: Option<f64>,

    /// Weight of the reliability term
    pub failure_weight: Option<f64>,

    /// Weight of the latency term
    pub latency_weight: Option<f64>,

    /// Weight of the reasoning capability term
    pub reasoning_weight: Option<f64>,
}

/// Providers section of the TOML configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersToml {
    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Groq API key
    pub groq_api_key: Option<String>,

    /// Gemini API key
    pub gemini_api_key: Option<String>,

    /// Ollama server address
    pub ollama_base_url: Option<String>,

    /// OpenAI API base
    pub openai_base_url: Option<String>,

    /// Groq API base
    pub groq_base_url: Option<String>,

    /// Gemini API base
    pub gemini_base_url: Option<String>,
}

impl std::fmt::Debug for ProvidersToml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidersToml")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("groq_api_key", &self.groq_api_key.as_ref().map(|_| "<set>"))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<set>"))
            .field("ollama_base_url", &self.ollama_base_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("groq_base_url", &self.groq_base_url)
            .field("gemini_base_url", &self.gemini_base_url)
            .finish()
    }
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardToml {
    /// Routing configuration section
    pub routing: RoutingToml,

    /// Circuit breaker configuration section
    pub circuit_breaker: CircuitBreakerToml,

    /// Scoring configuration section
    pub scoring: ScoringToml,

    /// Provider configuration section
    pub providers: ProvidersToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct SwitchboardConfig {
    /// Router configuration
    pub router: RouterConfig,

    /// Provider client settings
    pub providers: ProviderSettings,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            providers: ProviderSettings::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl SwitchboardConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the per-call deadline on both the router and the HTTP clients
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.router.request_timeout = timeout;
        self.providers.request_timeout = timeout;
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let router = &self.router;
        if router.request_timeout.is_zero() {
            return Err(invalid("request timeout must be greater than zero"));
        }
        if router.probe_timeout.is_zero() {
            return Err(invalid("probe timeout must be greater than zero"));
        }
        if router.circuit.failure_threshold == 0 {
            return Err(invalid("failure threshold must be at least 1"));
        }
        if router.circuit.failure_window.is_zero() {
            return Err(invalid("failure window must be greater than zero"));
        }
        if router.circuit.cooldown.is_zero() {
            return Err(invalid("cooldown must be greater than zero"));
        }
        if !(router.ewma_alpha > 0.0 && router.ewma_alpha <= 1.0) {
            return Err(invalid(format!(
                "ewma_alpha must be in (0, 1], got {}",
                router.ewma_alpha
            )));
        }
        let weights = router.weights;
        for (name, value) in [
            ("failure_weight", weights.failure),
            ("latency_weight", weights.latency),
            ("reasoning_weight", weights.reasoning),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{name} must be a non-negative number")));
            }
        }
        if self.providers.ollama_base_url.trim().is_empty() {
            return Err(invalid("ollama base URL must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/switchboard/switchboard.toml` or
/// `~/.config/switchboard/switchboard.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("switchboard").join("switchboard.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged configuration is invalid. A missing config file is not an error.
pub fn load_config() -> Result<SwitchboardConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the merged configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<SwitchboardConfig, ConfigError> {
    let mut config = SwitchboardConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: SwitchboardToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_with(&mut config, |key| std::env::var(key).ok());

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
pub fn apply_toml_config(config: &mut SwitchboardConfig, toml: &SwitchboardToml) {
    // Routing
    if let Some(secs) = toml.routing.request_timeout_secs {
        if let Some(timeout) = secs_to_duration(secs) {
            config.set_request_timeout(timeout);
        }
    }
    if let Some(secs) = toml.routing.probe_timeout_secs {
        if let Some(timeout) = secs_to_duration(secs) {
            config.router.probe_timeout = timeout;
        }
    }
    if let Some(ms) = toml.routing.retry_backoff_ms {
        config.providers.retry = RetryPolicy::with_backoff(Duration::from_millis(ms));
    }

    // Circuit breaker
    if let Some(threshold) = toml.circuit_breaker.failure_threshold {
        config.router.circuit.failure_threshold = threshold;
    }
    if let Some(secs) = toml.circuit_breaker.failure_window_secs {
        config.router.circuit.failure_window = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.circuit_breaker.cooldown_secs {
        config.router.circuit.cooldown = Duration::from_secs(secs);
    }

    // Scoring
    if let Some(alpha) = toml.scoring.ewma_alpha {
        config.router.ewma_alpha = alpha;
    }
    if let Some(weight) = toml.scoring.failure_weight {
        config.router.weights.failure = weight;
    }
    if let Some(weight) = toml.scoring.latency_weight {
        config.router.weights.latency = weight;
    }
    if let Some(weight) = toml.scoring.reasoning_weight {
        config.router.weights.reasoning = weight;
    }

    // Providers
    let providers = &toml.providers;
    let settings = &mut config.providers;
    merge_non_blank(&mut settings.openai_api_key, &providers.openai_api_key);
    merge_non_blank(&mut settings.groq_api_key, &providers.groq_api_key);
    merge_non_blank(&mut settings.gemini_api_key, &providers.gemini_api_key);
    merge_non_blank(&mut settings.openai_base_url, &providers.openai_base_url);
    merge_non_blank(&mut settings.groq_base_url, &providers.groq_base_url);
    merge_non_blank(&mut settings.gemini_base_url, &providers.gemini_base_url);
    if let Some(url) = non_blank(providers.ollama_base_url.as_deref()) {
        settings.ollama_base_url = url.to_string();
    }
}

/// Apply environment overrides, reading variables through `lookup`
///
/// Unparsable numeric values are logged and ignored.
pub fn apply_env_with<F>(config: &mut SwitchboardConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let mut touched = false;

    // Credentials and endpoints
    for (key, slot) in [
        ("OPENAI_API_KEY", &mut config.providers.openai_api_key),
        ("GROQ_API_KEY", &mut config.providers.groq_api_key),
        ("GEMINI_API_KEY", &mut config.providers.gemini_api_key),
    ] {
        if let Some(value) = var(key) {
            *slot = Some(value.trim().to_string());
            touched = true;
        }
    }
    if let Some(url) = var("OLLAMA_BASE_URL") {
        config.providers.ollama_base_url = url.trim().to_string();
        touched = true;
    }

    // Timeouts
    if let Some(timeout) = parse_env::<f64>("REQUEST_TIMEOUT", var("REQUEST_TIMEOUT"))
        .and_then(secs_to_duration)
    {
        config.set_request_timeout(timeout);
        touched = true;
    }
    if let Some(timeout) =
        parse_env::<f64>("SWITCHBOARD_PROBE_TIMEOUT", var("SWITCHBOARD_PROBE_TIMEOUT"))
            .and_then(secs_to_duration)
    {
        config.router.probe_timeout = timeout;
        touched = true;
    }

    // Circuit breaker and scoring
    if let Some(threshold) = parse_env::<usize>(
        "SWITCHBOARD_FAILURE_THRESHOLD",
        var("SWITCHBOARD_FAILURE_THRESHOLD"),
    ) {
        config.router.circuit.failure_threshold = threshold;
        touched = true;
    }
    if let Some(secs) =
        parse_env::<u64>("SWITCHBOARD_FAILURE_WINDOW", var("SWITCHBOARD_FAILURE_WINDOW"))
    {
        config.router.circuit.failure_window = Duration::from_secs(secs);
        touched = true;
    }
    if let Some(secs) = parse_env::<u64>("SWITCHBOARD_COOLDOWN", var("SWITCHBOARD_COOLDOWN")) {
        config.router.circuit.cooldown = Duration::from_secs(secs);
        touched = true;
    }
    if let Some(alpha) = parse_env::<f64>("SWITCHBOARD_EWMA_ALPHA", var("SWITCHBOARD_EWMA_ALPHA"))
    {
        config.router.ewma_alpha = alpha;
        touched = true;
    }

    if touched {
        config.source = ConfigSource::Env;
    }
}

fn parse_env<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "Ignoring unparsable environment variable");
            None
        }
    }
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn merge_non_blank(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = non_blank(value.as_deref()) {
        *slot = Some(v.to_string());
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Per-call deadline override (seconds)
    pub request_timeout_secs: Option<f64>,

    /// Ollama server address override
    pub ollama_base_url: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set request timeout override
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: f64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Set Ollama address override
    #[must_use]
    pub fn with_ollama_base_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_base_url = Some(url.into());
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override makes the
    /// configuration invalid.
    pub fn apply(&self, config: &mut SwitchboardConfig) -> Result<(), ConfigError> {
        if self.request_timeout_secs.is_some() || self.ollama_base_url.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(secs) = self.request_timeout_secs {
            let timeout = secs_to_duration(secs)
                .ok_or_else(|| invalid(format!("invalid timeout: {secs}")))?;
            config.set_request_timeout(timeout);
        }

        if let Some(ref url) = self.ollama_base_url {
            config.providers.ollama_base_url = url.trim().to_string();
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
