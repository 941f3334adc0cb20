//! Switchboard Core - Adaptive Multi-Provider LLM Routing
//!
//! This crate decides, per request, which of several interchangeable LLM
//! providers should serve a text-generation call. It tracks live health per
//! provider, stops sending traffic to providers that keep failing, and falls
//! back to a self-hosted provider when everything else is unavailable.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Callers                                 │
//! │        ┌─────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │        │   CLI   │   │ HTTP service │   │    Tests     │         │
//! │        └────┬────┘   └──────┬───────┘   └──────┬───────┘         │
//! │             └───────────────┼──────────────────┘                 │
//! │                    RouteRequest / RouteResponse                  │
//! └─────────────────────────────┼────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┼────────────────────────────────────┐
//! │                      SWITCHBOARD CORE                            │
//! │  ┌──────────────────────────┴─────────────────────────────────┐  │
//! │  │                     AdaptiveRouter                         │  │
//! │  │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌────────────┐  │  │
//! │  │  │ Circuit  │  │  Scorer  │  │ Metrics  │  │  Catalog   │  │  │
//! │  │  │ Breaker  │  │          │  │ Registry │  │            │  │  │
//! │  │  └──────────┘  └──────────┘  └──────────┘  └────────────┘  │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │  LlmProvider: OpenAI │ Groq │ Gemini │ Ollama (fallback)   │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`AdaptiveRouter`]: resolves a provider, calls it, records the outcome, falls back
//! - [`MetricsRegistry`]: per-provider counters, latency average, failure window
//! - [`CircuitBreaker`]: whether a provider is currently unavailable
//! - [`Scorer`]: ranks healthy providers
//! - [`LlmProvider`]: the uniform backend interface
//!
//! # Quick Start
//!
//! ```ignore
//! use switchboard_core::{load_config, AdaptiveRouter, ProviderSet, RouteRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let providers = ProviderSet::from_settings(&config.providers);
//!     let router = AdaptiveRouter::new(providers, config.router);
//!
//!     let response = router.route(RouteRequest::new("Summarise RFC 9110")).await?;
//!     println!("[{} / {}] {}", response.provider, response.routing_reason, response.text);
//!
//!     router.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`routing`]: router, circuit breaker, scorer, metrics registry, catalog
//! - [`provider`]: provider identity, errors, trait and HTTP clients
//! - [`config`]: TOML + environment + CLI configuration loading
//! - [`tokens`]: prompt size estimation

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod provider;
pub mod routing;
pub mod tokens;

// Provider exports
pub use provider::{
    ErrorClass, GeminiProvider, GenerateRequest, LlmProvider, OllamaProvider,
    OpenAiCompatProvider, ProviderError, ProviderId, ProviderSet, ProviderSettings,
    RequestedProvider, RetryPolicy, DEFAULT_TEMPERATURE,
};

// Routing exports
pub use routing::{
    AdaptiveRouter, CircuitBreaker, CircuitBreakerConfig, CircuitState, MetricsRegistry,
    ProviderCatalog, ProviderProfile, ProviderSnapshot, RouteRequest, RouteResponse, RouterConfig,
    RouterError, RoutingDecision, RoutingReason, ScoreWeights, Scorer, StatusReport,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, SwitchboardConfig, SwitchboardToml,
};

pub use tokens::estimate_tokens;
