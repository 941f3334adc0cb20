//! Adaptive Router
//!
//! The entry point for generation requests. Resolves which provider serves a
//! request, calls it under a deadline, feeds the outcome back into the
//! metrics registry and makes one fallback attempt against the local
//! provider when the call fails.
//!
//! # Resolution
//!
//! ```text
//! auto ──► probe local ──► candidates = circuit closed (+ local reachable)
//!                              │
//!                   empty ─────┴───── non-empty
//!                     │                   │
//!              local, circuit_fallback   argmax score, adaptive
//!
//! explicit(p) ──► circuit closed? ── yes ──► p, explicit
//!                        │
//!                        no ──► local reachable? ── yes ──► local, circuit_open_fallback
//!                                       │
//!                                       no ──► p anyway, circuit_open
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let router = AdaptiveRouter::new(ProviderSet::from_settings(&settings), RouterConfig::default());
//! let response = router.route(RouteRequest::new("Explain TCP slow start")).await?;
//! println!("{} answered: {}", response.provider, response.text);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::catalog::ProviderCatalog;
use super::circuit::{CircuitBreaker, CircuitState};
use super::config::RouterConfig;
use super::metrics::{MetricsRegistry, ProviderSnapshot};
use super::scorer::Scorer;
use crate::provider::{
    ErrorClass, GenerateRequest, ProviderError, ProviderId, ProviderSet, RequestedProvider,
    DEFAULT_TEMPERATURE,
};
use crate::tokens::estimate_tokens;

// ============================================================================
// Routing Decision
// ============================================================================

/// Why a provider ended up serving a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    /// The caller named the provider and its circuit was closed
    Explicit,
    /// Picked by score among healthy providers
    Adaptive,
    /// The caller's provider is open but nothing else was reachable
    CircuitOpen,
    /// The caller's provider is open; rerouted to the local provider
    CircuitOpenFallback,
    /// Every provider was unavailable; forced onto the local provider
    CircuitFallback,
    /// The first call failed and the local provider answered
    Fallback,
}

impl RoutingReason {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Adaptive => "adaptive",
            Self::CircuitOpen => "circuit_open",
            Self::CircuitOpenFallback => "circuit_open_fallback",
            Self::CircuitFallback => "circuit_fallback",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a requested provider
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoutingDecision {
    /// What the caller asked for
    pub original: RequestedProvider,
    /// Provider to call
    pub provider: ProviderId,
    /// Why
    pub reason: RoutingReason,
    /// Winning score, for adaptive picks
    pub score: Option<f64>,
    /// Whether an open circuit influenced the decision
    pub circuit_triggered: bool,
}

// ============================================================================
// Request / Response
// ============================================================================

/// A generation request
#[derive(Clone, Debug, PartialEq)]
pub struct RouteRequest {
    /// Prompt text
    pub prompt: String,
    /// Requested provider, `Auto` by default
    pub provider: RequestedProvider,
    /// Model override; blank means the provider's default
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
}

impl RouteRequest {
    /// Automatic routing with default model and temperature
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider: RequestedProvider::Auto,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Set the requested provider
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<RequestedProvider>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn caller_model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// A served request with its routing metadata
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteResponse {
    /// Correlation id, also present on every log line of the request
    pub request_id: Uuid,
    /// Generated text
    pub text: String,
    /// Provider that produced the text
    pub provider: ProviderId,
    /// Model sent to that provider
    pub model: String,
    /// Wall-clock time of the successful call
    pub latency_ms: f64,
    /// What the caller asked for
    pub original_provider: RequestedProvider,
    /// Why `provider` served the request
    pub routing_reason: RoutingReason,
    /// Winning score, for adaptive picks
    pub adaptive_score: Option<f64>,
    /// Whether an open circuit influenced routing
    pub circuit_triggered: bool,
    /// Estimated prompt size
    pub prompt_tokens: usize,
}

// ============================================================================
// Router Error
// ============================================================================

/// Fatal routing errors. Only raised once the fallback attempt also failed.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The fallback provider returned an error
    #[error("{primary} failed and fallback to {provider} also failed: {source}")]
    Provider {
        /// Provider tried first
        primary: ProviderId,
        /// Provider whose error is reported
        provider: ProviderId,
        /// Error of the fallback attempt
        source: ProviderError,
    },

    /// The fallback provider did not answer in time
    #[error("{primary} failed and fallback to {provider} timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// Provider tried first
        primary: ProviderId,
        /// Provider that timed out
        provider: ProviderId,
        /// Deadline that elapsed
        timeout: Duration,
    },
}

impl RouterError {
    /// Caller-facing category
    #[must_use]
    pub fn kind(&self) -> ErrorClass {
        match self {
            Self::Provider { source, .. } => source.class(),
            Self::Timeout { .. } => ErrorClass::ServiceUnavailable,
        }
    }

    /// Provider whose failure is reported
    #[must_use]
    pub fn provider(&self) -> ProviderId {
        match self {
            Self::Provider { provider, .. } | Self::Timeout { provider, .. } => *provider,
        }
    }
}

/// Why a single bounded call failed
#[derive(Debug)]
enum AttemptFailure {
    /// The router's own deadline elapsed first
    Deadline(Duration),
    /// The client returned an error, including its own transport timeouts
    Provider(ProviderError),
}

impl AttemptFailure {
    fn into_router_error(self, primary: ProviderId, provider: ProviderId) -> RouterError {
        match self {
            Self::Deadline(timeout) => RouterError::Timeout {
                primary,
                provider,
                timeout,
            },
            Self::Provider(source) => RouterError::Provider {
                primary,
                provider,
                source,
            },
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline(timeout) => write!(f, "no response within {}s", timeout.as_secs()),
            Self::Provider(err) => err.fmt(f),
        }
    }
}

// ============================================================================
// Status Report
// ============================================================================

/// Readiness of one provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Remote provider with a credential
    Configured,
    /// Remote provider without a credential
    MissingKey,
    /// Local provider answered its probe
    Reachable,
    /// Local provider did not answer its probe
    Unreachable,
}

/// Status line for one provider
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProviderStatus {
    /// Provider
    pub provider: ProviderId,
    /// Readiness
    pub status: Availability,
    /// Circuit state
    pub circuit: CircuitState,
}

/// Overall readiness: `ok` needs only the local provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Local provider reachable
    Ok,
    /// Local provider unreachable; remote providers may still work
    Degraded,
}

/// Status of every provider
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusReport {
    /// Overall readiness
    pub status: OverallStatus,
    /// Per-provider lines, in stable order
    pub providers: Vec<ProviderStatus>,
}

// ============================================================================
// Adaptive Router
// ============================================================================

/// Health-aware router with one-step local fallback
#[derive(Debug)]
pub struct AdaptiveRouter {
    providers: ProviderSet,
    registry: Arc<MetricsRegistry>,
    breaker: CircuitBreaker,
    scorer: Scorer,
    catalog: Arc<ProviderCatalog>,
    config: RouterConfig,
}

impl AdaptiveRouter {
    /// Create a router with the standard catalog
    #[must_use]
    pub fn new(providers: ProviderSet, config: RouterConfig) -> Self {
        Self::with_catalog(providers, ProviderCatalog::standard(), config)
    }

    /// Create a router with a custom catalog
    #[must_use]
    pub fn with_catalog(
        providers: ProviderSet,
        catalog: ProviderCatalog,
        config: RouterConfig,
    ) -> Self {
        let registry = Arc::new(MetricsRegistry::new(
            config.circuit.clone(),
            config.ewma_alpha,
        ));
        let catalog = Arc::new(catalog);
        Self {
            breaker: CircuitBreaker::new(Arc::clone(&registry)),
            scorer: Scorer::new(Arc::clone(&registry), Arc::clone(&catalog), config.weights),
            providers,
            registry,
            catalog,
            config,
        }
    }

    /// Shared metrics registry
    #[must_use]
    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// Circuit breaker over the registry
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Decide which provider should serve `requested`
    pub async fn resolve(&self, requested: RequestedProvider) -> RoutingDecision {
        let local = ProviderId::LOCAL_FALLBACK;
        match requested {
            RequestedProvider::Auto => {
                let local_reachable = self.probe_local().await;
                let now = Instant::now();
                let candidates: Vec<ProviderId> = self
                    .providers
                    .ids()
                    .filter(|p| !self.breaker.is_open_at(*p, now))
                    .filter(|p| !p.is_local_fallback() || local_reachable)
                    .collect();

                match self.scorer.select_best(&candidates) {
                    Some((provider, score)) => RoutingDecision {
                        original: requested,
                        provider,
                        reason: RoutingReason::Adaptive,
                        score: Some(score),
                        circuit_triggered: false,
                    },
                    None => RoutingDecision {
                        original: requested,
                        provider: local,
                        reason: RoutingReason::CircuitFallback,
                        score: None,
                        circuit_triggered: true,
                    },
                }
            }
            RequestedProvider::Explicit(provider) => {
                if !self.breaker.is_open(provider) {
                    return RoutingDecision {
                        original: requested,
                        provider,
                        reason: RoutingReason::Explicit,
                        score: None,
                        circuit_triggered: false,
                    };
                }

                let (provider, reason) = if self.probe_local().await {
                    (local, RoutingReason::CircuitOpenFallback)
                } else {
                    (provider, RoutingReason::CircuitOpen)
                };
                RoutingDecision {
                    original: requested,
                    provider,
                    reason,
                    score: None,
                    circuit_triggered: true,
                }
            }
        }
    }

    /// Serve a request, falling back to the local provider once on failure
    pub async fn route(&self, request: RouteRequest) -> Result<RouteResponse, RouterError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "route",
            %request_id,
            requested = %request.provider,
        );
        self.route_inner(request_id, request).instrument(span).await
    }

    async fn route_inner(
        &self,
        request_id: Uuid,
        request: RouteRequest,
    ) -> Result<RouteResponse, RouterError> {
        let decision = self.resolve(request.provider).await;
        tracing::debug!(
            provider = %decision.provider,
            reason = %decision.reason,
            score = decision.score,
            circuit_triggered = decision.circuit_triggered,
            "Resolved provider"
        );

        let prompt_tokens = estimate_tokens(&request.prompt);
        let primary = decision.provider;
        let model = request
            .caller_model()
            .map_or_else(|| self.catalog.default_model(primary), ToString::to_string);

        let respond = |provider: ProviderId,
                       model: String,
                       text: String,
                       latency_ms: f64,
                       routing_reason: RoutingReason| RouteResponse {
            request_id,
            text,
            provider,
            model,
            latency_ms,
            original_provider: decision.original,
            routing_reason,
            adaptive_score: decision.score,
            circuit_triggered: decision.circuit_triggered,
            prompt_tokens,
        };

        let err = match self.attempt(primary, &request, &model).await {
            Ok((text, latency_ms)) => {
                log_used(&decision, primary, decision.reason, latency_ms, prompt_tokens);
                return Ok(respond(primary, model, text, latency_ms, decision.reason));
            }
            Err(err) => err,
        };

        tracing::warn!(
            event = "provider_failed",
            provider = %primary,
            error = %err,
            "Provider failed, falling back to local provider"
        );
        self.close_client(primary).await;

        let fallback = ProviderId::LOCAL_FALLBACK;
        let fallback_model = request
            .caller_model()
            .map_or_else(|| self.catalog.default_model(fallback), ToString::to_string);

        match self.attempt(fallback, &request, &fallback_model).await {
            Ok((text, latency_ms)) => {
                log_used(&decision, fallback, RoutingReason::Fallback, latency_ms, prompt_tokens);
                Ok(respond(
                    fallback,
                    fallback_model,
                    text,
                    latency_ms,
                    RoutingReason::Fallback,
                ))
            }
            Err(err) => {
                tracing::error!(
                    primary = %primary,
                    provider = %fallback,
                    error = %err,
                    "Fallback provider failed"
                );
                self.close_client(fallback).await;
                Err(err.into_router_error(primary, fallback))
            }
        }
    }

    /// One bounded call. Records the outcome in the registry.
    async fn attempt(
        &self,
        provider: ProviderId,
        request: &RouteRequest,
        model: &str,
    ) -> Result<(String, f64), AttemptFailure> {
        let generate = GenerateRequest::new(request.prompt.clone(), model)
            .with_temperature(request.temperature);
        let timeout = self.config.request_timeout;
        let started = Instant::now();

        let outcome = match self.providers.get(provider) {
            Some(client) => match tokio::time::timeout(timeout, client.generate(&generate)).await {
                Ok(result) => result.map_err(AttemptFailure::Provider),
                Err(_) => Err(AttemptFailure::Deadline(timeout)),
            },
            None => Err(AttemptFailure::Provider(ProviderError::Unreachable {
                provider,
                message: "no client registered".to_string(),
            })),
        };

        match outcome {
            Ok(text) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.registry.record_success(provider, latency_ms);
                Ok((text, latency_ms))
            }
            Err(err) => {
                self.registry.record_failure(provider);
                Err(err)
            }
        }
    }

    async fn probe_local(&self) -> bool {
        let Some(client) = self.providers.get(ProviderId::LOCAL_FALLBACK) else {
            return false;
        };
        let reachable = tokio::time::timeout(self.config.probe_timeout, client.check_reachable())
            .await
            .unwrap_or(false);
        tracing::debug!(reachable, "Probed local provider");
        reachable
    }

    async fn close_client(&self, provider: ProviderId) {
        if let Some(client) = self.providers.get(provider) {
            client.close().await;
        }
    }

    /// Snapshots of every provider, in stable order
    #[must_use]
    pub fn metrics_snapshot(&self) -> Vec<ProviderSnapshot> {
        self.registry.snapshots()
    }

    /// Credential and reachability status of every provider
    pub async fn provider_statuses(&self) -> StatusReport {
        let local_reachable = self.probe_local().await;
        let providers = ProviderId::ALL
            .into_iter()
            .map(|provider| {
                let status = if provider.is_local_fallback() {
                    if local_reachable {
                        Availability::Reachable
                    } else {
                        Availability::Unreachable
                    }
                } else if self
                    .providers
                    .get(provider)
                    .is_some_and(|c| c.has_credentials())
                {
                    Availability::Configured
                } else {
                    Availability::MissingKey
                };
                ProviderStatus {
                    provider,
                    status,
                    circuit: self.breaker.state(provider),
                }
            })
            .collect();

        StatusReport {
            status: if local_reachable {
                OverallStatus::Ok
            } else {
                OverallStatus::Degraded
            },
            providers,
        }
    }

    /// Release every provider's connection pool
    pub async fn shutdown(&self) {
        futures::future::join_all(self.providers.iter().map(|client| client.close())).await;
        tracing::info!(providers = self.providers.len(), "Router shut down");
    }
}

fn log_used(
    decision: &RoutingDecision,
    provider: ProviderId,
    reason: RoutingReason,
    latency_ms: f64,
    prompt_tokens: usize,
) {
    tracing::info!(
        event = "llm_used",
        original_provider = %decision.original,
        final_provider = %provider,
        routing_reason = %reason,
        latency_ms,
        prompt_tokens,
        "Request served"
    );
}
