//! Provider Metrics Registry
//!
//! Per-provider health record shared by every in-flight request:
//! - request, success and failure counters
//! - exponentially weighted latency average over successful calls
//! - sliding window of recent failure timestamps
//! - the circuit breaker timer
//!
//! # Thread Safety
//!
//! Entries live in a `DashMap` created once with one entry per provider.
//! Each entry has its own lock, so unrelated providers never contend and a
//! read-modify-write on one provider is atomic with respect to other callers.
//! Snapshots copy state out of the lock before anything is serialized.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use super::circuit::{CircuitState, CircuitTimer};
use super::config::CircuitBreakerConfig;
use super::scorer::ScoreInputs;
use crate::provider::ProviderId;

// ============================================================================
// Provider Health
// ============================================================================

#[derive(Debug, Default)]
struct HealthState {
    total: u64,
    successes: u64,
    failures: u64,
    avg_latency_ms: Option<f64>,
    recent_failures: VecDeque<Instant>,
    circuit: CircuitTimer,
    last_failure_at: Option<Instant>,
}

impl HealthState {
    fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures as f64 / self.total as f64
        }
    }
}

/// Health record for a single provider
pub struct ProviderHealth {
    provider: ProviderId,
    circuit_config: CircuitBreakerConfig,
    ewma_alpha: f64,
    state: Mutex<HealthState>,
}

impl ProviderHealth {
    /// Create an empty record
    #[must_use]
    pub fn new(provider: ProviderId, circuit_config: CircuitBreakerConfig, ewma_alpha: f64) -> Self {
        Self {
            provider,
            circuit_config,
            ewma_alpha,
            state: Mutex::new(HealthState::default()),
        }
    }

    /// Record a successful call that took `latency_ms`
    ///
    /// Does not touch the circuit: a success while open does not close it.
    pub fn record_success(&self, latency_ms: f64) {
        let alpha = self.ewma_alpha;
        let mut state = self.state.lock();
        state.total += 1;
        state.successes += 1;
        state.avg_latency_ms = Some(match state.avg_latency_ms {
            None => latency_ms,
            Some(avg) => avg * (1.0 - alpha) + latency_ms * alpha,
        });
    }

    /// Record a failed call at `now`
    ///
    /// Prunes failures older than the window and (re)opens the circuit once
    /// the threshold is reached. Re-opening an open circuit restarts the cooldown.
    /// A stamp older than the newest recorded failure is treated as that failure's.
    pub fn record_failure_at(&self, now: Instant) {
        let failure_window = self.circuit_config.failure_window;
        let cooldown = self.circuit_config.cooldown;

        let mut state = self.state.lock();
        // Keep the window sorted so pruning from the front stays exact
        let now = state
            .recent_failures
            .back()
            .map_or(now, |newest| now.max(*newest));
        state.total += 1;
        state.failures += 1;
        state.last_failure_at = Some(now);
        state.recent_failures.push_back(now);

        if let Some(cutoff) = now.checked_sub(failure_window) {
            while state.recent_failures.front().is_some_and(|t| *t < cutoff) {
                state.recent_failures.pop_front();
            }
        }

        let recent = state.recent_failures.len();
        if recent >= self.circuit_config.failure_threshold {
            state.circuit.trip(now, cooldown);
            drop(state);
            tracing::warn!(
                provider = %self.provider,
                recent_failures = recent,
                cooldown_secs = cooldown.as_secs(),
                "Circuit breaker opened"
            );
        }
    }

    /// Circuit state at `now`, clearing it if the cooldown has elapsed
    pub fn circuit_state_at(&self, now: Instant) -> CircuitState {
        let (circuit, cleared) = self.state.lock().circuit.observe(now);
        if cleared {
            tracing::info!(provider = %self.provider, "Circuit breaker closed after cooldown");
        }
        circuit
    }

    /// Unrounded inputs for scoring
    #[must_use]
    pub fn score_inputs(&self, reasoning_weight: f64) -> ScoreInputs {
        let state = self.state.lock();
        ScoreInputs {
            failure_rate: state.failure_rate(),
            avg_latency_ms: state.avg_latency_ms.unwrap_or(0.0),
            reasoning_weight,
        }
    }

    /// Read-only view at `now`
    pub fn snapshot_at(&self, now: Instant) -> ProviderSnapshot {
        let circuit = self.circuit_state_at(now);
        let state = self.state.lock();
        let cutoff = now.checked_sub(self.circuit_config.failure_window);
        let recent_failures = state
            .recent_failures
            .iter()
            .filter(|t| !cutoff.is_some_and(|c| **t < c))
            .count();

        ProviderSnapshot {
            provider: self.provider,
            total_requests: state.total,
            successes: state.successes,
            failures: state.failures,
            failure_rate: round_to(state.failure_rate(), 4),
            avg_latency_ms: round_to(state.avg_latency_ms.unwrap_or(0.0), 2),
            circuit_open: circuit.is_open(),
            recent_failures,
            cooldown_remaining_ms: match circuit {
                CircuitState::Open { remaining } => Some(millis(remaining)),
                CircuitState::Closed => None,
            },
            secs_since_last_failure: state
                .last_failure_at
                .map(|t| now.saturating_duration_since(t).as_secs()),
        }
    }
}

impl std::fmt::Debug for ProviderHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProviderHealth")
            .field("provider", &self.provider)
            .field("total", &state.total)
            .field("failures", &state.failures)
            .field("recent_failures", &state.recent_failures.len())
            .finish()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of one provider's health
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProviderSnapshot {
    /// Provider
    pub provider: ProviderId,
    /// Calls recorded
    pub total_requests: u64,
    /// Successful calls
    pub successes: u64,
    /// Failed calls
    pub failures: u64,
    /// `failures / total_requests`, rounded to 4 decimals
    pub failure_rate: f64,
    /// Latency average in milliseconds, rounded to 2 decimals
    pub avg_latency_ms: f64,
    /// Whether the circuit is open
    pub circuit_open: bool,
    /// Failures inside the trailing window
    pub recent_failures: usize,
    /// Time until the circuit closes, when open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_ms: Option<u64>,
    /// Seconds since the most recent failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secs_since_last_failure: Option<u64>,
}

// ============================================================================
// Metrics Registry
// ============================================================================

/// Health records for every provider
///
/// Constructed once and shared through `Arc`.
pub struct MetricsRegistry {
    entries: DashMap<ProviderId, Arc<ProviderHealth>>,
    circuit_config: CircuitBreakerConfig,
    ewma_alpha: f64,
}

impl MetricsRegistry {
    /// Create a registry with one empty record per provider
    #[must_use]
    pub fn new(circuit_config: CircuitBreakerConfig, ewma_alpha: f64) -> Self {
        let registry = Self {
            entries: DashMap::new(),
            circuit_config,
            ewma_alpha,
        };
        for provider in ProviderId::ALL {
            registry.entry(provider);
        }
        registry
    }

    /// Health record for `provider`
    pub fn entry(&self, provider: ProviderId) -> Arc<ProviderHealth> {
        if let Some(health) = self.entries.get(&provider) {
            return Arc::clone(health.value());
        }
        self.entries
            .entry(provider)
            .or_insert_with(|| {
                Arc::new(ProviderHealth::new(
                    provider,
                    self.circuit_config.clone(),
                    self.ewma_alpha,
                ))
            })
            .clone()
    }

    /// Record a successful call
    pub fn record_success(&self, provider: ProviderId, latency_ms: f64) {
        self.entry(provider).record_success(latency_ms);
    }

    /// Record a failed call now
    pub fn record_failure(&self, provider: ProviderId) {
        self.record_failure_at(provider, Instant::now());
    }

    /// Record a failed call at `now`
    pub fn record_failure_at(&self, provider: ProviderId, now: Instant) {
        self.entry(provider).record_failure_at(now);
    }

    /// Snapshot of one provider now
    #[must_use]
    pub fn snapshot(&self, provider: ProviderId) -> ProviderSnapshot {
        self.snapshot_at(provider, Instant::now())
    }

    /// Snapshot of one provider at `now`
    #[must_use]
    pub fn snapshot_at(&self, provider: ProviderId, now: Instant) -> ProviderSnapshot {
        self.entry(provider).snapshot_at(now)
    }

    /// Snapshots of every provider, in stable order
    #[must_use]
    pub fn snapshots(&self) -> Vec<ProviderSnapshot> {
        let now = Instant::now();
        ProviderId::ALL
            .into_iter()
            .map(|p| self.snapshot_at(p, now))
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default(), 0.2)
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("providers", &self.entries.len())
            .field("circuit_config", &self.circuit_config)
            .field("ewma_alpha", &self.ewma_alpha)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: ProviderId = ProviderId::OpenAi;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = MetricsRegistry::default();
        let snapshots = registry.snapshots();

        assert_eq!(snapshots.len(), 4);
        for (snapshot, provider) in snapshots.iter().zip(ProviderId::ALL) {
            assert_eq!(snapshot.provider, provider);
            assert_eq!(snapshot.total_requests, 0);
            assert_eq!(snapshot.failure_rate, 0.0);
            assert_eq!(snapshot.avg_latency_ms, 0.0);
            assert!(!snapshot.circuit_open);
            assert_eq!(snapshot.secs_since_last_failure, None);
        }
    }

    #[test]
    fn test_ewma_latency() {
        let registry = MetricsRegistry::default();

        registry.record_success(P, 100.0);
        assert_eq!(registry.snapshot(P).avg_latency_ms, 100.0);

        registry.record_success(P, 200.0);
        assert_eq!(registry.snapshot(P).avg_latency_ms, 120.0);
    }

    #[test]
    fn test_failure_rate_rounding() {
        let registry = MetricsRegistry::default();
        registry.record_success(P, 10.0);
        registry.record_success(P, 10.0);
        registry.record_failure(P);

        let snapshot = registry.snapshot(P);
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.successes, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.failure_rate, 0.3333);
    }

    #[test]
    fn test_latency_rounding() {
        let registry = MetricsRegistry::default();
        registry.record_success(P, 100.0);
        registry.record_success(P, 101.111);
        // 100 * 0.8 + 101.111 * 0.2 = 100.2222
        assert_eq!(registry.snapshot(P).avg_latency_ms, 100.22);
    }

    #[test]
    fn test_failures_outside_window_do_not_count() {
        let registry = MetricsRegistry::default();
        let t0 = Instant::now();

        registry.record_failure_at(P, t0);
        registry.record_failure_at(P, t0 + secs(30));
        registry.record_failure_at(P, t0 + secs(61));

        let snapshot = registry.snapshot_at(P, t0 + secs(61));
        assert!(!snapshot.circuit_open);
        assert_eq!(snapshot.recent_failures, 2);
        assert_eq!(snapshot.failures, 3);
    }

    #[test]
    fn test_late_stamped_failure_keeps_window_consistent() {
        let registry = MetricsRegistry::default();
        let t0 = Instant::now();

        registry.record_failure_at(P, t0 + secs(30));
        registry.record_failure_at(P, t0);
        registry.record_failure_at(P, t0 + secs(61));

        let snapshot = registry.snapshot_at(P, t0 + secs(61));
        assert!(snapshot.circuit_open);
        assert_eq!(snapshot.recent_failures, 3);
        assert_eq!(snapshot.secs_since_last_failure, Some(0));
    }

    #[test]
    fn test_late_stamped_failure_does_not_shorten_cooldown() {
        let registry = MetricsRegistry::default();
        let t0 = Instant::now();
        for i in 28..=30 {
            registry.record_failure_at(P, t0 + secs(i));
        }
        // Opened at t0+30 until t0+90
        registry.record_failure_at(P, t0 + secs(10));

        let snapshot = registry.snapshot_at(P, t0 + secs(30));
        assert_eq!(snapshot.cooldown_remaining_ms, Some(60_000));
        assert_eq!(snapshot.secs_since_last_failure, Some(0));
        assert!(registry.snapshot_at(P, t0 + secs(89)).circuit_open);
    }

    #[test]
    fn test_window_cutoff_is_inclusive() {
        let registry = MetricsRegistry::default();
        let t0 = Instant::now();

        registry.record_failure_at(P, t0);
        registry.record_failure_at(P, t0 + secs(30));
        registry.record_failure_at(P, t0 + secs(60));

        assert!(registry.snapshot_at(P, t0 + secs(60)).circuit_open);
    }

    #[test]
    fn test_reopen_resets_cooldown() {
        let registry = MetricsRegistry::default();
        let t0 = Instant::now();
        for i in 0..3 {
            registry.record_failure_at(P, t0 + secs(i));
        }
        // Opened at t0+2 until t0+62
        registry.record_failure_at(P, t0 + secs(30));

        let snapshot = registry.snapshot_at(P, t0 + secs(70));
        assert!(snapshot.circuit_open);
        assert_eq!(snapshot.cooldown_remaining_ms, Some(20_000));
        assert!(!registry.snapshot_at(P, t0 + secs(90)).circuit_open);
    }

    #[test]
    fn test_success_does_not_close_open_circuit() {
        let registry = MetricsRegistry::default();
        let t0 = Instant::now();
        for _ in 0..3 {
            registry.record_failure_at(P, t0);
        }
        registry.record_success(P, 50.0);
        registry.record_success(P, 50.0);

        assert!(registry.snapshot_at(P, t0 + secs(1)).circuit_open);
    }

    #[test]
    fn test_opening_keeps_failure_timestamps() {
        let registry = MetricsRegistry::default();
        let t0 = Instant::now();
        for _ in 0..3 {
            registry.record_failure_at(P, t0);
        }
        let snapshot = registry.snapshot_at(P, t0 + secs(1));
        assert_eq!(snapshot.recent_failures, 3);
        assert_eq!(snapshot.secs_since_last_failure, Some(1));
    }

    #[test]
    fn test_custom_threshold() {
        let registry = MetricsRegistry::new(
            CircuitBreakerConfig {
                failure_threshold: 1,
                failure_window: secs(10),
                cooldown: secs(5),
            },
            0.5,
        );
        let t0 = Instant::now();
        registry.record_failure_at(ProviderId::Groq, t0);
        assert!(registry.snapshot_at(ProviderId::Groq, t0).circuit_open);
        assert!(!registry.snapshot_at(ProviderId::Groq, t0 + secs(5)).circuit_open);

        registry.record_success(ProviderId::Groq, 100.0);
        registry.record_success(ProviderId::Groq, 200.0);
        assert_eq!(registry.snapshot(ProviderId::Groq).avg_latency_ms, 150.0);
    }

    #[test]
    fn test_snapshot_serializes_without_internal_timestamps() {
        let registry = MetricsRegistry::default();
        registry.record_success(ProviderId::Ollama, 12.5);
        let json = serde_json::to_value(registry.snapshot(ProviderId::Ollama)).unwrap();

        assert_eq!(json["provider"], "ollama");
        assert_eq!(json["avg_latency_ms"], 12.5);
        assert!(json.get("cooldown_remaining_ms").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_exact() {
        let registry = Arc::new(MetricsRegistry::default());
        let mut handles = Vec::new();
        for i in 0..50 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    if i % 2 == 0 {
                        registry.record_failure(ProviderId::Gemini);
                    } else {
                        registry.record_success(ProviderId::Gemini, 10.0);
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = registry.snapshot(ProviderId::Gemini);
        assert_eq!(snapshot.total_requests, 1000);
        assert_eq!(snapshot.failures, 500);
        assert_eq!(snapshot.successes, 500);
        assert_eq!(snapshot.failure_rate, 0.5);
        assert!(snapshot.circuit_open);
    }
}
