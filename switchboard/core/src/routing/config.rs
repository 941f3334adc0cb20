//! Routing Configuration
//!
//! Tunables for the circuit breaker, the latency average and the scorer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Circuit Breaker
// ============================================================================

/// Circuit breaker thresholds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures inside the window that open the circuit
    pub failure_threshold: usize,

    /// Trailing window over which failures are counted
    pub failure_window: Duration,

    /// How long the circuit stays open after tripping
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// Score Weights
// ============================================================================

/// Relative weight of each scoring term
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of the reliability term `1 - failure_rate`
    pub failure: f64,
    /// Weight of the latency term `1 / (avg_latency_ms + 1)`
    pub latency: f64,
    /// Weight of the static reasoning capability
    pub reasoning: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            failure: 0.5,
            latency: 0.3,
            reasoning: 0.2,
        }
    }
}

// ============================================================================
// Router Configuration
// ============================================================================

/// Complete router configuration
#[derive(Clone, Debug, PartialEq)]
pub struct RouterConfig {
    /// Deadline for each generate call (primary and fallback alike)
    pub request_timeout: Duration,

    /// Deadline for the local fallback reachability probe
    pub probe_timeout: Duration,

    /// Circuit breaker thresholds
    pub circuit: CircuitBreakerConfig,

    /// Smoothing factor of the latency average, in (0, 1]
    pub ewma_alpha: f64,

    /// Scoring weights
    pub weights: ScoreWeights,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            circuit: CircuitBreakerConfig::default(),
            ewma_alpha: 0.2,
            weights: ScoreWeights::default(),
        }
    }
}
