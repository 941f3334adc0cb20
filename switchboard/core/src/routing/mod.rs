//! Adaptive Provider Routing
//!
//! Health-aware dispatch of generation requests across interchangeable
//! providers, with a per-provider circuit breaker and a one-step fallback to
//! the local provider.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  AdaptiveRouter  |  <-- Entry point for all generation requests
//! +--------+---------+
//!          |
//!    +-----+---------------+
//!    |                     |
//!    v                     v
//! +----------------+  +---------+
//! | CircuitBreaker |  | Scorer  |  <-- Which providers are usable, which is best
//! +-------+--------+  +----+----+
//!         |                |
//!         v                v
//! +-----------------+  +-----------------+
//! | MetricsRegistry |  | ProviderCatalog |  <-- Live health / static capability
//! +-----------------+  +-----------------+
//! ```
//!
//! # Design Principles
//!
//! 1. **Reactive health**: only windowed statistics, no forecasting
//! 2. **Always attempt something**: an open circuit never leaves a request without a provider
//! 3. **Bounded fallback**: at most one extra call per request
//! 4. **No timers**: expired circuits are cleared by the next observer

pub mod catalog;
pub mod circuit;
pub mod config;
pub mod metrics;
pub mod router;
pub mod scorer;

#[cfg(test)]
pub mod test_utils;

pub use catalog::{
    ProviderCatalog, ProviderProfile, ReasoningTier, SpeedTier, DEFAULT_REASONING_WEIGHT,
};
pub use circuit::{CircuitBreaker, CircuitState};
pub use config::{CircuitBreakerConfig, RouterConfig, ScoreWeights};
pub use metrics::{MetricsRegistry, ProviderHealth, ProviderSnapshot};
pub use router::{
    AdaptiveRouter, Availability, OverallStatus, ProviderStatus, RouteRequest, RouteResponse,
    RouterError, RoutingDecision, RoutingReason, StatusReport,
};
pub use scorer::{score, score_components, select_best_by, ScoreComponents, ScoreInputs, Scorer};
