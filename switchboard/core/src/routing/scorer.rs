//! Adaptive Scorer
//!
//! Ranks healthy providers by combining reliability, latency and static
//! reasoning capability:
//!
//! ```text
//! score = (1 - failure_rate) * 0.5
//!       + 1 / (avg_latency_ms + 1) * 0.3
//!       + reasoning_weight * 0.2
//! ```

use std::sync::Arc;

use super::catalog::ProviderCatalog;
use super::config::ScoreWeights;
use super::metrics::MetricsRegistry;
use crate::provider::ProviderId;

/// Raw inputs to [`score`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreInputs {
    /// Failures over total requests, 0 when none
    pub failure_rate: f64,
    /// Latency average in milliseconds, 0 before the first success
    pub avg_latency_ms: f64,
    /// Static capability weight from the catalog
    pub reasoning_weight: f64,
}

/// The three weighted terms of a score
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreComponents {
    /// Reliability term
    pub failure: f64,
    /// Latency term
    pub latency: f64,
    /// Capability term
    pub reasoning: f64,
}

impl ScoreComponents {
    /// Sum of the terms
    #[must_use]
    pub fn total(&self) -> f64 {
        self.failure + self.latency + self.reasoning
    }
}

/// Weighted terms for `inputs`
#[must_use]
pub fn score_components(inputs: &ScoreInputs, weights: &ScoreWeights) -> ScoreComponents {
    ScoreComponents {
        failure: (1.0 - inputs.failure_rate) * weights.failure,
        latency: (1.0 / (inputs.avg_latency_ms + 1.0)) * weights.latency,
        reasoning: inputs.reasoning_weight * weights.reasoning,
    }
}

/// Composite ranking value; higher is better
#[must_use]
pub fn score(inputs: &ScoreInputs, weights: &ScoreWeights) -> f64 {
    score_components(inputs, weights).total()
}

/// Highest-scoring candidate. Ties keep the earlier candidate.
pub fn select_best_by<F>(candidates: &[ProviderId], mut score_of: F) -> Option<(ProviderId, f64)>
where
    F: FnMut(ProviderId) -> f64,
{
    let mut best: Option<(ProviderId, f64)> = None;
    for &candidate in candidates {
        let score = score_of(candidate);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate, score)),
        }
    }
    best
}

/// Scores providers from live registry state
#[derive(Clone, Debug)]
pub struct Scorer {
    registry: Arc<MetricsRegistry>,
    catalog: Arc<ProviderCatalog>,
    weights: ScoreWeights,
}

impl Scorer {
    /// Create a scorer
    #[must_use]
    pub fn new(
        registry: Arc<MetricsRegistry>,
        catalog: Arc<ProviderCatalog>,
        weights: ScoreWeights,
    ) -> Self {
        Self {
            registry,
            catalog,
            weights,
        }
    }

    /// Current inputs for `provider`
    #[must_use]
    pub fn inputs(&self, provider: ProviderId) -> ScoreInputs {
        self.registry
            .entry(provider)
            .score_inputs(self.catalog.reasoning_weight(provider))
    }

    /// Current score of `provider`
    #[must_use]
    pub fn score(&self, provider: ProviderId) -> f64 {
        let inputs = self.inputs(provider);
        let components = score_components(&inputs, &self.weights);
        tracing::trace!(
            provider = %provider,
            failure = components.failure,
            latency = components.latency,
            reasoning = components.reasoning,
            "Scored provider"
        );
        components.total()
    }

    /// Best of `candidates` by current score
    #[must_use]
    pub fn select_best(&self, candidates: &[ProviderId]) -> Option<(ProviderId, f64)> {
        select_best_by(candidates, |p| self.score(p))
    }
}
