//! Circuit Breaker
//!
//! Decides whether a provider is currently unavailable, based on the timer
//! kept in its [`MetricsRegistry`] entry.
//!
//! ```text
//! +--------+   3rd failure within 60s   +------+
//! | Closed | -------------------------> | Open |
//! +--------+                            +------+
//!     ^                                     |
//!     |   cooldown elapsed, seen on query   |
//!     +-------------------------------------+
//! ```
//!
//! There is no half-open state and no background timer: an elapsed circuit
//! is cleared by whichever caller observes it first. The breaker is advisory;
//! the router may still call an open provider when nothing better exists.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::metrics::MetricsRegistry;
use crate::provider::ProviderId;

// ============================================================================
// Circuit State
// ============================================================================

/// Observable state of a provider's circuit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow normally
    #[default]
    Closed,

    /// Provider is skipped until the cooldown elapses
    Open {
        /// Time left before the circuit closes
        #[serde(rename = "remaining_ms", serialize_with = "serialize_millis")]
        remaining: Duration,
    },
}

impl CircuitState {
    /// Whether the circuit is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ============================================================================
// Circuit Timer
// ============================================================================

/// The open-until instant of one provider, guarded by its entry lock
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CircuitTimer {
    open_until: Option<Instant>,
}

impl CircuitTimer {
    /// Current state at `now`, clearing an elapsed timer.
    ///
    /// Returns the state and whether this call performed the clear.
    pub(crate) fn observe(&mut self, now: Instant) -> (CircuitState, bool) {
        match self.open_until {
            Some(until) if now < until => (
                CircuitState::Open {
                    remaining: until - now,
                },
                false,
            ),
            Some(_) => {
                self.open_until = None;
                (CircuitState::Closed, true)
            }
            None => (CircuitState::Closed, false),
        }
    }

    /// Open (or re-open) the circuit until `now + cooldown`
    pub(crate) fn trip(&mut self, now: Instant, cooldown: Duration) {
        self.open_until = Some(now + cooldown);
    }
}

// ============================================================================
// Circuit Breaker
// ============================================================================

/// Read-side view of the registry's circuit timers
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    registry: Arc<MetricsRegistry>,
}

impl CircuitBreaker {
    /// Create a breaker over `registry`
    #[must_use]
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    /// Whether `provider` is currently unavailable
    #[must_use]
    pub fn is_open(&self, provider: ProviderId) -> bool {
        self.is_open_at(provider, Instant::now())
    }

    /// [`is_open`](Self::is_open) evaluated at `now`
    #[must_use]
    pub fn is_open_at(&self, provider: ProviderId, now: Instant) -> bool {
        self.state_at(provider, now).is_open()
    }

    /// Current state of `provider`'s circuit
    #[must_use]
    pub fn state(&self, provider: ProviderId) -> CircuitState {
        self.state_at(provider, Instant::now())
    }

    /// [`state`](Self::state) evaluated at `now`
    #[must_use]
    pub fn state_at(&self, provider: ProviderId, now: Instant) -> CircuitState {
        self.registry.entry(provider).circuit_state_at(now)
    }

    /// Providers whose circuit is open right now, in stable order
    #[must_use]
    pub fn open_providers(&self) -> Vec<ProviderId> {
        let now = Instant::now();
        ProviderId::ALL
            .into_iter()
            .filter(|p| self.is_open_at(*p, now))
            .collect()
    }
}
