//! Provider Errors
//!
//! Classified failures surfaced by provider clients. The router treats every
//! variant the same way (one failure event, then fallback); the
//! classification matters to the single internal retry and to callers that
//! need to tell client faults from unavailability.

use thiserror::Error;

use super::id::ProviderId;

/// Longest error body excerpt carried in an error message
const MAX_BODY_EXCERPT: usize = 500;

/// Caller-facing category of a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request or its credentials were at fault
    ClientFault,
    /// The backend could not serve the request
    ServiceUnavailable,
}

/// A provider failure. [`ProviderError::is_transient`] variants may be retried once.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Missing or rejected credential
    #[error("{provider}: authentication failed: {message}")]
    Auth {
        /// Provider that failed
        provider: ProviderId,
        /// Details
        message: String,
    },

    /// Malformed request (bad model name, invalid parameters)
    #[error("{provider}: request rejected: {message}")]
    RequestInvalid {
        /// Provider that failed
        provider: ProviderId,
        /// Details
        message: String,
    },

    /// Rate limited or momentarily unavailable
    #[error("{provider}: temporarily unavailable (HTTP {status}): {message}")]
    Transient {
        /// Provider that failed
        provider: ProviderId,
        /// HTTP status returned
        status: u16,
        /// Details
        message: String,
    },

    /// Network-level failure
    #[error("{provider}: unreachable: {message}")]
    Unreachable {
        /// Provider that failed
        provider: ProviderId,
        /// Details
        message: String,
    },

    /// No answer within the time budget
    #[error("{provider}: timed out: {message}")]
    Timeout {
        /// Provider that failed
        provider: ProviderId,
        /// Details
        message: String,
    },

    /// Any other non-success HTTP status
    #[error("{provider}: API error {status}: {message}")]
    Upstream {
        /// Provider that failed
        provider: ProviderId,
        /// HTTP status returned
        status: u16,
        /// Details
        message: String,
    },

    /// The backend answered with something we could not decode
    #[error("{provider}: invalid response: {message}")]
    InvalidResponse {
        /// Provider that failed
        provider: ProviderId,
        /// Details
        message: String,
    },
}

impl ProviderError {
    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(provider: ProviderId, status: u16, body: &str) -> Self {
        let message = excerpt(body);
        match status {
            400 | 404 | 422 => Self::RequestInvalid { provider, message },
            401 | 403 => Self::Auth { provider, message },
            429 | 502 | 503 => Self::Transient {
                provider,
                status,
                message,
            },
            _ => Self::Upstream {
                provider,
                status,
                message,
            },
        }
    }

    /// Classify a transport error from the HTTP client
    #[must_use]
    pub fn from_transport(provider: ProviderId, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider,
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                provider,
                message: err.to_string(),
            }
        } else {
            Self::Unreachable {
                provider,
                message: err.to_string(),
            }
        }
    }

    /// Credential absent from configuration
    #[must_use]
    pub fn missing_key(provider: ProviderId, env_var: &str) -> Self {
        Self::Auth {
            provider,
            message: format!("{env_var} is not set"),
        }
    }

    /// Provider that produced this error
    #[must_use]
    pub fn provider(&self) -> ProviderId {
        match self {
            Self::Auth { provider, .. }
            | Self::RequestInvalid { provider, .. }
            | Self::Transient { provider, .. }
            | Self::Unreachable { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::InvalidResponse { provider, .. } => *provider,
        }
    }

    /// Whether one more attempt after a short backoff is allowed.
    /// Covers rate limiting, gateway errors and refused connections.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Unreachable { .. })
    }

    /// Caller-facing category
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Auth { .. } | Self::RequestInvalid { .. } => ErrorClass::ClientFault,
            _ => ErrorClass::ServiceUnavailable,
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}
