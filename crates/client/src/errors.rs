//! Error taxonomy for the console API layer.
//!
//! Every failure a caller can observe is one of these variants. The enum is
//! `Clone` on purpose: a single refresh failure has to fan out to every
//! request queued behind the refresh, and each of them receives its own copy.

use thiserror::Error;

use fluxgate_common::RetryDecision;

/// Failures surfaced by the API client and the push channel.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, TLS,
    /// timeout, connection reset).
    #[error("network error: {0}")]
    Network(String),

    /// 401 after the one allowed refresh-and-replay cycle.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 403.
    #[error("access denied: {0}")]
    Forbidden(String),

    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// 429.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any 5xx.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status.
    #[error("request failed ({status}): {message}")]
    Client { status: u16, message: String },

    /// The token refresh itself failed; the session is over.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    /// The response arrived but its body did not parse as the expected type.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The client was built with unusable settings (bad base URL etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Build the variant for a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Client { status, message },
        }
    }

    /// The HTTP status this error carries, if it came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::Network(_) | Self::RefreshFailed(_) | Self::Decode(_) | Self::Config(_) => None,
        }
    }
}

/// Retry classification for API failures.
///
/// Statuses in `[400, 500)` other than 429 are deterministic rejections and
/// never retried; everything else (network failures, 429, 5xx) is worth
/// another attempt.
#[must_use]
pub fn http_retry_policy(error: &ApiError, _attempt: u32) -> RetryDecision {
    match error.status() {
        Some(status) if (400..500).contains(&status) && status != 429 => RetryDecision::Stop,
        _ => RetryDecision::Retry,
    }
}
