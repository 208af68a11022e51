//! Error types for booking-client.

use thiserror::Error;

use crate::http::RefreshFailure;

/// Main error type for booking-client operations.
#[derive(Error, Debug)]
pub enum BookingClientError {
    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Backend answered with a non-success status other than a recoverable 401.
    #[error("api error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    /// Backend still rejects the credentials after recovery, or rejected a
    /// public request such as login.
    #[error("unauthorized: {}", .detail.as_deref().unwrap_or("authentication required"))]
    Unauthorized { detail: Option<String> },

    /// The access token could not be renewed; the session is gone.
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshFailure),

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Credential storage could not be read or written.
    #[error("token storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller input rejected before any request was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Base URL or request path could not be turned into a URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Invalid session state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::SessionStatus,
        to: crate::session::SessionStatus,
    },

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl BookingClientError {
    /// Message suitable for showing to the user.
    ///
    /// Prefers the backend's `detail` text and falls back to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api {
                detail: Some(detail),
                ..
            }
            | Self::Unauthorized {
                detail: Some(detail),
            } => detail.clone(),
            Self::InvalidInput(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }

    /// True when the failure means the session can no longer be used.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::RefreshFailed(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(401),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Convenience Result type for booking-client operations.
pub type Result<T> = std::result::Result<T, BookingClientError>;
