//! Error types for kubecast-core
//!
//! Engine-level errors are returned synchronously to whoever called
//! subscribe/unsubscribe or published onto the intake.

use crate::broadcaster::SubscriptionId;
use thiserror::Error;

/// Broadcast engine error type
#[derive(Debug, Error)]
pub enum Error {
    /// The intake closed and the engine shut down permanently
    #[error("broadcaster expired")]
    EngineExpired,

    /// Handle is not registered (already unsubscribed, or foreign)
    #[error("subscription not found: {0}")]
    NotSubscribed(SubscriptionId),

    /// The engine no longer drains the intake
    #[error("intake closed")]
    IntakeClosed,

    /// Envelope could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Get error code for logs and protocol messages
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EngineExpired => "engine_expired",
            Self::NotSubscribed(_) => "not_subscribed",
            Self::IntakeClosed => "intake_closed",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// None of the engine errors go away by retrying the same call.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;
