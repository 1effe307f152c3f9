//! Error types for kubecast-gateway
//!
//! These never leave the connection they happened on: the gateway resolves
//! every one of them by tearing that connection down.

use thiserror::Error;

/// Connection-level error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Socket read or write failed
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Peer stopped answering heartbeats
    #[error("heartbeat timeout after {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// Envelope could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Broadcaster refused or lost the subscription
    #[error(transparent)]
    Broadcast(#[from] kubecast_core::Error),
}

impl GatewayError {
    /// Get error code for logs
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "websocket_error",
            Self::HeartbeatTimeout(_) => "heartbeat_timeout",
            Self::Serialization(_) => "serialization_error",
            Self::Broadcast(err) => err.code(),
        }
    }
}

impl From<axum::Error> for GatewayError {
    fn from(err: axum::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            GatewayError::HeartbeatTimeout(Duration::from_secs(2)).code(),
            "heartbeat_timeout"
        );
        assert_eq!(
            GatewayError::from(kubecast_core::Error::EngineExpired).code(),
            "engine_expired"
        );
    }

    #[test]
    fn test_broadcast_error_is_transparent() {
        let err = GatewayError::from(kubecast_core::Error::EngineExpired);
        assert_eq!(err.to_string(), "broadcaster expired");
    }
}
