//! Heartbeat cadence and deadlines

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of the per-connection liveness protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    /// Delay between connecting and the first ping
    pub ping_delay: Duration,
    /// Delay between a pong and the next ping
    pub ping_interval: Duration,
    /// How long to wait for a pong before giving up on the peer.
    ///
    /// Restarted on connect and on every pong. Must exceed both ping delays.
    pub read_deadline: Duration,
    /// Upper bound on sending the close frame during teardown
    pub close_timeout: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            ping_delay: Duration::from_secs(1),
            ping_interval: Duration::from_secs(1),
            read_deadline: Duration::from_secs(2),
            close_timeout: Duration::from_millis(100),
        }
    }
}

impl HeartbeatSettings {
    /// Settings from millisecond values (the config file format).
    #[must_use]
    pub fn from_millis(
        ping_delay_ms: u64,
        ping_interval_ms: u64,
        read_deadline_ms: u64,
        close_timeout_ms: u64,
    ) -> Self {
        Self {
            ping_delay: Duration::from_millis(ping_delay_ms),
            ping_interval: Duration::from_millis(ping_interval_ms),
            read_deadline: Duration::from_millis(read_deadline_ms),
            close_timeout: Duration::from_millis(close_timeout_ms),
        }
    }

    /// Whether a ping is always due before the read deadline passes.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.ping_delay < self.read_deadline && self.ping_interval < self.read_deadline
    }
}
