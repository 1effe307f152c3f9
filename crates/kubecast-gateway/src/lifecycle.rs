//! Per-connection state machine.
//!
//! `Connecting → Upgraded → Active → Closing → Closed`. States only move
//! forward, so whichever task starts teardown first wins and later attempts
//! are no-ops.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Upgrade requested
    Connecting = 0,
    /// Socket upgraded, not yet bound to a subscription
    Upgraded = 1,
    /// Subscribed and heartbeating
    Active = 2,
    /// Teardown started
    Closing = 3,
    /// Close frame sent and socket released
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Upgraded,
            2 => Self::Active,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Upgraded => "upgraded",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared, forward-only connection state.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Starts in [`ConnectionState::Connecting`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if it is ahead of the current state.
    ///
    /// Returns `true` only for the caller that performed the transition.
    pub fn advance(&self, next: ConnectionState) -> bool {
        let next = next as u8;
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < next).then_some(next)
            })
            .is_ok()
    }

    /// Whether teardown has started
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.state() >= ConnectionState::Closing
    }
}
