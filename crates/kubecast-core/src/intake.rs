//! Producer side of the broadcaster.
//!
//! Watchers push envelopes through a [`Publisher`]; the broadcaster drains the
//! matching receiver. Dropping the last publisher is how a producer signals
//! permanent shutdown.

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use serde_json::Value;
use tokio::sync::mpsc;

/// Create an intake with room for `capacity` envelopes in flight.
///
/// The receiver goes to [`Broadcaster::new`](crate::Broadcaster::new).
#[must_use]
pub fn channel(capacity: usize) -> (Publisher, mpsc::Receiver<Envelope>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (Publisher { sender }, receiver)
}

/// Cloneable handle for pushing envelopes onto the intake.
#[derive(Debug, Clone)]
pub struct Publisher {
    sender: mpsc::Sender<Envelope>,
}

impl Publisher {
    /// Push an envelope, waiting for intake capacity.
    pub async fn publish(&self, envelope: Envelope) -> Result<()> {
        self.sender
            .send(envelope)
            .await
            .map_err(|_| Error::IntakeClosed)
    }

    /// Publish a `Created` envelope
    pub async fn created(&self, kind: impl Into<String>, payload: Value) -> Result<()> {
        self.publish(Envelope::created(kind, payload)).await
    }

    /// Publish an `Updated` envelope
    pub async fn updated(&self, kind: impl Into<String>, payload: Value) -> Result<()> {
        self.publish(Envelope::updated(kind, payload)).await
    }

    /// Publish a `Deleted` envelope
    pub async fn deleted(&self, kind: impl Into<String>, payload: Value) -> Result<()> {
        self.publish(Envelope::deleted(kind, payload)).await
    }

    /// Whether the receiving side is gone
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
