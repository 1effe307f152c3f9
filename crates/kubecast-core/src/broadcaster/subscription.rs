use crate::envelope::Envelope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Stable identity of a subscription inside one broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw id. Ids minted by a broadcaster start at 1.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of a subscription's cancel signal.
///
/// Fires once, either on unsubscribe or when the broadcaster expires, and
/// stays fired. Holders can wait on it but never trigger it.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Resolves once the subscription is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Whether the signal has fired
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle returned by [`Broadcaster::subscribe`](super::Broadcaster::subscribe).
///
/// Pairs the delivery channel (only the broadcaster writes to it) with the
/// cancel signal. The handle is valid until it is unsubscribed or the
/// broadcaster expires. A consumer must keep draining it or unsubscribe
/// promptly, since the broadcaster hands envelopes over one subscriber at a
/// time.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    delivery: mpsc::Receiver<Envelope>,
    cancel: CancelSignal,
    revoked: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        delivery: mpsc::Receiver<Envelope>,
        cancel: CancellationToken,
        revoked: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            delivery,
            cancel: CancelSignal::new(cancel),
            revoked,
        }
    }

    /// Identity used to unsubscribe
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Raw delivery endpoint.
    ///
    /// Does not observe cancellation; after an unsubscribe it may still yield
    /// an envelope that was already handed over. Prefer [`Self::next`].
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.delivery.recv().await
    }

    /// Next envelope, or `None` once the subscription is over.
    ///
    /// After expiry, envelopes already handed over are still yielded before
    /// `None`. After an unsubscribe nothing more is yielded.
    pub async fn next(&mut self) -> Option<Envelope> {
        if self.is_revoked() {
            return None;
        }
        let envelope = tokio::select! {
            biased;
            envelope = self.delivery.recv() => envelope,
            () = self.cancel.cancelled() => None,
        };
        envelope.filter(|_| !self.is_revoked())
    }

    /// Resolves once the subscription is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Whether the cancel signal has fired
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cloneable view of the cancel signal, for tasks that do not own the
    /// delivery endpoint.
    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }
}
