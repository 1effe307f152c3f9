use super::subscription::{Subscription, SubscriptionId};
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Broadcaster tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcasterConfig {
    /// Capacity of each subscriber's delivery channel.
    ///
    /// 1 gives each subscriber a one-slot buffer: fan-out runs at most one
    /// envelope ahead of a subscriber that stops reading, then holds up the
    /// envelope for everyone after it. Larger values deepen the queue. Order
    /// per subscriber is the same either way.
    #[serde(default = "default_delivery_buffer")]
    pub delivery_buffer: usize,
}

fn default_delivery_buffer() -> usize {
    1
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            delivery_buffer: default_delivery_buffer(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    sender: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
    revoked: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Registry {
    expired: bool,
    subscribers: HashMap<SubscriptionId, Slot>,
}

/// Delivery target captured for one envelope, so the fan-out never holds the
/// registry lock while waiting on a subscriber.
struct Target {
    id: SubscriptionId,
    sender: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct Shared {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    expired_signal: CancellationToken,
    delivery_buffer: usize,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn targets(&self) -> Vec<Target> {
        self.registry()
            .subscribers
            .iter()
            .map(|(id, slot)| Target {
                id: *id,
                sender: slot.sender.clone(),
                cancel: slot.cancel.clone(),
            })
            .collect()
    }

    /// Drop a subscription whose receiving side is gone.
    fn prune(&self, id: SubscriptionId) {
        let mut registry = self.registry();
        if let Some(slot) = registry.subscribers.remove(&id) {
            slot.cancel.cancel();
            debug!(
                subscription_id = %id,
                pool_size = registry.subscribers.len(),
                "Pruned abandoned subscription"
            );
        }
    }

    fn expire(&self) {
        let mut registry = self.registry();
        registry.expired = true;
        self.expired_signal.cancel();
        let released = registry.subscribers.len();
        for (_, slot) in registry.subscribers.drain() {
            slot.cancel.cancel();
        }
        info!(released, "Intake closed, broadcaster expired");
    }
}

/// Fans a single intake stream out to every live subscription.
///
/// The broadcaster is the only reader of its intake. It expires permanently
/// once every sender of the intake has been dropped: all subscriptions are
/// cancelled and new ones are refused.
///
/// Cloning is cheap and every clone refers to the same engine.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    shared: Arc<Shared>,
}

impl Broadcaster {
    /// Start broadcasting from `intake` with default settings.
    ///
    /// Must be called within a tokio runtime. Envelopes received while there
    /// are no subscribers are discarded.
    #[must_use]
    pub fn new(intake: mpsc::Receiver<Envelope>) -> Self {
        Self::with_config(intake, BroadcasterConfig::default())
    }

    /// Start broadcasting from `intake`.
    #[must_use]
    pub fn with_config(intake: mpsc::Receiver<Envelope>, config: BroadcasterConfig) -> Self {
        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
            expired_signal: CancellationToken::new(),
            // mpsc channels cannot have zero capacity
            delivery_buffer: config.delivery_buffer.max(1),
        });
        tokio::spawn(fan_out(Arc::clone(&shared), intake));
        Self { shared }
    }

    /// Register a new subscription.
    pub fn subscribe(&self) -> Result<Subscription> {
        let mut registry = self.shared.registry();
        if registry.expired {
            return Err(Error::EngineExpired);
        }

        let id = SubscriptionId::from_raw(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, delivery) = mpsc::channel(self.shared.delivery_buffer);
        let cancel = CancellationToken::new();
        let revoked = Arc::new(AtomicBool::new(false));
        registry.subscribers.insert(
            id,
            Slot {
                sender,
                cancel: cancel.clone(),
                revoked: Arc::clone(&revoked),
            },
        );
        debug!(
            subscription_id = %id,
            pool_size = registry.subscribers.len(),
            "Subscribed"
        );

        Ok(Subscription::new(id, delivery, cancel, revoked))
    }

    /// Remove a subscription and fire its cancel signal.
    ///
    /// Fails with [`Error::NotSubscribed`] if `id` is not registered, which
    /// includes a second call for the same subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut registry = self.shared.registry();
        if registry.expired {
            return Err(Error::EngineExpired);
        }

        let slot = registry
            .subscribers
            .remove(&id)
            .ok_or(Error::NotSubscribed(id))?;
        slot.revoked.store(true, Ordering::Release);
        slot.cancel.cancel();
        debug!(
            subscription_id = %id,
            pool_size = registry.subscribers.len(),
            "Unsubscribed"
        );
        Ok(())
    }

    /// Number of registered subscriptions, 0 once expired.
    ///
    /// A point-in-time count: concurrent subscribe/unsubscribe calls may or
    /// may not be reflected.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        let registry = self.shared.registry();
        if registry.expired {
            0
        } else {
            registry.subscribers.len()
        }
    }

    /// Whether the intake has closed
    #[must_use]
    pub fn expired(&self) -> bool {
        self.shared.registry().expired
    }

    /// Resolves once the broadcaster has expired.
    pub async fn wait_expired(&self) {
        self.shared.expired_signal.cancelled().await;
    }
}

async fn fan_out(shared: Arc<Shared>, mut intake: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = intake.recv().await {
        let targets = shared.targets();
        if targets.is_empty() {
            trace!(kind = %envelope.kind(), "No subscribers, envelope discarded");
            continue;
        }
        for target in targets {
            deliver(&shared, target, &envelope).await;
        }
    }
    shared.expire();
}

async fn deliver(shared: &Shared, target: Target, envelope: &Envelope) {
    tokio::select! {
        biased;
        () = target.cancel.cancelled() => {
            trace!(subscription_id = %target.id, "Delivery abandoned, subscription cancelled");
        }
        sent = target.sender.send(envelope.clone()) => {
            if sent.is_err() {
                shared.prune(target.id);
            }
        }
    }
}
