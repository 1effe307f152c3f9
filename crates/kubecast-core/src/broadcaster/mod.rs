//! Broadcaster - fan-out of a single intake stream to many subscribers.
//!
//! One task drains the intake and hands every envelope to each registered
//! subscription in turn. A subscription that is being cancelled never blocks
//! the hand-off: delivery races against the subscription's cancel signal.

/// Fan-out engine and subscriber registry.
pub mod engine;
/// Per-consumer subscription handle.
pub mod subscription;

pub use engine::{Broadcaster, BroadcasterConfig};
pub use subscription::{CancelSignal, Subscription, SubscriptionId};
