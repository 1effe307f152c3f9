//! Kubecast Core - resource change broadcasting
//!
//! This crate turns a single stream of resource change events into any number
//! of independent per-subscriber streams:
//! - Envelope: the immutable event value (kind, operation, payload)
//! - Broadcaster: the fan-out engine and its subscriber registry
//! - Subscription: the per-consumer delivery channel and cancel signal
//! - Intake: the producer-facing publisher handle
//! - Notifier: adapter turning watcher callbacks into envelopes
//! - Error: error taxonomy for engine operations
//!
//! ## Usage
//!
//! ```ignore
//! use kubecast_core::{intake, Broadcaster, Envelope};
//! use serde_json::json;
//!
//! let (publisher, rx) = intake::channel(16);
//! let broadcaster = Broadcaster::new(rx);
//!
//! let mut subscription = broadcaster.subscribe()?;
//! publisher.created("Namespace", json!({"metadata": {"name": "ci"}})).await?;
//!
//! while let Some(envelope) = subscription.next().await {
//!     println!("{} {}", envelope.operation(), envelope.kind());
//! }
//! ```
//!
//! Dropping every [`intake::Publisher`] closes the intake: the broadcaster
//! expires, cancels every subscription and refuses new ones.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcaster;
pub mod envelope;
pub mod error;
pub mod intake;
pub mod notifier;

pub use broadcaster::{
    Broadcaster, BroadcasterConfig, CancelSignal, Subscription, SubscriptionId,
};
pub use envelope::{Envelope, Operation};
pub use error::{Error, Result};
pub use intake::Publisher;
pub use notifier::ResourceNotifier;
