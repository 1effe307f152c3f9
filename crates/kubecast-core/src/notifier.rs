//! Adapter from resource watcher callbacks to envelopes.
//!
//! A watcher reports add/update/delete callbacks for one resource kind. The
//! notifier turns them into envelopes on the intake, dropping updates that
//! carry no new resource version (periodic resyncs).

use crate::envelope::Envelope;
use crate::error::Result;
use crate::intake::Publisher;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Transforms a resource before it is published.
///
/// The flag is `false` for deletions, where the object may be a tombstone
/// rather than the full resource.
pub type PayloadFilter = Arc<dyn Fn(&Value, bool) -> Value + Send + Sync>;

/// Publishes change envelopes for one resource kind.
#[derive(Clone)]
pub struct ResourceNotifier {
    kind: String,
    publisher: Publisher,
    filter: Option<PayloadFilter>,
}

impl ResourceNotifier {
    /// Notifier publishing envelopes of `kind`
    #[must_use]
    pub fn new(kind: impl Into<String>, publisher: Publisher) -> Self {
        Self {
            kind: kind.into(),
            publisher,
            filter: None,
        }
    }

    /// Rewrite payloads before publishing (e.g. strip sensitive fields).
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Value, bool) -> Value + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Resource kind
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// A resource was observed for the first time.
    pub async fn on_add(&self, obj: &Value) -> Result<()> {
        debug!(kind = %self.kind, name = resource_name(obj), "Resource created");
        let payload = self.payload(obj, true);
        self.publisher
            .publish(Envelope::created(self.kind.clone(), payload))
            .await
    }

    /// A resource changed.
    ///
    /// Returns `false` without publishing when both snapshots carry the same
    /// `metadata.resourceVersion`.
    pub async fn on_update(&self, old: &Value, new: &Value) -> Result<bool> {
        if resource_version(old) == resource_version(new) {
            return Ok(false);
        }
        debug!(kind = %self.kind, name = resource_name(old), "Resource updated");
        let payload = self.payload(new, true);
        self.publisher
            .publish(Envelope::updated(self.kind.clone(), payload))
            .await?;
        Ok(true)
    }

    /// A resource was removed.
    pub async fn on_delete(&self, obj: &Value) -> Result<()> {
        debug!(kind = %self.kind, name = resource_name(obj), "Resource deleted");
        let payload = self.payload(obj, false);
        self.publisher
            .publish(Envelope::deleted(self.kind.clone(), payload))
            .await
    }

    fn payload(&self, obj: &Value, skip_deleted_check: bool) -> Value {
        match &self.filter {
            Some(filter) => filter(obj, skip_deleted_check),
            None => obj.clone(),
        }
    }
}

impl fmt::Debug for ResourceNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNotifier")
            .field("kind", &self.kind)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

/// Name from `metadata.name`, looking through a deletion tombstone's `obj`.
fn resource_name(obj: &Value) -> &str {
    obj.pointer("/metadata/name")
        .or_else(|| obj.pointer("/obj/metadata/name"))
        .and_then(Value::as_str)
        .unwrap_or("")
}

fn resource_version(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
}
