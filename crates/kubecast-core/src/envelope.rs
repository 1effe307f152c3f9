//! Event envelope carried from producers to subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of change observed on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Resource was created
    Created,
    /// Resource was updated
    Updated,
    /// Resource was deleted
    Deleted,
}

impl Operation {
    /// Wire name of the operation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single resource change event.
///
/// Envelopes are immutable once built. Each subscriber receives its own clone,
/// so nothing downstream can observe another subscriber's copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    kind: String,
    operation: Operation,
    payload: Value,
}

impl Envelope {
    /// Create an envelope for `kind` (e.g. "Namespace", "Secret").
    #[must_use]
    pub fn new(kind: impl Into<String>, operation: Operation, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            operation,
            payload,
        }
    }

    /// Envelope for a created resource
    #[must_use]
    pub fn created(kind: impl Into<String>, payload: Value) -> Self {
        Self::new(kind, Operation::Created, payload)
    }

    /// Envelope for an updated resource
    #[must_use]
    pub fn updated(kind: impl Into<String>, payload: Value) -> Self {
        Self::new(kind, Operation::Updated, payload)
    }

    /// Envelope for a deleted resource
    #[must_use]
    pub fn deleted(kind: impl Into<String>, payload: Value) -> Self {
        Self::new(kind, Operation::Deleted, payload)
    }

    /// Resource type this event refers to
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Change observed on the resource
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Resource snapshot at the time of the event
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Encode as the JSON text sent to WebSocket clients.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let envelope = Envelope::created("Secret", json!({"metadata": {"name": "token"}}));
        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["kind"], "Secret");
        assert_eq!(value["operation"], "Created");
        assert_eq!(value["payload"]["metadata"]["name"], "token");
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Created.to_string(), "Created");
        assert_eq!(Operation::Updated.to_string(), "Updated");
        assert_eq!(
            serde_json::to_string(&Operation::Deleted).unwrap(),
            "\"Deleted\""
        );
    }

    #[test]
    fn test_parse_client_side() {
        let text = r#"{"kind":"Namespace","operation":"Deleted","payload":null}"#;
        let envelope: Envelope = serde_json::from_str(text).unwrap();
        assert_eq!(envelope, Envelope::deleted("Namespace", Value::Null));
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let text = r#"{"kind":"Namespace","operation":"Patched","payload":{}}"#;
        assert!(serde_json::from_str::<Envelope>(text).is_err());
    }
}
