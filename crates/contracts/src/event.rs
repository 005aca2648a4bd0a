//! Event - the opaque record relayed from the webhook source to a destination.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Destination used when an event carries no routing tag
pub const DEFAULT_DESTINATION: &str = "DEFAULT";

/// One webhook notification.
///
/// Key order is preserved so the payload leaves the relay exactly as it
/// arrived. The relay only reads the fields below; everything else is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    /// Wrap an already-decoded JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Convert a JSON value, returning it back if it is not an object
    pub fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }

    /// Event type (`event` field), e.g. "open" or "delivered"
    pub fn event_type(&self) -> Option<&str> {
        self.0.get("event").and_then(Value::as_str)
    }

    /// Recipient address (`email` field)
    pub fn recipient(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    /// Routing tag at `unique_args.deployment`.
    ///
    /// A non-string tag is treated as absent.
    pub fn destination_tag(&self) -> Option<&str> {
        self.0
            .get("unique_args")
            .and_then(|args| args.get("deployment"))
            .and_then(Value::as_str)
    }

    /// Destination name this event routes to, falling back to [`DEFAULT_DESTINATION`]
    pub fn destination_or_default(&self) -> &str {
        self.destination_tag().unwrap_or(DEFAULT_DESTINATION)
    }

    /// Raw field access
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
