//! Opaque upstream payload blob.
//!
//! [`Payload`] wraps the raw JSON an upstream source returned for a record.
//! The store never inspects it; only the explicitly typed fields next to it
//! (hash, height, timestamp, address) are validated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unvalidated upstream JSON kept alongside a typed record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(serde_json::Value);

impl Payload {
    /// An empty (`null`) payload.
    #[must_use]
    pub const fn empty() -> Self {
        Self(serde_json::Value::Null)
    }

    /// Wraps a raw JSON value.
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns `true` if no upstream data is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    /// Borrows the inner JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        assert!(Payload::default().is_empty());
        assert!(!Payload::new(serde_json::json!({"a": 1})).is_empty());
    }

    #[test]
    fn serializes_transparently() {
        let payload = Payload::new(serde_json::json!({"type": "order"}));
        let json = serde_json::to_string(&payload).unwrap_or_default();
        assert_eq!(json, r#"{"type":"order"}"#);
    }
}
