//! Snapshot - one decoded point-in-time metrics reading.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A decoded record emitted by the producer.
///
/// The snapshot maps metric group names (`cpu`, `memory`, `processes`, ...)
/// to arbitrary nested values. Contents are not validated beyond being a
/// well-formed object.
///
/// Snapshots are immutable. Cloning is cheap and every clone is an
/// independent logical copy, so one can be handed to each subscriber.
///
/// # Example
///
/// ```rust
/// use monitorcore::Snapshot;
///
/// let snapshot = Snapshot::decode(r#"{"cpu":{"usage":50}}"#).unwrap();
/// assert_eq!(snapshot.get("cpu").unwrap()["usage"], 50);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Arc<Map<String, Value>>);

impl Snapshot {
    /// Decode a snapshot from JSON text.
    ///
    /// Fails unless the text is a single JSON object.
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Map<String, Value>>(text).map(Self::from)
    }

    /// Look up a metric group.
    pub fn get(&self, group: &str) -> Option<&Value> {
        self.0.get(group)
    }

    /// Names of the metric groups in this snapshot.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of metric groups.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the snapshot has no metric groups.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Copy the snapshot into a generic JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.as_ref().clone())
    }
}

impl From<Map<String, Value>> for Snapshot {
    fn from(map: Map<String, Value>) -> Self {
        Snapshot(Arc::new(map))
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_object() {
        let snapshot = Snapshot::decode(r#"{"cpu":{"usage":50},"processes":[]}"#).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("cpu"), Some(&json!({"usage": 50})));
        assert_eq!(snapshot.groups().collect::<Vec<_>>(), vec!["cpu", "processes"]);
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(Snapshot::decode("[1,2,3]").is_err());
        assert!(Snapshot::decode("42").is_err());
        assert!(Snapshot::decode("{\"a\":").is_err());
    }

    #[test]
    fn test_empty_object() {
        let snapshot = Snapshot::decode("{}").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.to_value(), json!({}));
    }

    #[test]
    fn test_serializes_verbatim() {
        let text = r#"{"gpu":{"name":"Test GPU","usage":12.5}}"#;
        let snapshot = Snapshot::decode(text).unwrap();
        let out = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(out, serde_json::from_str::<Value>(text).unwrap());

        let back: Snapshot = serde_json::from_value(out).unwrap();
        assert_eq!(back, snapshot);
    }
}
