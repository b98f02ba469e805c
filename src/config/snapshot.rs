//! Immutable, fully merged configuration tree.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Name of the top-level field a snapshot may use to declare its region.
pub const REGION_FIELD: &str = "region";

/// The merged configuration in effect at one point in time.
///
/// A snapshot is built once per load and never changed afterwards; there is
/// no API handing out mutable access to the tree. Lookups hand back owned
/// copies, so callers can do whatever they like with what they receive.
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: Arc<Value>,
    generation: u64,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(root: Value, generation: u64) -> Self {
        Self {
            root: Arc::new(root),
            generation,
            loaded_at: Utc::now(),
        }
    }

    /// An empty mapping, used before anything has been loaded.
    pub fn empty() -> Self {
        Self::new(Value::Object(Default::default()), 0)
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Number of loads that produced this snapshot (1 for the initial load).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// The top-level `region` field, if it is a non-empty string.
    pub fn region(&self) -> Option<&str> {
        self.root
            .get(REGION_FIELD)
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
    }

    /// Walk the tree one segment at a time.
    ///
    /// Mappings are indexed by key and sequences by a decimal index. Returns
    /// `None` as soon as a segment is missing.
    pub fn lookup<'a, I>(&self, segments: I) -> Option<&Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current: &Value = &self.root;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl PartialEq for Snapshot {
    /// Snapshots compare by content only.
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Snapshot {
        Snapshot::new(
            json!({
                "region": "de",
                "server": {"port": 4201},
                "hosts": ["a", {"name": "b"}]
            }),
            1,
        )
    }

    #[test]
    fn test_lookup_nested() {
        let snap = sample();
        assert_eq!(snap.lookup(["server", "port"]), Some(&json!(4201)));
        assert_eq!(snap.lookup(["server"]), Some(&json!({"port": 4201})));
        assert_eq!(snap.lookup(["server", "host"]), None);
        assert_eq!(snap.lookup(["missing", "port"]), None);
    }

    #[test]
    fn test_lookup_through_sequences() {
        let snap = sample();
        assert_eq!(snap.lookup(["hosts", "0"]), Some(&json!("a")));
        assert_eq!(snap.lookup(["hosts", "1", "name"]), Some(&json!("b")));
        assert_eq!(snap.lookup(["hosts", "2"]), None);
        assert_eq!(snap.lookup(["hosts", "first"]), None);
    }

    #[test]
    fn test_lookup_into_scalar_is_absent() {
        let snap = sample();
        assert_eq!(snap.lookup(["server", "port", "x"]), None);
    }

    #[test]
    fn test_region_field() {
        assert_eq!(sample().region(), Some("de"));
        assert_eq!(Snapshot::empty().region(), None);
        assert_eq!(Snapshot::new(json!({"region": ""}), 1).region(), None);
    }

    #[test]
    fn test_loaded_at_is_stamped_on_creation() {
        let before = Utc::now();
        let snap = Snapshot::new(json!({}), 1);
        let after = Utc::now();
        assert!(snap.loaded_at() >= before);
        assert!(snap.loaded_at() <= after);
    }

    #[test]
    fn test_equality_ignores_generation() {
        let a = Snapshot::new(json!({"a": 1}), 1);
        let b = Snapshot::new(json!({"a": 1}), 2);
        assert_eq!(a, b);
    }
}
