//! Layering of the defaults file underneath the target file.
//!
//! Mappings merge key by key, recursively. Sequences and scalars from the
//! target replace the defaults wholesale.

use serde_json::Value;

/// Deep merge `target` over `defaults`, with `target` winning on every conflict.
///
/// - Mappings are merged recursively: keys in `target` override keys in `defaults`
/// - Sequences, strings, numbers and booleans are replaced entirely
/// - A `null` in `target` leaves the defaults value in place (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use liveconf::config::deep_merge;
///
/// let defaults = json!({ "a": { "x": 1, "y": 2 }, "tags": ["a", "b"] });
/// let target = json!({ "a": { "y": 3 }, "tags": ["c"] });
///
/// assert_eq!(
///     deep_merge(defaults, target),
///     json!({ "a": { "x": 1, "y": 3 }, "tags": ["c"] })
/// );
/// ```
pub fn deep_merge(defaults: Value, target: Value) -> Value {
    match (defaults, target) {
        (Value::Object(mut merged), Value::Object(overrides)) => {
            for (key, value) in overrides {
                let value = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (defaults, Value::Null) => defaults,
        (_, target) => target,
    }
}
