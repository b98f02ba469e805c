//! Property path resolution.
//!
//! A lookup is resolved in three steps:
//! 1. Derive an environment key (`logging.name` -> `LOGGING_NAME`) and, when the
//!    environment has a non-empty value for it, return that value coerced to the
//!    shape of the snapshot value at the same path.
//! 2. Otherwise traverse the snapshot segment by segment.
//! 3. Fall back to the caller's default, or fail when no default was supplied.
//!
//! Resolution is stateless: everything it needs is passed in.

use super::env::Environment;
use super::snapshot::Snapshot;
use crate::error::{ConfigError, ConfigResult};
use serde_json::{Number, Value};
use tracing::{debug, warn};

/// A single lookup request.
#[derive(Debug, Clone)]
pub struct Lookup<'a> {
    /// Separated property path, e.g. `server.port`.
    pub path: &'a str,
    /// Segment delimiter for `path`.
    pub separator: &'a str,
    /// `None` means "no default supplied"; `Some(Value::Null)` is a supplied null.
    pub default: Option<Value>,
}

impl<'a> Lookup<'a> {
    pub fn new(path: &'a str, separator: &'a str) -> Self {
        Self {
            path,
            separator,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Option<Value>) -> Self {
        self.default = default;
        self
    }
}

/// Type of the snapshot value an environment override is coerced against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Number,
    /// Per-element shapes of an ordered sequence.
    Sequence(Vec<ElementShape>),
    /// Strings, booleans, mappings, or nothing at all: the raw string is used.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementShape {
    Number,
    Text,
}

impl Shape {
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(_)) => Shape::Number,
            Some(Value::Array(items)) => Shape::Sequence(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Number(_) => ElementShape::Number,
                        _ => ElementShape::Text,
                    })
                    .collect(),
            ),
            _ => Shape::Text,
        }
    }
}

/// Environment key for a property path: separators become `_`, then upper-case.
pub fn env_key(path: &str, separator: &str) -> String {
    path.replace(separator, "_").to_uppercase()
}

/// Prefix `path` with a region namespace.
pub fn region_path(region: &str, path: &str, separator: &str) -> String {
    format!("{region}{separator}{path}")
}

/// Coerce an environment string to the given shape.
///
/// Booleans are not a coercion target; `"true"` stays a string.
pub fn coerce(raw: String, shape: &Shape) -> Value {
    match shape {
        Shape::Number => match parse_number(&raw) {
            Some(n) => Value::Number(n),
            None => {
                warn!(value = %raw, "Environment override is not numeric; using it as a string");
                Value::String(raw)
            }
        },
        Shape::Sequence(elements) => {
            let trimmed = raw.trim();
            let Some(inner) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            else {
                return Value::String(raw);
            };
            if inner.trim().is_empty() {
                return Value::Array(Vec::new());
            }
            let items = inner
                .split(',')
                .map(str::trim)
                .enumerate()
                .map(|(i, item)| match elements.get(i) {
                    Some(ElementShape::Number) => parse_number(item)
                        .map(Value::Number)
                        .unwrap_or_else(|| Value::String(item.to_string())),
                    _ => Value::String(item.to_string()),
                })
                .collect();
            Value::Array(items)
        }
        Shape::Text => Value::String(raw),
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Number::from(u));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Resolve a lookup against a snapshot and an environment.
pub fn resolve(
    snapshot: &Snapshot,
    env: &dyn Environment,
    lookup: Lookup<'_>,
) -> ConfigResult<Value> {
    if lookup.path.is_empty() {
        return Err(ConfigError::invalid_argument(
            "path",
            "property path must be a non-empty string",
        ));
    }
    if lookup.separator.is_empty() {
        return Err(ConfigError::invalid_argument(
            "separator",
            "separator must be a non-empty string",
        ));
    }

    let found = snapshot.lookup(lookup.path.split(lookup.separator));

    let key = env_key(lookup.path, lookup.separator);
    if let Some(raw) = env.non_empty(&key) {
        debug!(path = lookup.path, key = %key, "Using environment override");
        return Ok(coerce(raw, &Shape::of(found)));
    }

    match (found, lookup.default) {
        (Some(value), _) if !value.is_null() => Ok(value.clone()),
        (_, Some(default)) => Ok(default),
        (_, None) => Err(ConfigError::missing_property(lookup.path)),
    }
}
