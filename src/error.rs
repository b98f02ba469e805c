//! Structured error types for configuration access.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Caller errors
    InvalidArgument,
    MissingRequiredProperty,
    TypeMismatch,

    // Filesystem errors
    FileNotFound,
    ParseFailure,
    WatchFailure,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidArgument => write!(f, "invalid argument"),
            ErrorCode::MissingRequiredProperty => write!(f, "missing required property"),
            ErrorCode::TypeMismatch => write!(f, "type mismatch"),
            ErrorCode::FileNotFound => write!(f, "file not found"),
            ErrorCode::ParseFailure => write!(f, "parse failure"),
            ErrorCode::WatchFailure => write!(f, "watch failure"),
        }
    }
}

/// Structured error returned by the store and the path resolver.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ConfigError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ConfigError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn invalid_argument(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, reason).with_field(field)
    }

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(
            ErrorCode::FileNotFound,
            format!("Configuration file not found: {}", path.display()),
        )
    }

    pub fn missing_property(property: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredProperty,
            format!("No value for required property '{}'", property),
        )
        .with_field(property)
    }

    pub fn parse(path: &Path, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ParseFailure,
            format!("Failed to parse {}: {}", path.display(), err),
        )
    }

    pub fn watch(path: &Path, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::WatchFailure,
            format!("Failed to watch {}: {}", path.display(), err),
        )
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_property_carries_field() {
        let err = ConfigError::missing_property("server.port");
        assert!(err.is(ErrorCode::MissingRequiredProperty));
        assert_eq!(err.field.as_deref(), Some("server.port"));
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let err = ConfigError::invalid_argument("separator", "separator must not be empty");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_ARGUMENT");
        assert_eq!(json["field"], "separator");
    }
}
