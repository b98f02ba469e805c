//! Output formatting for resolved values and snapshots.

use anyhow::Result;
use serde_json::Value;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Strings unquoted, everything else as compact JSON.
    #[default]
    Plain,
    Json,
    Yaml,
}

/// Render a value in the given format, without a trailing newline.
pub fn render(value: &Value, format: OutputFormat) -> Result<String> {
    let out = match format {
        OutputFormat::Plain => match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other)?,
        },
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?.trim_end().to_string(),
    };
    Ok(out)
}
