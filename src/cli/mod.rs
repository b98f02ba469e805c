//! CLI command definitions for liveconf
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;

/// Output format selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    /// Strings unquoted, other values as compact JSON (default)
    #[default]
    Plain,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Plain => OutputFormat::Plain,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

/// Read values from a live configuration file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (`##` is replaced with $APP_ENV by default)
    #[arg(short, long)]
    pub file: String,

    /// Region used by `region-get` (default: file's `region` field, then "en")
    #[arg(short, long, global = true)]
    pub region: Option<String>,

    /// Separator between path segments
    #[arg(short, long, default_value = ".", global = true)]
    pub separator: String,

    /// Environment variable substituted for `##` in the file path
    ///
    /// Node-style deployments can pass `NODE_ENV` here.
    #[arg(long, default_value = "APP_ENV", global = true)]
    pub placeholder_var: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value at a property path
    Get(LookupArgs),

    /// Print the value at a property path inside the active region
    RegionGet(LookupArgs),

    /// Print the whole merged configuration
    Dump(DumpArgs),

    /// Print the merged configuration again every time the file changes
    Watch(DumpArgs),
}

/// Arguments shared by `get` and `region-get`
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Property path, e.g. `server.port`
    pub path: String,

    /// Value returned when the property is absent (parsed as JSON, else a string)
    #[arg(short, long, value_name = "VALUE")]
    pub default: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = FormatArg::Plain)]
    pub format: FormatArg,
}

impl LookupArgs {
    /// The default as a value: JSON when it parses, otherwise the raw string.
    pub fn default_value(&self) -> Option<Value> {
        self.default.as_deref().map(|raw| {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        })
    }
}

/// Arguments for `dump` and `watch`
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    pub format: FormatArg,
}
