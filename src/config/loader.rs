//! Path resolution and best-effort loading of the target and defaults files.
//!
//! Loads the defaults file (if any) and the target file, then merges them
//! field-by-field with the target on top.

use super::env::Environment;
use super::merge::deep_merge;
use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Token in a path template replaced by the environment name.
pub const PLACEHOLDER: &str = "##";

/// Default environment variable consulted for [`PLACEHOLDER`].
///
/// Use [`crate::StoreBuilder::placeholder_var`] to read `NODE_ENV` instead.
pub const DEFAULT_PLACEHOLDER_VAR: &str = "APP_ENV";

/// Base name of the sibling defaults file.
pub const DEFAULTS_STEM: &str = "defaults";

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    /// Unknown extension: JSON is tried first, then YAML.
    Guess,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => FileFormat::Json,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => FileFormat::Guess,
        }
    }

    fn parse(self, content: &str) -> Result<Value, String> {
        match self {
            FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            FileFormat::Guess => serde_json::from_str(content).or_else(|json_err| {
                serde_yaml::from_str(content)
                    .map_err(|yaml_err| format!("not JSON ({json_err}) nor YAML ({yaml_err})"))
            }),
        }
    }
}

/// Resolved locations of the files backing a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// The target configuration file.
    pub target: PathBuf,
    /// Sibling `defaults.<ext>` file, whether or not it exists yet.
    pub defaults: Option<PathBuf>,
}

impl ConfigPaths {
    /// Derive the defaults location for a target file.
    pub fn for_target(target: PathBuf) -> Self {
        let defaults = defaults_path_for(&target);
        Self { target, defaults }
    }
}

/// Compute `defaults.<ext>` next to `target`.
///
/// Returns `None` when the target itself is the defaults file.
pub fn defaults_path_for(target: &Path) -> Option<PathBuf> {
    let file_name = match target.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{DEFAULTS_STEM}.{ext}"),
        None => DEFAULTS_STEM.to_string(),
    };
    let defaults = target.with_file_name(file_name);
    (defaults != target).then_some(defaults)
}

/// Resolve a path template into a concrete path.
///
/// The first `##` is replaced with the value of `placeholder_var` when that
/// variable is set to a non-empty string; otherwise the template is kept
/// verbatim. A leading `~/` expands to the home directory.
pub fn resolve_template(
    template: &str,
    env: &dyn Environment,
    placeholder_var: &str,
) -> ConfigResult<PathBuf> {
    if template.trim().is_empty() {
        return Err(ConfigError::invalid_argument(
            "path",
            "configuration path must be a non-empty string",
        ));
    }

    let mut resolved = template.to_string();
    if let Some(idx) = resolved.find(PLACEHOLDER)
        && let Some(value) = env.non_empty(placeholder_var)
    {
        resolved.replace_range(idx..idx + PLACEHOLDER.len(), &value);
        debug!(template, resolved = %resolved, "Substituted path placeholder");
    }

    if let Some(rest) = resolved.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return Ok(home.join(rest));
    }

    Ok(PathBuf::from(resolved))
}

/// Read and parse one file into a mapping.
pub fn load_file(path: &Path) -> ConfigResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::file_not_found(path)
        } else {
            ConfigError::parse(path, e)
        }
    })?;

    let value = FileFormat::from_path(path)
        .parse(&content)
        .map_err(|e| ConfigError::parse(path, e))?;

    match value {
        Value::Object(_) => Ok(value),
        // An empty YAML document parses to null.
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(ConfigError::parse(
            path,
            format!("top level must be a mapping, found {}", type_name(&other)),
        )),
    }
}

/// Load both layers and merge them, downgrading every failure to an empty mapping.
pub fn load_layers(paths: &ConfigPaths) -> Value {
    let defaults = match paths.defaults.as_deref() {
        Some(path) if path.exists() => load_or_empty(path, "defaults"),
        _ => Value::Object(Map::new()),
    };
    let target = load_or_empty(&paths.target, "target");
    deep_merge(defaults, target)
}

fn load_or_empty(path: &Path, layer: &str) -> Value {
    match load_file(path) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), layer, "Using empty mapping: {}", e);
            Value::Object(Map::new())
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::MapEnv;
    use crate::error::ErrorCode;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_placeholder_substituted() {
        let env = MapEnv::new().with("APP_ENV", "PRODUCTION");
        let path = resolve_template("cfg_##.json", &env, DEFAULT_PLACEHOLDER_VAR).unwrap();
        assert_eq!(path, PathBuf::from("cfg_PRODUCTION.json"));
    }

    #[test]
    fn test_placeholder_kept_without_env() {
        let env = MapEnv::new().with("APP_ENV", "");
        let path = resolve_template("cfg_##.json", &env, DEFAULT_PLACEHOLDER_VAR).unwrap();
        assert_eq!(path, PathBuf::from("cfg_##.json"));
    }

    #[test]
    fn test_only_first_placeholder_replaced() {
        let env = MapEnv::new().with("STAGE", "dev");
        let path = resolve_template("##/cfg_##.yaml", &env, "STAGE").unwrap();
        assert_eq!(path, PathBuf::from("dev/cfg_##.yaml"));
    }

    #[test]
    fn test_empty_template_rejected() {
        let err = resolve_template("", &MapEnv::new(), DEFAULT_PLACEHOLDER_VAR).unwrap_err();
        assert!(err.is(ErrorCode::InvalidArgument));
    }

    #[test]
    fn test_defaults_path() {
        assert_eq!(
            defaults_path_for(Path::new("/etc/app/config.yaml")),
            Some(PathBuf::from("/etc/app/defaults.yaml"))
        );
        assert_eq!(
            defaults_path_for(Path::new("/etc/app/settings")),
            Some(PathBuf::from("/etc/app/defaults"))
        );
        assert_eq!(defaults_path_for(Path::new("/etc/app/defaults.json")), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("a.JSON")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a.yml")), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a.conf")), FileFormat::Guess);
    }

    #[test]
    fn test_load_yaml_and_guess() {
        let temp = TempDir::new().unwrap();
        let yaml = temp.path().join("app.yaml");
        std::fs::write(&yaml, "server:\n  port: 4201\n").unwrap();
        assert_eq!(load_file(&yaml).unwrap(), json!({"server": {"port": 4201}}));

        let conf = temp.path().join("app.conf");
        std::fs::write(&conf, "name: mush\n").unwrap();
        assert_eq!(load_file(&conf).unwrap(), json!({"name": "mush"}));
    }

    #[test]
    fn test_load_rejects_non_mapping() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("list.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(err.is(ErrorCode::ParseFailure));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.is(ErrorCode::FileNotFound));
    }

    #[test]
    fn test_load_layers_tolerates_bad_files() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("config.json");
        std::fs::write(temp.path().join("defaults.json"), "{ not json").unwrap();
        std::fs::write(&target, r#"{"a": 1}"#).unwrap();

        let paths = ConfigPaths::for_target(target.clone());
        assert_eq!(load_layers(&paths), json!({"a": 1}));

        std::fs::write(temp.path().join("defaults.json"), r#"{"b": 2}"#).unwrap();
        std::fs::write(&target, "{ broken").unwrap();
        assert_eq!(load_layers(&paths), json!({"b": 2}));
    }
}
