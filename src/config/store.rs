//! The live configuration store.
//!
//! Owns the current [`Snapshot`] behind an `ArcSwap`, so readers always see
//! one complete tree while reloads install a fresh one. Reloads on the same
//! store are serialized by a per-store lock.

use super::env::{Environment, ProcessEnv};
use super::loader::{ConfigPaths, DEFAULT_PLACEHOLDER_VAR, load_layers, resolve_template};
use super::resolver::{self, Lookup, region_path};
use super::snapshot::Snapshot;
use super::watcher::{ConfigWatcherHandle, WatchPaths, WatcherConfig, start_config_watcher};
use crate::error::{ConfigError, ConfigResult, ErrorCode};
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Separator used when neither the call nor the store specifies one.
pub const DEFAULT_SEPARATOR: &str = ".";

/// Region used when none is given explicitly or found in the file.
pub const DEFAULT_REGION: &str = "en";

/// Builder for [`ConfigStore`].
pub struct StoreBuilder {
    template: String,
    region: Option<String>,
    fallback_region: Option<String>,
    placeholder_var: String,
    separator: String,
    env: Arc<dyn Environment>,
    watch: Option<WatcherConfig>,
}

impl StoreBuilder {
    fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            region: None,
            fallback_region: Some(DEFAULT_REGION.to_string()),
            placeholder_var: DEFAULT_PLACEHOLDER_VAR.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            env: Arc::new(ProcessEnv),
            watch: Some(WatcherConfig::default()),
        }
    }

    /// Explicit region; takes precedence over a `region` field in the file.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Region used when neither an explicit nor a file region exists.
    /// `None` leaves the store without a region in that case.
    pub fn fallback_region(mut self, region: Option<&str>) -> Self {
        self.fallback_region = region.map(str::to_string);
        self
    }

    /// Environment variable substituted for `##` in the path template.
    pub fn placeholder_var(mut self, name: impl Into<String>) -> Self {
        self.placeholder_var = name.into();
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Source for placeholder substitution and lookup overrides.
    pub fn environment(mut self, env: impl Environment + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn watch(mut self, config: WatcherConfig) -> Self {
        self.watch = Some(config);
        self
    }

    /// Load once and never reload on file changes.
    pub fn no_watch(mut self) -> Self {
        self.watch = None;
        self
    }

    /// Resolve the path, load the files and start watching.
    pub fn build(self) -> ConfigResult<Arc<ConfigStore>> {
        if let Some(ref region) = self.region
            && region.is_empty()
        {
            return Err(ConfigError::invalid_argument(
                "region",
                "region must be a non-empty string",
            ));
        }
        if self.separator.is_empty() {
            return Err(ConfigError::invalid_argument(
                "separator",
                "separator must be a non-empty string",
            ));
        }

        let path = resolve_template(&self.template, self.env.as_ref(), &self.placeholder_var)?;
        if !path.is_file() {
            return Err(ConfigError::file_not_found(&path));
        }
        // Symlinks stay unresolved so a swapped link is picked up on reload and
        // the defaults file is looked up next to the path as named.
        let target =
            std::path::absolute(&path).map_err(|_| ConfigError::file_not_found(&path))?;
        let paths = ConfigPaths::for_target(target);

        let (generation_tx, _) = watch::channel(0);
        let store = Arc::new(ConfigStore {
            paths,
            explicit_region: self.region,
            fallback_region: self.fallback_region,
            env: self.env,
            separator: ArcSwap::from_pointee(self.separator),
            state: ArcSwap::from_pointee(Snapshot::empty()),
            reload_lock: Mutex::new(()),
            generation_tx,
            watcher: Mutex::new(None),
        });

        // Watch before the first load so an edit in between is not lost.
        if let Some(config) = self.watch {
            let handle = store.start_watching(config)?;
            *store.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }

        store.reload();
        info!(
            path = %store.paths.target.display(),
            region = ?store.region(),
            "Configuration store opened"
        );
        Ok(store)
    }
}

/// Read-only access to a live, file-backed configuration.
pub struct ConfigStore {
    paths: ConfigPaths,
    explicit_region: Option<String>,
    fallback_region: Option<String>,
    env: Arc<dyn Environment>,
    separator: ArcSwap<String>,
    state: ArcSwap<Snapshot>,
    reload_lock: Mutex<()>,
    generation_tx: watch::Sender<u64>,
    watcher: Mutex<Option<ConfigWatcherHandle>>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("paths", &self.paths)
            .field("region", &self.region())
            .field("separator", &self.separator())
            .field("generation", &self.state.load().generation())
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    pub fn builder(template: impl Into<String>) -> StoreBuilder {
        StoreBuilder::new(template)
    }

    /// Open a watched store with default settings.
    pub fn open(template: &str, region: Option<&str>) -> ConfigResult<Arc<Self>> {
        let builder = Self::builder(template);
        match region {
            Some(region) => builder.region(region).build(),
            None => builder.build(),
        }
    }

    fn start_watching(
        self: &Arc<Self>,
        config: WatcherConfig,
    ) -> ConfigResult<ConfigWatcherHandle> {
        let paths = WatchPaths {
            target: self.paths.target.clone(),
            defaults: self.paths.defaults.clone(),
        };
        let store = Arc::downgrade(self);
        start_config_watcher(paths, config, move |event| {
            let Some(store) = store.upgrade() else {
                return false;
            };
            if event.requires_reload() {
                info!("Config change detected: {:?}", event);
                store.reload();
            }
            true
        })
        .map_err(|e| ConfigError::watch(&self.paths.target, e))
    }

    /// Re-read the defaults and target files and install the merged result.
    ///
    /// Never fails: unreadable or malformed files contribute an empty mapping.
    pub fn reload(&self) -> Arc<Snapshot> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let merged = load_layers(&self.paths);
        let generation = self.state.load().generation() + 1;
        let snapshot = Arc::new(Snapshot::new(merged, generation));
        self.state.store(Arc::clone(&snapshot));
        self.generation_tx.send_replace(generation);

        debug!(
            path = %self.paths.target.display(),
            generation,
            region = ?self.region_for(&snapshot),
            "Configuration loaded"
        );
        snapshot
    }

    /// The snapshot currently in effect.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.load_full()
    }

    /// Receiver of the generation number of every installed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    pub fn path(&self) -> &Path {
        &self.paths.target
    }

    pub fn defaults_path(&self) -> Option<&Path> {
        self.paths.defaults.as_deref()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The effective region: explicit, then the file's `region`, then the fallback.
    pub fn region(&self) -> Option<String> {
        self.region_for(&self.state.load())
    }

    fn region_for(&self, snapshot: &Snapshot) -> Option<String> {
        self.explicit_region
            .as_deref()
            .or_else(|| snapshot.region())
            .or(self.fallback_region.as_deref())
            .map(str::to_string)
    }

    pub fn separator(&self) -> String {
        String::clone(&self.separator.load())
    }

    /// Change the separator used by lookups that do not pass their own.
    ///
    /// Returns `false` and keeps the current separator for empty input.
    pub fn set_separator(&self, separator: &str) -> bool {
        if separator.is_empty() {
            warn!("Ignoring empty separator; keeping '{}'", self.separator());
            return false;
        }
        self.separator.store(Arc::new(separator.to_string()));
        true
    }

    fn effective_separator(&self, separator: Option<&str>) -> String {
        match separator {
            Some(sep) if !sep.is_empty() => sep.to_string(),
            _ => self.separator(),
        }
    }

    /// Value at `path`; fails with `MissingRequiredProperty` when absent.
    pub fn get(&self, path: &str) -> ConfigResult<Value> {
        self.get_with(path, None, None)
    }

    /// Value at `path`, or `default` when absent.
    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> ConfigResult<Value> {
        self.get_with(path, Some(default.into()), None)
    }

    /// Full form of [`ConfigStore::get`]. An empty `separator` means "use the store's".
    pub fn get_with(
        &self,
        path: &str,
        default: Option<Value>,
        separator: Option<&str>,
    ) -> ConfigResult<Value> {
        let snapshot = self.state.load();
        let separator = self.effective_separator(separator);
        resolver::resolve(
            &snapshot,
            self.env.as_ref(),
            Lookup::new(path, &separator).with_default(default),
        )
    }

    /// Value at `path`, deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<T> {
        let value = self.get(path)?;
        serde_json::from_value(value).map_err(|e| {
            ConfigError::new(
                ErrorCode::TypeMismatch,
                format!("Property '{}' has an unexpected type: {}", path, e),
            )
            .with_field(path)
        })
    }

    /// Value at `<region><separator><path>`.
    pub fn get_by_region(&self, path: &str) -> ConfigResult<Value> {
        self.get_by_region_with(path, None, None)
    }

    pub fn get_by_region_or(&self, path: &str, default: impl Into<Value>) -> ConfigResult<Value> {
        self.get_by_region_with(path, Some(default.into()), None)
    }

    /// Full form of [`ConfigStore::get_by_region`].
    ///
    /// Without any region the default is returned, or `MissingRequiredProperty`
    /// when none was supplied.
    pub fn get_by_region_with(
        &self,
        path: &str,
        default: Option<Value>,
        separator: Option<&str>,
    ) -> ConfigResult<Value> {
        if path.is_empty() {
            return Err(ConfigError::invalid_argument(
                "path",
                "property path must be a non-empty string",
            ));
        }

        // One load for both the region and the lookup.
        let snapshot = self.state.load();
        let Some(region) = self.region_for(&snapshot) else {
            return default.ok_or_else(|| ConfigError::missing_property(path));
        };

        let separator = self.effective_separator(separator);
        let full_path = region_path(&region, path, &separator);
        resolver::resolve(
            &snapshot,
            self.env.as_ref(),
            Lookup::new(&full_path, &separator).with_default(default),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::MapEnv;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_with(temp: &TempDir, content: &str) -> Arc<ConfigStore> {
        let path = temp.path().join("config.json");
        std::fs::write(&path, content).unwrap();
        ConfigStore::builder(path.to_str().unwrap())
            .environment(MapEnv::new())
            .no_watch()
            .build()
            .unwrap()
    }

    #[test]
    fn test_initial_load_is_generation_one() {
        let temp = TempDir::new().unwrap();
        let store = store_with(&temp, r#"{"a": 1}"#);
        assert_eq!(store.snapshot().generation(), 1);
        assert!(!store.is_watching());
    }

    #[test]
    fn test_reload_bumps_generation_and_notifies() {
        let temp = TempDir::new().unwrap();
        let store = store_with(&temp, r#"{"a": 1}"#);
        let rx = store.subscribe();
        assert_eq!(*rx.borrow(), 1);

        std::fs::write(store.path(), r#"{"a": 2}"#).unwrap();
        let snapshot = store.reload();
        assert_eq!(snapshot.generation(), 2);
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(store.get("a").unwrap(), json!(2));
    }

    #[test]
    fn test_old_snapshot_unaffected_by_reload() {
        let temp = TempDir::new().unwrap();
        let store = store_with(&temp, r#"{"a": 1}"#);
        let before = store.snapshot();

        std::fs::write(store.path(), r#"{"a": 2}"#).unwrap();
        store.reload();

        assert_eq!(before.root(), &json!({"a": 1}));
        assert_eq!(store.snapshot().root(), &json!({"a": 2}));
    }

    #[test]
    fn test_set_separator() {
        let temp = TempDir::new().unwrap();
        let store = store_with(&temp, r#"{"server": {"port": 4201}}"#);

        assert!(!store.set_separator(""));
        assert_eq!(store.separator(), ".");
        assert!(store.set_separator("/"));
        assert_eq!(store.get("server/port").unwrap(), json!(4201));
        assert_eq!(
            store.get_with("server.port", None, Some(".")).unwrap(),
            json!(4201)
        );
        assert_eq!(
            store.get_with("server/port", None, Some("")).unwrap(),
            json!(4201)
        );
    }

    #[test]
    fn test_region_precedence() {
        let temp = TempDir::new().unwrap();
        let store = store_with(&temp, r#"{"region": "es"}"#);
        assert_eq!(store.region().as_deref(), Some("es"));

        let explicit = ConfigStore::builder(store.path().to_str().unwrap())
            .region("de")
            .no_watch()
            .build()
            .unwrap();
        assert_eq!(explicit.region().as_deref(), Some("de"));

        std::fs::write(store.path(), "{}").unwrap();
        store.reload();
        assert_eq!(store.region().as_deref(), Some(DEFAULT_REGION));
    }

    #[test]
    fn test_get_as() {
        let temp = TempDir::new().unwrap();
        let store = store_with(&temp, r#"{"server": {"port": 4201, "host": "localhost"}}"#);
        let port: u16 = store.get_as("server.port").unwrap();
        assert_eq!(port, 4201);

        let err = store.get_as::<u16>("server.host").unwrap_err();
        assert!(err.is(ErrorCode::TypeMismatch));
    }

    #[test]
    fn test_empty_region_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        let err = ConfigStore::builder(path.to_str().unwrap())
            .region("")
            .no_watch()
            .build()
            .unwrap_err();
        assert!(err.is(ErrorCode::InvalidArgument));
    }
}
