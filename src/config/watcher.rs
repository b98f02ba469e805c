//! File watcher for the configuration files backing a store.
//!
//! Watches the directory containing the target file (non-recursively, so
//! editors that replace the file on save are still seen) and forwards
//! changes to the target and defaults files to a callback.
//!
//! Events travel over a channel to one dedicated thread, so the callback
//! never runs concurrently with itself. Uses debouncing to coalesce rapid
//! file changes.

use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind, Debouncer, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

/// Event types emitted when configuration files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeEvent {
    /// The target configuration file changed
    Target(PathBuf),
    /// The sibling defaults file changed
    Defaults(PathBuf),
    /// Both files changed in quick succession
    BatchChange(Vec<PathBuf>),
    /// Watcher encountered an error
    Error(String),
}

impl ConfigChangeEvent {
    /// Returns true if this event requires a config reload.
    pub fn requires_reload(&self) -> bool {
        !matches!(self, ConfigChangeEvent::Error(_))
    }

    /// Get the affected paths for this event.
    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            ConfigChangeEvent::Target(p) | ConfigChangeEvent::Defaults(p) => vec![p.as_path()],
            ConfigChangeEvent::BatchChange(paths) => paths.iter().map(|p| p.as_path()).collect(),
            ConfigChangeEvent::Error(_) => vec![],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
    /// Whether edits to the defaults file also trigger a reload.
    pub watch_defaults: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(100),
            watch_defaults: true,
        }
    }
}

/// Files to watch.
#[derive(Debug, Clone)]
pub struct WatchPaths {
    pub target: PathBuf,
    pub defaults: Option<PathBuf>,
}

/// Handle to a running watcher. Dropping it stops watching.
pub struct ConfigWatcherHandle {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    _thread: JoinHandle<()>,
}

impl std::fmt::Debug for ConfigWatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcherHandle").finish_non_exhaustive()
    }
}

/// Starts the configuration file watcher.
///
/// `on_change` is invoked on the watcher thread for every classified event,
/// errors included. Returning `false` stops the thread.
///
/// # Example
/// ```ignore
/// let paths = WatchPaths { target: PathBuf::from("config.yaml"), defaults: None };
/// let handle = start_config_watcher(paths, WatcherConfig::default(), |event| {
///     if event.requires_reload() {
///         println!("Config changed: {:?}", event);
///     }
///     true
/// })?;
/// ```
pub fn start_config_watcher<F>(
    paths: WatchPaths,
    config: WatcherConfig,
    on_change: F,
) -> Result<ConfigWatcherHandle, notify::Error>
where
    F: FnMut(ConfigChangeEvent) -> bool + Send + 'static,
{
    let (notify_tx, notify_rx) = mpsc::channel();
    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;

    let dir = watch_dir(&paths.target);
    debouncer
        .watcher()
        .watch(&dir, RecursiveMode::NonRecursive)?;
    info!(
        "Watching {} for changes to {}",
        dir.display(),
        paths.target.display()
    );

    let thread = std::thread::Builder::new()
        .name("liveconf-reload".to_string())
        .spawn(move || process_notify_events(notify_rx, &paths, &config, on_change))
        .map_err(|e| notify::Error::generic(&e.to_string()))?;

    Ok(ConfigWatcherHandle {
        _debouncer: debouncer,
        _thread: thread,
    })
}

fn watch_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Process events from the notify debouncer until the channel closes or the
/// callback asks to stop.
fn process_notify_events<F>(
    rx: mpsc::Receiver<DebounceEventResult>,
    paths: &WatchPaths,
    config: &WatcherConfig,
    mut on_change: F,
) where
    F: FnMut(ConfigChangeEvent) -> bool,
{
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed = events
                    .into_iter()
                    .filter(|e| {
                        matches!(
                            e.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        )
                    })
                    .map(|e| e.path);
                if let Some(event) = classify_events(changed, paths, config) {
                    debug!("Config change detected: {:?}", event);
                    if !on_change(event) {
                        info!("Config store dropped, stopping watcher");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                if !on_change(ConfigChangeEvent::Error(e.to_string())) {
                    return;
                }
            }
            Err(_) => {
                info!("Config watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Fold a batch of changed paths into at most one event.
fn classify_events(
    changed: impl IntoIterator<Item = PathBuf>,
    paths: &WatchPaths,
    config: &WatcherConfig,
) -> Option<ConfigChangeEvent> {
    let mut events: Vec<ConfigChangeEvent> = Vec::new();
    for path in changed {
        if let Some(event) = classify_path(&path, paths, config)
            && !events.contains(&event)
        {
            events.push(event);
        }
    }

    match events.len() {
        0 => None,
        1 => events.pop(),
        _ => Some(ConfigChangeEvent::BatchChange(
            events
                .iter()
                .flat_map(|e| e.affected_paths())
                .map(Path::to_path_buf)
                .collect(),
        )),
    }
}

/// Classify a single path into a ConfigChangeEvent.
///
/// Only the watched directory is observed, so file names are enough.
fn classify_path(
    path: &Path,
    paths: &WatchPaths,
    config: &WatcherConfig,
) -> Option<ConfigChangeEvent> {
    let file_name = path.file_name()?;

    if paths.target.file_name() == Some(file_name) {
        return Some(ConfigChangeEvent::Target(path.to_path_buf()));
    }

    if config.watch_defaults
        && let Some(ref defaults) = paths.defaults
        && defaults.file_name() == Some(file_name)
    {
        return Some(ConfigChangeEvent::Defaults(path.to_path_buf()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> WatchPaths {
        WatchPaths {
            target: PathBuf::from("/etc/app/config.yaml"),
            defaults: Some(PathBuf::from("/etc/app/defaults.yaml")),
        }
    }

    #[test]
    fn test_classify_target() {
        let result = classify_path(
            Path::new("/etc/app/config.yaml"),
            &paths(),
            &WatcherConfig::default(),
        );
        assert!(matches!(result, Some(ConfigChangeEvent::Target(_))));
    }

    #[test]
    fn test_classify_defaults() {
        let result = classify_path(
            Path::new("/etc/app/defaults.yaml"),
            &paths(),
            &WatcherConfig::default(),
        );
        assert!(matches!(result, Some(ConfigChangeEvent::Defaults(_))));

        let config = WatcherConfig {
            watch_defaults: false,
            ..WatcherConfig::default()
        };
        let result = classify_path(Path::new("/etc/app/defaults.yaml"), &paths(), &config);
        assert!(result.is_none());
    }

    #[test]
    fn test_classify_unrelated_file() {
        let result = classify_path(
            Path::new("/etc/app/config.yaml.swp"),
            &paths(),
            &WatcherConfig::default(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_duplicate_events_collapse() {
        let changed = vec![
            PathBuf::from("/etc/app/config.yaml"),
            PathBuf::from("/etc/app/config.yaml"),
        ];
        let event = classify_events(changed, &paths(), &WatcherConfig::default());
        assert_eq!(
            event,
            Some(ConfigChangeEvent::Target(PathBuf::from("/etc/app/config.yaml")))
        );
    }

    #[test]
    fn test_batch_change() {
        let changed = vec![
            PathBuf::from("/etc/app/defaults.yaml"),
            PathBuf::from("/etc/app/config.yaml"),
            PathBuf::from("/etc/app/other.txt"),
        ];
        let event = classify_events(changed, &paths(), &WatcherConfig::default()).unwrap();
        assert!(matches!(event, ConfigChangeEvent::BatchChange(ref p) if p.len() == 2));
        assert!(event.requires_reload());
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(ConfigChangeEvent::Target(PathBuf::new()).requires_reload());
        assert!(ConfigChangeEvent::Defaults(PathBuf::new()).requires_reload());
        assert!(!ConfigChangeEvent::Error("test".to_string()).requires_reload());
    }

    #[test]
    fn test_watch_dir_of_bare_file_name() {
        assert_eq!(watch_dir(Path::new("config.json")), PathBuf::from("."));
        assert_eq!(watch_dir(Path::new("/a/b.json")), PathBuf::from("/a"));
    }
}
