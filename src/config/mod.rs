//! Live, read-only configuration backed by a file.
//!
//! ## Layers
//! 1. **Defaults** - optional sibling `defaults.<ext>` next to the target file
//! 2. **Target** - the configuration file itself
//! 3. **Environment** - per-lookup overrides (`server.port` -> `SERVER_PORT`)
//!
//! ## Merge Strategy
//! - Mappings: deep merge key by key, target wins
//! - Sequences and scalars: replaced wholesale
//!
//! ## Reloading
//! Every change to the watched files re-runs the whole load and atomically
//! installs a new [`Snapshot`]. Bad edits degrade to an empty layer instead
//! of failing.
//!
//! ## Path Templates
//! - `##` is replaced with the value of `APP_ENV` at construction. The variable is
//!   configurable, e.g. `NODE_ENV` for files shared with Node services
//! - A leading `~/` expands to the home directory

pub mod env;
pub mod loader;
mod merge;
pub mod resolver;
mod snapshot;
mod store;
pub mod watcher;

pub use env::{Environment, MapEnv, ProcessEnv};
pub use loader::{ConfigPaths, FileFormat};
pub use merge::deep_merge;
pub use resolver::Lookup;
pub use snapshot::Snapshot;
pub use store::{ConfigStore, DEFAULT_REGION, DEFAULT_SEPARATOR, StoreBuilder};
pub use watcher::WatcherConfig;
