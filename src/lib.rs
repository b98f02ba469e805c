//! liveconf: a live-reloading, read-only configuration accessor.
//!
//! ```no_run
//! use liveconf::ConfigStore;
//!
//! let config = ConfigStore::open("config/app_##.yaml", None)?;
//! let port = config.get_or("server.port", 8080)?;
//! let welcome = config.get_by_region("welcome")?;
//! println!("{welcome} (port {port})");
//! # Ok::<(), liveconf::ConfigError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod format;

pub use config::{ConfigStore, Snapshot, StoreBuilder};
pub use error::{ConfigError, ConfigResult, ErrorCode};
