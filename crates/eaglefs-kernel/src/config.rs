//! Library configuration.
//!
//! ```
//! use eaglefs_kernel::{LibraryConfig, WatchConfig};
//!
//! let config = LibraryConfig::new("/data/Photos.library")
//!     .with_watch(WatchConfig::default().with_coalesce_ms(500));
//! assert!(config.watch.enabled);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default window for coalescing change events into one batch.
pub const DEFAULT_COALESCE_MS: u64 = 200;

/// Default poll interval for backends that poll instead of subscribing.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// How to open and follow one library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Library root (the directory holding `metadata.json` and `images/`).
    pub root: PathBuf,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl LibraryConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            watch: WatchConfig::default(),
        }
    }

    pub fn with_watch(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }
}

/// Change watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Follow changes to the library after opening it.
    pub enabled: bool,
    /// Collect events this long after the first one before reconciling.
    pub coalesce_ms: u64,
    /// Poll interval handed to the notification backend.
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            coalesce_ms: DEFAULT_COALESCE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WatchConfig {
    /// Watching turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_coalesce_ms(mut self, ms: u64) -> Self {
        self.coalesce_ms = ms;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
