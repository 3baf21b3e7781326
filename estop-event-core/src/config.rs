//! Engine configuration types
//!
//! Plain serde structs with defaults, so the application layer can embed them in
//! its own TOML file and tests can build them with the builder methods.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the daily event store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the `events_<date>.json` files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Hard cap on entries per daily file
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Daily files older than this many days are pruned (None = keep forever)
    #[serde(default)]
    pub retention_days: Option<u32>,

    /// Whether snapshot events carry the full name→value map
    #[serde(default = "default_true")]
    pub snapshot_values: bool,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("event_logs")
}

fn default_max_events() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            max_events: default_max_events(),
            retention_days: None,
            snapshot_values: true,
        }
    }
}

impl StoreConfig {
    /// Create a store configuration rooted at `log_dir`
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    /// Builder method: set the per-file cap
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    /// Builder method: set the retention window
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = Some(days);
        self
    }

    /// Builder method: include or omit per-signal values in snapshots
    pub fn with_snapshot_values(mut self, enabled: bool) -> Self {
        self.snapshot_values = enabled;
        self
    }
}

/// Configuration for the critical-signal edge monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Name of the monitored boolean signal
    #[serde(default = "default_signal")]
    pub signal: String,

    /// Sampling interval in milliseconds
    #[serde(default = "default_polling_interval")]
    pub polling_interval_ms: u64,

    /// Delay before the single re-sample that confirms an edge
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Whether OFF→ON edges raise a trigger at all
    #[serde(default = "default_true")]
    pub edge_detection: bool,

    /// Capacity of the in-memory event history
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_signal() -> String {
    "emergency_stop".to_string()
}

fn default_polling_interval() -> u64 {
    500
}

fn default_debounce() -> u64 {
    100
}

fn default_max_history() -> usize {
    100
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            signal: default_signal(),
            polling_interval_ms: default_polling_interval(),
            debounce_ms: default_debounce(),
            edge_detection: true,
            max_history: default_max_history(),
        }
    }
}

impl MonitorConfig {
    /// Create a monitor configuration for `signal`
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            ..Self::default()
        }
    }

    /// Builder method: set the sampling interval
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Builder method: set the debounce delay
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis() as u64;
        self
    }

    /// Builder method: enable or disable edge detection
    pub fn with_edge_detection(mut self, enabled: bool) -> Self {
        self.edge_detection = enabled;
        self
    }

    /// Builder method: set the history capacity
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn debounce_time(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// How long `stop` waits for the loop thread before giving up on it
    pub fn stop_timeout(&self) -> Duration {
        self.polling_interval() * 2
    }
}

/// Reconnect policy for the long-lived controller connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Wait after the first failed connect attempt
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling backoff
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    30_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl ReconnectConfig {
    /// Builder method: set both backoff bounds
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff_ms = initial.as_millis() as u64;
        self.max_backoff_ms = max.as_millis() as u64;
        self
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}
