//! Configuration schema definitions.
//!
//! This module defines the configuration consumed by startup. All types
//! derive Serde traits so the demo binary can load them from TOML; the core
//! itself only ever sees an already-populated [`SystemConfig`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use crate::stream::Level;

/// Root configuration: the two structured streams and the escape file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Request-level events.
    pub access: LoggerConfig,

    /// Application events; also the ambient default stream.
    pub journal: LoggerConfig,

    /// Capture file for raw stdout/stderr output.
    pub escape: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            access: LoggerConfig::new("logs/access.log"),
            journal: LoggerConfig::new("logs/journal.log"),
            escape: PathBuf::from("logs/escape.log"),
        }
    }
}

/// Per-stream file and rotation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Path of the live log file.
    pub filename: PathBuf,

    /// Minimum severity written to the stream.
    pub level: Level,

    /// Rotation schedule (`@every 1h`, `every 6 hours`, `@midnight`, cron).
    pub rotate: String,

    /// Size in megabytes that triggers rotation on write (0 = 100 MB).
    #[serde(alias = "maxsize")]
    pub max_size: u64,

    /// Days to keep backups (0 = forever).
    #[serde(alias = "maxage")]
    pub max_age: u64,

    /// Number of backups to keep (0 = all).
    #[serde(alias = "maxbackups")]
    pub max_backups: usize,

    /// Name backups (and evaluate calendar schedules) in local time instead of UTC.
    #[serde(alias = "localtime")]
    pub local_time: bool,

    /// Gzip backups after rotation.
    pub compress: bool,
}

impl LoggerConfig {
    /// Default settings writing to `filename`.
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::new(),
            level: Level::Info,
            rotate: "@midnight".to_string(),
            max_size: 100,
            max_age: 0,
            max_backups: 0,
            local_time: false,
            compress: false,
        }
    }
}
