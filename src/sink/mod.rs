//! File sink subsystem.
//!
//! # Data Flow
//! ```text
//! Stream::log / raw sink writes
//!     → rotating.rs (lock, size check, append)
//!
//! Scheduler firing / size threshold
//!     → rotating.rs (flush, rename to backup, reopen)
//!     → retention.rs (evict by count and age, gzip)
//! ```
//!
//! # Design Decisions
//! - One mutex per sink serializes writes and rotations
//! - A record is written with a single call, so it lands whole in one file
//! - Failed rotations keep the previous handle open
//! - Retention runs after the write lock is released, one pass at a time

pub mod retention;
pub mod rotating;

pub use retention::Backup;
pub use rotating::{RawSink, RotatingFileSink, SinkStats};

use crate::config::LoggerConfig;

const MEGABYTE: u64 = 1024 * 1024;
const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// Rotation and retention rules for one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Bytes after which a write rotates first.
    pub max_size: u64,
    /// Days to keep backups (0 = forever).
    pub max_age_days: u64,
    /// Backups to keep (0 = all).
    pub max_backups: usize,
    /// Name backups in local time.
    pub local_time: bool,
    /// Gzip backups.
    pub compress: bool,
}

impl From<&LoggerConfig> for RotationPolicy {
    fn from(config: &LoggerConfig) -> Self {
        let megabytes = if config.max_size == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            config.max_size
        };
        Self {
            max_size: megabytes.saturating_mul(MEGABYTE),
            max_age_days: config.max_age,
            max_backups: config.max_backups,
            local_time: config.local_time,
            compress: config.compress,
        }
    }
}
