//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use audit_streams::{LoggerConfig, SystemConfig};
use tempfile::TempDir;

/// A configuration whose three files live under `dir/logs`.
pub fn temp_config(dir: &TempDir) -> SystemConfig {
    let logs = dir.path().join("logs");
    SystemConfig {
        access: LoggerConfig::new(logs.join("access.log")),
        journal: LoggerConfig::new(logs.join("journal.log")),
        escape: logs.join("escape.log"),
    }
}

/// Every file in `dir` whose name starts with `stem`, oldest backup first,
/// live file last.
pub fn log_files(dir: &Path, stem: &str) -> Vec<PathBuf> {
    let live = dir.join(format!("{stem}.log"));
    let mut backups: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p != &live)
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&format!("{stem}-")))
                })
                .collect()
        })
        .unwrap_or_default();
    // Backup names embed a sortable timestamp.
    backups.sort();
    if live.exists() {
        backups.push(live);
    }
    backups
}

/// All lines across `files`, in order.
pub fn read_lines(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .flat_map(|p| {
            fs::read_to_string(p)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}
