//! End-to-end startup through the global entry points.
//!
//! `startup` publishes process-wide state and redirects stdout/stderr, so
//! only one test in this binary may call it successfully. The harness's own
//! descriptors are saved first and put back before any assertion runs.

#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::os::unix::io::RawFd;
use std::sync::Mutex;

use audit_streams::lifecycle::StartupError;
use audit_streams::{access_logger, access_writer, journal_logger, startup, sync};
use nix::unistd::{dup, dup2};
use serde_json::json;
use tempfile::TempDir;

mod common;

/// Held while fd 1/2 point away from the harness, so no other test's
/// output is swallowed.
static CONSOLE: Mutex<()> = Mutex::new(());

struct SavedConsole {
    stdout: RawFd,
    stderr: RawFd,
}

impl SavedConsole {
    fn save() -> Self {
        Self {
            stdout: dup(1).unwrap(),
            stderr: dup(2).unwrap(),
        }
    }
}

impl Drop for SavedConsole {
    fn drop(&mut self) {
        let _ = std::io::stdout().flush();
        let _ = dup2(self.stdout, 1);
        let _ = dup2(self.stderr, 2);
        let _ = nix::unistd::close(self.stdout);
        let _ = nix::unistd::close(self.stderr);
    }
}

#[test]
fn test_startup_routes_every_channel_to_its_file() {
    let _console = CONSOLE.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let config = common::temp_config(&dir);

    let saved = SavedConsole::save();
    let registry = startup(&config).unwrap();

    tracing::info!(step = 1u64, "ambient one");
    journal_logger().unwrap().info("explicit two", &[("step", json!(2))]).unwrap();
    tracing::warn!("ambient three");

    access_logger().unwrap().info("GET /orders", &[("status", json!(200))]).unwrap();
    access_writer()
        .unwrap()
        .write_all(b"10.0.0.1 - - \"GET /orders HTTP/1.1\" 200 12\n")
        .unwrap();

    let mut stdout = std::io::stdout();
    stdout.write_all(b"raw stdout line\n").unwrap();
    stdout.flush().unwrap();
    std::io::stderr().write_all(b"raw stderr line\n").unwrap();

    sync();
    // Calling it again is harmless.
    sync();
    let second = startup(&config);
    drop(saved);

    let journal = fs::read_to_string(&config.journal.filename).unwrap();
    let ordered: Vec<&str> = journal
        .lines()
        .filter(|l| l.contains("ambient") || l.contains("explicit"))
        .collect();
    assert_eq!(ordered.len(), 3);
    assert!(ordered[0].contains("\tinfo\tjournal\t") && ordered[0].contains("\tambient one\t"));
    assert!(ordered[1].contains("\texplicit two\t"));
    assert!(ordered[2].contains("\twarn\tjournal\t") && ordered[2].ends_with("\tambient three"));
    assert!(journal.contains("Log streams started"));
    assert!(!journal.contains("GET /orders"));

    let access = fs::read_to_string(&config.access.filename).unwrap();
    assert!(access.contains("\tinfo\taccess\t"));
    assert!(access.contains("\"status\":200"));
    assert!(access.contains("10.0.0.1 - - \"GET /orders HTTP/1.1\" 200 12"));
    assert!(!access.contains("ambient"));

    let escape = fs::read_to_string(&config.escape).unwrap();
    assert!(escape.contains("raw stdout line"));
    assert!(escape.contains("raw stderr line"));

    // The published registry is the one returned, and it is write-once.
    assert!(std::ptr::eq(registry, audit_streams::stream::registry().unwrap()));
    assert!(matches!(second, Err(StartupError::Registry(_))));
}

#[test]
fn test_invalid_schedule_fails_before_touching_disk() {
    let _console = CONSOLE.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let mut config = common::temp_config(&dir);
    config.journal.rotate = "whenever it feels right".to_string();

    let err = startup(&config).unwrap_err();

    assert!(matches!(err, StartupError::Config(ref errors) if errors.len() == 1));
    assert!(err.to_string().contains("journal: invalid rotation schedule"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
