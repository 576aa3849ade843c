//! Descriptor-level capture of stdout and stderr.

#![cfg(unix)]

use std::fs;
use std::io::Write;

use audit_streams::lifecycle::EscapeFile;
use nix::unistd::{dup, dup2};
use tempfile::TempDir;

#[test]
fn test_redirected_output_lands_in_escape_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs").join("escape.log");

    let saved_stdout = dup(1).unwrap();
    let saved_stderr = dup(2).unwrap();

    let escape = EscapeFile::open(&path).unwrap();
    escape.redirect().unwrap();

    let mut stdout = std::io::stdout();
    stdout.write_all(b"stdout after redirect\n").unwrap();
    stdout.flush().unwrap();
    std::io::stderr().write_all(b"stderr after redirect\n").unwrap();

    dup2(saved_stdout, 1).unwrap();
    dup2(saved_stderr, 2).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "stdout after redirect\nstderr after redirect\n");
}
