//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every stream has a usable file path
//! - Keep access, journal and escape on distinct files
//! - Parse rotation schedules up front
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SystemConfig → Result<(), Vec<ValidationError>>
//! - Runs before anything is created on disk

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{LoggerConfig, SystemConfig};
use crate::scheduler::{RotationSchedule, ScheduleError};

/// One problem found in a [`SystemConfig`].
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{stream}: filename must not be empty")]
    EmptyFilename { stream: &'static str },

    #[error("{stream}: filename {path} is a directory")]
    FilenameIsDirectory { stream: &'static str, path: PathBuf },

    #[error("escape: path must not be empty")]
    EmptyEscape,

    #[error("{first} and {second} share the file {path}")]
    DuplicatePath {
        first: &'static str,
        second: &'static str,
        path: PathBuf,
    },

    #[error("{stream}: invalid rotation schedule: {source}")]
    InvalidSchedule {
        stream: &'static str,
        #[source]
        source: ScheduleError,
    },
}

/// Validate `config`, collecting every error.
pub fn validate_config(config: &SystemConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_logger("access", &config.access, &mut errors);
    validate_logger("journal", &config.journal, &mut errors);

    if config.escape.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyEscape);
    }

    let paths = [
        ("access", config.access.filename.as_path()),
        ("journal", config.journal.filename.as_path()),
        ("escape", config.escape.as_path()),
    ];
    for (i, &(first, a)) in paths.iter().enumerate() {
        for &(second, b) in &paths[i + 1..] {
            if !a.as_os_str().is_empty() && normalize(a) == normalize(b) {
                errors.push(ValidationError::DuplicatePath {
                    first,
                    second,
                    path: a.to_path_buf(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_logger(
    stream: &'static str,
    logger: &LoggerConfig,
    errors: &mut Vec<ValidationError>,
) {
    if logger.filename.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyFilename { stream });
    } else if logger.filename.is_dir() {
        errors.push(ValidationError::FilenameIsDirectory {
            stream,
            path: logger.filename.clone(),
        });
    }

    if let Err(source) = logger.rotate.parse::<RotationSchedule>() {
        errors.push(ValidationError::InvalidSchedule { stream, source });
    }
}

/// Lexically normalize so `logs/./a.log` and `logs/a.log` compare equal.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
