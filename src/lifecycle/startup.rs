//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Redirect stdout/stderr into the escape file
//! - Open the streams and install the ambient emitter
//! - Start the rotation scheduler
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Nothing touches the filesystem until validation passed

use std::io;

use thiserror::Error;

use crate::config::{validate_config, SystemConfig, ValidationError};
use crate::scheduler::{ScheduleError, Scheduler};
use crate::stream::{Registry, RegistryError};

use super::escape::{self, EscapeError};

/// Fatal setup errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", join(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Escape(#[from] EscapeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to start rotation scheduler: {0}")]
    Scheduler(#[source] io::Error),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Bring the logging subsystem up and publish the registry.
///
/// Runs once per process. Everything `tracing` emits afterwards lands in the
/// journal.
pub fn startup(config: &SystemConfig) -> Result<&'static Registry, StartupError> {
    validate_config(config).map_err(StartupError::Config)?;

    let escape = escape::redirect_output(&config.escape)?;

    let registry = Registry::initialize(config)?;

    let scheduler = Scheduler::from_config(config, registry)?;
    scheduler.start().map_err(StartupError::Scheduler)?;

    tracing::info!(
        access = %config.access.filename.display(),
        journal = %config.journal.filename.display(),
        escape = %escape.path().display(),
        access_rotate = %config.access.rotate,
        journal_rotate = %config.journal.rotate,
        "Log streams started"
    );

    Ok(registry)
}
