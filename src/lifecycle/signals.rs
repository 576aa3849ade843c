//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT or SIGTERM
//! - Report which one arrived through the ambient channel
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Non-unix platforms only observe Ctrl-C

use std::io;

/// Resolve once the process has been asked to stop.
#[cfg(unix)]
pub async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
        _ = sigint.recv() => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "Shutdown signal received");
    Ok(())
}
