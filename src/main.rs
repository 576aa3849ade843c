//! Audit streams demo.
//!
//! Brings up the logging subsystem from an optional TOML file and writes a
//! heartbeat to both streams until SIGINT/SIGTERM.
//!
//! ```text
//!   startup(config)
//!       │
//!       ├── stdout/stderr ──────────▶ escape.log
//!       ├── access_writer() ────────▶ access.log   (raw request lines)
//!       ├── access_logger() ────────▶ access.log   (structured records)
//!       ├── tracing::info!(...) ────▶ journal.log  (ambient)
//!       └── "log-rotation" thread ──▶ rotates both on schedule
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use serde_json::json;

use audit_streams::config::{load_config, SystemConfig};
use audit_streams::lifecycle::shutdown_signal;
use audit_streams::{startup, sync};

#[derive(Parser)]
#[command(name = "audit-demo")]
#[command(about = "Write heartbeat records to rotating access and journal logs", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between heartbeats.
    #[arg(short, long, default_value_t = 5)]
    interval: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("audit-demo: {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => SystemConfig::default(),
    };

    let registry = match startup(&config) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("audit-demo: startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_secs = cli.interval,
        "audit-demo starting"
    );
    // Lands in the escape file.
    println!("audit-demo {} running", env!("CARGO_PKG_VERSION"));

    let mut ticker = tokio::time::interval(Duration::from_secs(cli.interval.max(1)));
    let mut access = registry.access_writer();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut sequence: u64 = 0;
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to install signal handlers");
                }
                break;
            }
            _ = ticker.tick() => {
                sequence += 1;

                let line = format!(
                    "127.0.0.1 - - [{}] \"GET /heartbeat HTTP/1.1\" 200 0\n",
                    Local::now().format("%d/%b/%Y:%H:%M:%S %z")
                );
                if let Err(e) = access.write_all(line.as_bytes()) {
                    tracing::warn!(error = %e, "Access line dropped");
                }

                let fields = [("sequence", json!(sequence))];
                if let Err(e) = registry.access().info("heartbeat served", &fields) {
                    tracing::warn!(error = %e, "Access record dropped");
                }

                tracing::info!(sequence, "Heartbeat");
            }
        }
    }

    tracing::info!(heartbeats = sequence, "Shutdown complete");
    sync();
    ExitCode::SUCCESS
}
