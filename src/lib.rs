//! Dual-stream structured logging with scheduled rotation.
//!
//! A process gets an `access` stream for request-level events and a
//! `journal` stream for everything else, each backed by its own rotating
//! file. Raw stdout/stderr output is captured in a separate escape file.

pub mod config;
pub mod lifecycle;
pub mod scheduler;
pub mod sink;
pub mod stream;

pub use config::{Level, LoggerConfig, SystemConfig};
pub use lifecycle::{startup, sync, StartupError};
pub use sink::{RawSink, RotatingFileSink};
pub use stream::{
    access_logger, access_writer, journal_logger, journal_writer, Registry, Stream, StreamName,
};
