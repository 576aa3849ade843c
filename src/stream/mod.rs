//! Structured log streams.
//!
//! # Data Flow
//! ```text
//! stream.info(msg, fields)              tracing::info!(...)
//!     → emitter.rs (level check)            → ambient.rs (AmbientLayer)
//!     → record.rs (encode one line)         → emitter.rs (journal stream)
//!     → sink (single locked write)
//!
//! registry.rs:
//!     SystemConfig → access Stream, journal Stream
//!     journal Stream → ambient emitter (once)
//! ```
//!
//! # Design Decisions
//! - Access and journal never share a file or a lock
//! - Only the journal becomes the ambient emitter
//! - Registry and ambient slots are write-once

pub mod ambient;
pub mod emitter;
pub mod level;
pub mod record;
pub mod registry;

pub use ambient::{ambient, AmbientError, AmbientLayer};
pub use emitter::{Stream, StreamName};
pub use level::Level;
pub use registry::{
    access_logger, access_writer, journal_logger, journal_writer, registry, Registry, RegistryError,
};
