//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, demo binary only)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SystemConfig (validated, immutable)
//!     → lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once passed to startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{Level, LoggerConfig, SystemConfig};
pub use validation::{validate_config, ValidationError};
