//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Redirect stdout/stderr (escape.rs)
//!         → Open access, journal → Install ambient → Start scheduler
//!
//! Shutdown (shutdown.rs):
//!     Signal received (signals.rs) → Flush both streams → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: validation first, scheduler last
//! - No teardown: redirection, ambient emitter and jobs live until exit

pub mod escape;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use escape::{EscapeError, EscapeFile};
pub use shutdown::sync;
pub use signals::shutdown_signal;
pub use startup::{startup, StartupError};
