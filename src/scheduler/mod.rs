//! Time-based rotation scheduling.
//!
//! # Data Flow
//! ```text
//! LoggerConfig.rotate
//!     → schedule.rs (parse expression)
//!     → jobs.rs (one RotationJob per stream)
//!     → Scheduler::start
//!         → rotate every stream once
//!         → "log-rotation" thread: sleep until next firing → rotate → report
//! ```
//!
//! # Design Decisions
//! - One task per job; a slow rotation never delays the other stream
//! - Failures are reported on the sibling stream and retried at the next firing
//! - Jobs are never cancelled

pub mod jobs;
pub mod schedule;

pub use jobs::{RotationJob, Scheduler};
pub use schedule::{RotationSchedule, ScheduleError};
