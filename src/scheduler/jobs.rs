//! Scheduled rotation jobs.
//!
//! # Responsibilities
//! - Rotate every stream once at start
//! - Drive one timer task per stream
//! - Contain rotation errors and panics at the task boundary

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::task::JoinSet;

use crate::config::SystemConfig;
use crate::stream::{Level, Registry, Stream, StreamName};

use super::schedule::{RotationSchedule, ScheduleError};

/// One stream's recurring rotation.
pub struct RotationJob {
    stream: Arc<Stream>,
    fallback: Option<Arc<Stream>>,
    expression: String,
    schedule: RotationSchedule,
    local_time: bool,
}

impl RotationJob {
    /// Parse `expression` for `stream`. An invalid expression is a configuration error.
    pub fn new(
        stream: Arc<Stream>,
        expression: &str,
        local_time: bool,
    ) -> Result<Self, ScheduleError> {
        Ok(Self {
            stream,
            fallback: None,
            expression: expression.trim().to_string(),
            schedule: expression.parse()?,
            local_time,
        })
    }

    /// Stream that receives failure reports for this job.
    pub fn with_fallback(mut self, fallback: Arc<Stream>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn name(&self) -> StreamName {
        self.stream.name()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn schedule(&self) -> &RotationSchedule {
        &self.schedule
    }

    /// Rotate on the blocking pool and report the outcome.
    pub async fn fire(&self) -> io::Result<()> {
        let stream = self.stream.clone();
        let outcome = match tokio::task::spawn_blocking(move || stream.rotate()).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(panicked(e.into_panic())),
            Err(e) => Err(io::Error::other(e.to_string())),
        };
        self.settle(outcome)
    }

    /// Rotate on the current thread and report the outcome.
    pub fn fire_blocking(&self) -> io::Result<()> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.stream.rotate()))
            .unwrap_or_else(|payload| Err(panicked(payload)));
        self.settle(outcome)
    }

    async fn drive(self) {
        tracing::info!(
            stream = %self.name(),
            schedule = %self.expression,
            "Rotation job scheduled"
        );

        let mut previous = Utc::now();
        loop {
            let now = Utc::now();
            let Some(next) = self.schedule.next_firing(previous, now, self.local_time) else {
                self.report_failure("schedule has no future firings");
                return;
            };
            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;
            // Failures are already reported; the next firing retries.
            let _ = self.fire().await;
            previous = next;
        }
    }

    fn settle(&self, outcome: io::Result<()>) -> io::Result<()> {
        match &outcome {
            Ok(()) => tracing::info!(
                stream = %self.name(),
                schedule = %self.expression,
                "Log rotated"
            ),
            Err(e) => self.report_failure(&e.to_string()),
        }
        outcome
    }

    /// Report outside the failing stream: the sibling stream and stderr.
    fn report_failure(&self, reason: &str) {
        eprintln!(
            "{} log rotate ({}) failed: {}",
            self.name(),
            self.expression,
            reason
        );

        if let Some(fallback) = &self.fallback {
            let mut fields = Map::new();
            fields.insert("stream".into(), Value::from(self.name().as_str()));
            fields.insert("schedule".into(), Value::from(self.expression.as_str()));
            fields.insert("error".into(), Value::from(reason));
            let _ = fallback.write_record(Level::Error, None, "log rotation failed", &fields);
        }
    }
}

/// Drives the rotation jobs of both streams until the process exits.
pub struct Scheduler {
    jobs: Vec<RotationJob>,
}

impl Scheduler {
    pub fn new(jobs: Vec<RotationJob>) -> Self {
        Self { jobs }
    }

    /// One job per stream, each reporting failures to the other stream.
    pub fn from_config(config: &SystemConfig, registry: &Registry) -> Result<Self, ScheduleError> {
        let access = RotationJob::new(
            registry.access().clone(),
            &config.access.rotate,
            config.access.local_time,
        )?
        .with_fallback(registry.journal().clone());
        let journal = RotationJob::new(
            registry.journal().clone(),
            &config.journal.rotate,
            config.journal.local_time,
        )?
        .with_fallback(registry.access().clone());
        Ok(Self::new(vec![access, journal]))
    }

    pub fn jobs(&self) -> &[RotationJob] {
        &self.jobs
    }

    /// Rotate every stream once, regardless of schedule.
    pub fn rotate_now(&self) {
        for job in &self.jobs {
            let _ = job.fire_blocking();
        }
    }

    /// Drive all jobs on the current runtime, one task each.
    pub async fn run(self) {
        let mut tasks = JoinSet::new();
        for job in self.jobs {
            tasks.spawn(job.drive());
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                eprintln!("rotation job stopped: {}", e);
            }
        }
    }

    /// Rotate immediately, then drive the jobs on a dedicated background thread.
    ///
    /// The thread is never joined; it lives until the process exits.
    pub fn start(self) -> io::Result<thread::JoinHandle<()>> {
        self.rotate_now();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .thread_name("log-rotation-blocking")
            .build()?;

        thread::Builder::new()
            .name("log-rotation".to_string())
            .spawn(move || runtime.block_on(self.run()))
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> io::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    io::Error::other(format!("rotation panicked: {message}"))
}
