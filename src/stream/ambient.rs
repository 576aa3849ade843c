//! The process-wide ambient emitter.
//!
//! Code that logs through `tracing` macros without holding a stream handle
//! ends up in whichever stream was installed here. Only the journal stream
//! is ever installed, exactly once.

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use super::record::short_caller;
use super::{Level, Stream};

static AMBIENT: OnceLock<Arc<Stream>> = OnceLock::new();

/// Errors installing the ambient emitter.
#[derive(Debug, Error)]
pub enum AmbientError {
    #[error("ambient emitter already installed")]
    AlreadyInstalled,

    #[error("failed to install global tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Make `stream` the target of all `tracing` events in the process.
pub fn install(stream: Arc<Stream>) -> Result<(), AmbientError> {
    if AMBIENT.get().is_some() {
        return Err(AmbientError::AlreadyInstalled);
    }

    let subscriber = tracing_subscriber::registry()
        .with(stream.level().as_filter())
        .with(AmbientLayer::new(stream.clone()));
    tracing::subscriber::set_global_default(subscriber)?;

    AMBIENT.set(stream).map_err(|_| AmbientError::AlreadyInstalled)
}

/// The installed ambient stream, if startup has reached it.
pub fn ambient() -> Option<&'static Arc<Stream>> {
    AMBIENT.get()
}

/// A tracing layer that writes events as records of one stream.
pub struct AmbientLayer {
    stream: Arc<Stream>,
}

impl AmbientLayer {
    pub fn new(stream: Arc<Stream>) -> Self {
        Self { stream }
    }
}

impl<S: Subscriber> Layer<S> for AmbientLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let Some(level) = Level::from_tracing(metadata.level()) else {
            return;
        };
        if !self.stream.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let caller = metadata
            .file()
            .map(|file| short_caller(file, metadata.line().unwrap_or(0)));
        let message = visitor.message.unwrap_or_default();

        if let Err(e) = self.stream.write_record(level, caller, &message, &visitor.fields) {
            eprintln!("{} stream: dropped ambient record: {}", self.stream.name(), e);
        }
    }
}

/// Collects the `message` field and everything else as JSON.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use crate::stream::StreamName;
    use std::fs;
    use tempfile::TempDir;

    fn journal(dir: &TempDir, level: Level) -> Arc<Stream> {
        let mut config = LoggerConfig::new(dir.path().join("journal.log"));
        config.level = level;
        Arc::new(Stream::open(StreamName::Journal, &config).unwrap())
    }

    #[test]
    fn test_ambient_and_explicit_records_interleave_in_order() {
        let dir = TempDir::new().unwrap();
        let stream = journal(&dir, Level::Info);
        let subscriber = tracing_subscriber::registry().with(AmbientLayer::new(stream.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user = "ada", attempts = 3u64, "ambient first");
            stream.info("explicit second", &[]).unwrap();
            tracing::warn!("ambient third");
        });

        let content = fs::read_to_string(stream.sink().path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\tinfo\tjournal\t"));
        assert!(lines[0].contains("\tambient first\t"));
        assert!(lines[0].ends_with("{\"attempts\":3,\"user\":\"ada\"}"));
        assert!(lines[1].ends_with("\texplicit second"));
        assert!(lines[2].ends_with("\tambient third"));
    }

    #[test]
    fn test_events_below_stream_level_are_dropped() {
        let dir = TempDir::new().unwrap();
        let stream = journal(&dir, Level::Error);
        let subscriber = tracing_subscriber::registry().with(AmbientLayer::new(stream.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::trace!("trace");
            tracing::info!("info");
            tracing::error!(code = 7, "boom");
        });

        let content = fs::read_to_string(stream.sink().path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\terror\tjournal\tstream/ambient.rs:"));
    }
}
