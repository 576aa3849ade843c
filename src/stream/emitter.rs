//! Structured record emitter bound to one sink.
//!
//! # Responsibilities
//! - Drop records below the stream's minimum level
//! - Encode and write accepted records in a single sink write
//! - Apply the no-return semantics of `critical` and `fatal`

use std::fmt;
use std::io;
use std::panic::Location;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::LoggerConfig;
use crate::sink::{RawSink, RotatingFileSink, RotationPolicy};

use super::record::{short_caller, Record};
use super::Level;

/// The two streams a process owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamName {
    Access,
    Journal,
}

impl StreamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamName::Access => "access",
            StreamName::Journal => "journal",
        }
    }

    /// The stream that reports on this one's behalf.
    pub fn sibling(&self) -> StreamName {
        match self {
            StreamName::Access => StreamName::Journal,
            StreamName::Journal => StreamName::Access,
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, independently rotated structured log stream.
pub struct Stream {
    name: StreamName,
    level: Level,
    local_time: bool,
    sink: Arc<RotatingFileSink>,
}

impl Stream {
    /// Open the sink described by `config`.
    pub fn open(name: StreamName, config: &LoggerConfig) -> io::Result<Self> {
        let sink = RotatingFileSink::open(&config.filename, RotationPolicy::from(config))?;
        Ok(Self::with_sink(name, config.level, config.local_time, Arc::new(sink)))
    }

    /// Wrap an already opened sink.
    pub fn with_sink(
        name: StreamName,
        level: Level,
        local_time: bool,
        sink: Arc<RotatingFileSink>,
    ) -> Self {
        Self {
            name,
            level,
            local_time,
            sink,
        }
    }

    pub fn name(&self) -> StreamName {
        self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    /// Emit a record from the caller's location.
    ///
    /// `critical` records panic after being written; `fatal` records flush
    /// the stream and exit the process.
    #[track_caller]
    pub fn log(&self, level: Level, message: &str, fields: &[(&str, Value)]) -> io::Result<()> {
        let caller = Location::caller();
        let written = if self.enabled(level) {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect();
            let caller = short_caller(caller.file(), caller.line());
            self.write_record(level, Some(caller), message, &fields)
        } else {
            Ok(())
        };

        // Termination applies even when the record itself was filtered out.
        match level {
            Level::Critical => panic!("{}", message),
            Level::Fatal => {
                let _ = self.flush();
                std::process::exit(1);
            }
            _ => written,
        }
    }

    #[track_caller]
    pub fn debug(&self, message: &str, fields: &[(&str, Value)]) -> io::Result<()> {
        self.log(Level::Debug, message, fields)
    }

    #[track_caller]
    pub fn info(&self, message: &str, fields: &[(&str, Value)]) -> io::Result<()> {
        self.log(Level::Info, message, fields)
    }

    #[track_caller]
    pub fn warn(&self, message: &str, fields: &[(&str, Value)]) -> io::Result<()> {
        self.log(Level::Warn, message, fields)
    }

    #[track_caller]
    pub fn error(&self, message: &str, fields: &[(&str, Value)]) -> io::Result<()> {
        self.log(Level::Error, message, fields)
    }

    #[track_caller]
    pub fn critical(&self, message: &str, fields: &[(&str, Value)]) -> ! {
        let _ = self.log(Level::Critical, message, fields);
        unreachable!("critical records panic")
    }

    #[track_caller]
    pub fn fatal(&self, message: &str, fields: &[(&str, Value)]) -> ! {
        let _ = self.log(Level::Fatal, message, fields);
        unreachable!("fatal records exit the process")
    }

    /// Encode and write one record if `level` passes the threshold.
    pub fn write_record(
        &self,
        level: Level,
        caller: Option<String>,
        message: &str,
        fields: &Map<String, Value>,
    ) -> io::Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        let record = Record {
            level,
            stream: self.name.as_str(),
            caller,
            message,
            fields,
        };
        let line = record.encode(Utc::now(), self.local_time);
        self.sink.write_record(line.as_bytes()).map(|_| ())
    }

    /// Byte-level handle for frontends that format their own lines.
    pub fn raw_sink(&self) -> RawSink {
        RawSink::new(self.sink.clone())
    }

    pub fn sink(&self) -> &Arc<RotatingFileSink> {
        &self.sink
    }

    /// Rotate the underlying sink now.
    pub fn rotate(&self) -> io::Result<()> {
        self.sink.rotate()
    }

    /// Block until written records are durable.
    pub fn flush(&self) -> io::Result<()> {
        self.sink.sync()
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("path", &self.sink.path())
            .finish()
    }
}
