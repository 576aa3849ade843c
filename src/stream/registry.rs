//! The access and journal streams of a process.
//!
//! [`Registry::open`] builds an explicit context object with no global side
//! effects. [`Registry::initialize`] additionally installs the journal as
//! the ambient emitter and publishes the registry in a write-once slot that
//! the accessor functions below read from.

use std::io;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::config::SystemConfig;
use crate::sink::RawSink;

use super::ambient::{self, AmbientError};
use super::{Stream, StreamName};

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Errors building or publishing the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to open {stream} log: {source}")]
    Open {
        stream: StreamName,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Ambient(#[from] AmbientError),

    #[error("stream registry already initialized")]
    AlreadyInitialized,
}

/// Both streams of the process.
#[derive(Debug, Clone)]
pub struct Registry {
    access: Arc<Stream>,
    journal: Arc<Stream>,
}

impl Registry {
    /// Open access, then journal.
    pub fn open(config: &SystemConfig) -> Result<Self, RegistryError> {
        let access = open_stream(StreamName::Access, config)?;
        let journal = open_stream(StreamName::Journal, config)?;
        Ok(Self { access, journal })
    }

    /// Open both streams, install the journal as the ambient emitter and
    /// publish the registry for the rest of the process.
    pub fn initialize(config: &SystemConfig) -> Result<&'static Registry, RegistryError> {
        if REGISTRY.get().is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }
        let registry = Self::open(config)?;
        ambient::install(registry.journal.clone())?;
        REGISTRY
            .set(registry)
            .map_err(|_| RegistryError::AlreadyInitialized)?;
        REGISTRY.get().ok_or(RegistryError::AlreadyInitialized)
    }

    pub fn access(&self) -> &Arc<Stream> {
        &self.access
    }

    pub fn journal(&self) -> &Arc<Stream> {
        &self.journal
    }

    pub fn stream(&self, name: StreamName) -> &Arc<Stream> {
        match name {
            StreamName::Access => &self.access,
            StreamName::Journal => &self.journal,
        }
    }

    pub fn access_writer(&self) -> RawSink {
        self.access.raw_sink()
    }

    pub fn journal_writer(&self) -> RawSink {
        self.journal.raw_sink()
    }

    /// Flush both streams. Failures go to stderr; nothing is returned.
    pub fn sync(&self) {
        for stream in [&self.access, &self.journal] {
            if let Err(e) = stream.flush() {
                eprintln!("{} stream: flush failed: {}", stream.name(), e);
            }
        }
    }
}

fn open_stream(name: StreamName, config: &SystemConfig) -> Result<Arc<Stream>, RegistryError> {
    let logger = match name {
        StreamName::Access => &config.access,
        StreamName::Journal => &config.journal,
    };
    Stream::open(name, logger)
        .map(Arc::new)
        .map_err(|source| RegistryError::Open { stream: name, source })
}

/// The published registry, once startup has initialized it.
pub fn registry() -> Option<&'static Registry> {
    REGISTRY.get()
}

pub fn access_logger() -> Option<Arc<Stream>> {
    registry().map(|r| r.access.clone())
}

pub fn journal_logger() -> Option<Arc<Stream>> {
    registry().map(|r| r.journal.clone())
}

pub fn access_writer() -> Option<RawSink> {
    registry().map(Registry::access_writer)
}

pub fn journal_writer() -> Option<RawSink> {
    registry().map(Registry::journal_writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> SystemConfig {
        SystemConfig {
            access: LoggerConfig::new(dir.path().join("access.log")),
            journal: LoggerConfig::new(dir.path().join("journal.log")),
            escape: dir.path().join("escape.log"),
        }
    }

    #[test]
    fn test_open_builds_independent_streams() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::open(&config(&dir)).unwrap();

        registry.access().info("request", &[]).unwrap();
        registry.journal().info("event", &[]).unwrap();
        registry.sync();

        let access = fs::read_to_string(dir.path().join("access.log")).unwrap();
        let journal = fs::read_to_string(dir.path().join("journal.log")).unwrap();
        assert!(access.contains("\taccess\t") && access.contains("\trequest"));
        assert!(journal.contains("\tjournal\t") && journal.contains("\tevent"));
        assert!(!access.contains("event"));
        assert_eq!(registry.stream(StreamName::Journal).name(), StreamName::Journal);
    }

    #[test]
    fn test_unwritable_path_reports_the_stream() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        fs::write(dir.path().join("blocker"), "file").unwrap();
        config.journal.filename = dir.path().join("blocker").join("journal.log");

        let err = Registry::open(&config).unwrap_err();
        assert!(matches!(err, RegistryError::Open { stream: StreamName::Journal, .. }));
    }
}
