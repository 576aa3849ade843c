//! Size- and schedule-rotated log file.
//!
//! # Responsibilities
//! - Own the single open handle for one log path
//! - Append records atomically with respect to rotation
//! - Archive the live file under a timestamped name and reopen
//! - Trigger retention after every rotation, outside the write lock

use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing_subscriber::fmt::MakeWriter;

use super::retention::{self, Backup, BackupNaming};
use super::RotationPolicy;

const DEFAULT_FILE_MODE: u32 = 0o600;

/// Point-in-time view of a sink.
#[derive(Debug, Clone)]
pub struct SinkStats {
    /// Live file path.
    pub path: PathBuf,
    /// Bytes written to the live file (including what was there at open).
    pub size: u64,
    /// When the live file was opened.
    pub opened_at: DateTime<Utc>,
    /// Rotations performed since the sink was opened.
    pub rotations: u64,
}

struct SinkState {
    file: File,
    size: u64,
    opened_at: DateTime<Utc>,
    rotations: u64,
}

/// A log file that can be rotated while writers are active.
pub struct RotatingFileSink {
    path: PathBuf,
    naming: BackupNaming,
    policy: RotationPolicy,
    state: Mutex<SinkState>,
    retention: Mutex<()>,
}

impl RotatingFileSink {
    /// Open `path` for appending, creating it and its directory if needed.
    ///
    /// A file that is already at the size limit is archived first.
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        let naming = BackupNaming::new(&path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_log_dir(parent)?;
        }

        let now = Utc::now();
        let (file, size) = match fs::metadata(&path) {
            Ok(meta) if meta.len() < policy.max_size => {
                let file = OpenOptions::new().append(true).open(&path)?;
                (file, meta.len())
            }
            Ok(meta) => {
                let backup = naming.unused_backup_path(now, policy.local_time);
                fs::rename(&path, &backup)?;
                (create_fresh(&path, file_mode(&meta))?, 0)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                (create_fresh(&path, DEFAULT_FILE_MODE)?, 0)
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            naming,
            policy,
            state: Mutex::new(SinkState {
                file,
                size,
                opened_at: now,
                rotations: 0,
            }),
            retention: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Append `buf` to the live file in one piece.
    ///
    /// Rotates first when `buf` would push the file past the size limit;
    /// retention then runs after the write, outside the sink lock.
    pub fn write_record(&self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len() as u64;
        if len > self.policy.max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write length {} exceeds maximum file size {}",
                    len, self.policy.max_size
                ),
            ));
        }

        let rolled = {
            let mut state = self.lock();
            let rolled = state.size + len > self.policy.max_size;
            if rolled {
                self.roll(&mut state)?;
            }
            state.file.write_all(buf)?;
            state.size += len;
            rolled
        };

        if rolled {
            if let Err(e) = self.apply_retention() {
                eprintln!("{}: retention after size rotation failed: {}", self.path.display(), e);
            }
        }
        Ok(buf.len())
    }

    /// Close the live file, archive it and open a fresh one, then apply retention.
    ///
    /// On error before the swap the previous handle stays in use. Writers
    /// only wait for the swap; retention runs after the sink lock is released.
    pub fn rotate(&self) -> io::Result<()> {
        self.roll(&mut self.lock())?;
        self.apply_retention()
    }

    /// Flush and fsync the live file.
    pub fn sync(&self) -> io::Result<()> {
        let mut state = self.lock();
        state.file.flush()?;
        state.file.sync_data()
    }

    pub fn stats(&self) -> SinkStats {
        let state = self.lock();
        SinkStats {
            path: self.path.clone(),
            size: state.size,
            opened_at: state.opened_at,
            rotations: state.rotations,
        }
    }

    /// Backups currently on disk, newest first.
    pub fn backups(&self) -> io::Result<Vec<Backup>> {
        self.naming.list(self.policy.local_time)
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        // State is only replaced after every fallible step succeeded.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One retention pass at a time per sink.
    fn apply_retention(&self) -> io::Result<()> {
        let _pass = self.retention.lock().unwrap_or_else(PoisonError::into_inner);
        retention::enforce(&self.naming, &self.policy, Utc::now())
    }

    fn roll(&self, state: &mut SinkState) -> io::Result<()> {
        state.file.flush()?;
        state.file.sync_data()?;
        let mode = file_mode(&state.file.metadata()?);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_log_dir(parent)?;
        }

        let now = Utc::now();
        let backup = self.naming.unused_backup_path(now, self.policy.local_time);
        let archived = match fs::rename(&self.path, &backup) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e),
        };

        let file = match create_fresh(&self.path, mode) {
            Ok(file) => file,
            Err(e) => {
                if archived {
                    let _ = fs::rename(&backup, &self.path);
                }
                return Err(e);
            }
        };

        state.file = file;
        state.size = 0;
        state.opened_at = now;
        state.rotations += 1;
        Ok(())
    }
}

impl Write for &RotatingFileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_record(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().file.flush()
    }
}

/// Cloneable byte-oriented handle onto a sink, for frontends that format
/// their own lines (HTTP access loggers, `tracing_subscriber::fmt`).
#[derive(Clone)]
pub struct RawSink(Arc<RotatingFileSink>);

impl RawSink {
    pub fn new(sink: Arc<RotatingFileSink>) -> Self {
        Self(sink)
    }

    pub fn sink(&self) -> &Arc<RotatingFileSink> {
        &self.0
    }
}

impl Write for RawSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_record(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RawSink {
    type Writer = RawSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn create_log_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

fn create_fresh(path: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

#[cfg(unix)]
fn file_mode(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_meta: &Metadata) -> u32 {
    DEFAULT_FILE_MODE
}
