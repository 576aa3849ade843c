//! Backup naming and retention.
//!
//! # Responsibilities
//! - Derive backup file names from the live file name and a timestamp
//! - Find existing backups and order them newest first
//! - Evict by count and age, gzip the survivors
//!
//! Runs on the thread that rotated, which may be writing the ambient
//! stream, so it reports through stderr only.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use super::RotationPolicy;

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const COMPRESS_SUFFIX: &str = ".gz";

/// Stem and extension of a live log file, e.g. `access` and `.log`.
#[derive(Debug, Clone)]
pub(crate) struct BackupNaming {
    dir: PathBuf,
    stem: String,
    ext: String,
}

impl BackupNaming {
    pub(crate) fn new(path: &Path) -> Self {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self { dir, stem, ext }
    }

    /// Backup path for a rotation at `at`, rendered in local time or UTC.
    pub(crate) fn backup_path(&self, at: DateTime<Utc>, local: bool) -> PathBuf {
        let stamp = if local {
            at.with_timezone(&Local).format(BACKUP_TIME_FORMAT).to_string()
        } else {
            at.format(BACKUP_TIME_FORMAT).to_string()
        };
        self.dir.join(format!("{}-{}{}", self.stem, stamp, self.ext))
    }

    /// Backup path for `at` that does not exist yet.
    pub(crate) fn unused_backup_path(&self, mut at: DateTime<Utc>, local: bool) -> PathBuf {
        loop {
            let candidate = self.backup_path(at, local);
            let gz = append_suffix(&candidate, COMPRESS_SUFFIX);
            if !candidate.exists() && !gz.exists() {
                return candidate;
            }
            at += chrono::Duration::milliseconds(1);
        }
    }

    /// Timestamp encoded in a backup file name, if `name` is one of ours.
    fn parse(&self, name: &str, local: bool) -> Option<DateTime<Utc>> {
        let name = name.strip_suffix(COMPRESS_SUFFIX).unwrap_or(name);
        let stamp = name
            .strip_prefix(self.stem.as_str())?
            .strip_prefix('-')?
            .strip_suffix(self.ext.as_str())?;
        let naive = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).ok()?;
        if local {
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc))
        } else {
            Some(Utc.from_utc_datetime(&naive))
        }
    }

    /// All backups on disk, newest first.
    pub(crate) fn list(&self, local: bool) -> io::Result<Vec<Backup>> {
        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(timestamp) = self.parse(&name, local) {
                backups.push(Backup {
                    path: entry.path(),
                    timestamp,
                });
            }
        }
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.path.cmp(&a.path)));
        Ok(backups)
    }
}

/// A rotated file on disk.
#[derive(Debug, Clone)]
pub struct Backup {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl Backup {
    pub fn is_compressed(&self) -> bool {
        self.path.to_string_lossy().ends_with(COMPRESS_SUFFIX)
    }

    /// The path with any `.gz` suffix removed; a backup and its compressed twin share it.
    fn logical_name(&self) -> PathBuf {
        let raw = self.path.to_string_lossy();
        PathBuf::from(raw.strip_suffix(COMPRESS_SUFFIX).unwrap_or(&raw))
    }
}

/// Apply count, age and compression rules to the backups of one sink.
///
/// Keeps going past individual failures and returns the first one.
pub(crate) fn enforce(
    naming: &BackupNaming,
    policy: &RotationPolicy,
    now: DateTime<Utc>,
) -> io::Result<()> {
    if policy.max_backups == 0 && policy.max_age_days == 0 && !policy.compress {
        return Ok(());
    }

    let mut backups = naming.list(policy.local_time)?;
    let mut doomed = Vec::new();

    if policy.max_backups > 0 {
        let mut kept: Vec<PathBuf> = Vec::new();
        backups.retain(|backup| {
            let logical = backup.logical_name();
            if kept.contains(&logical) {
                return true;
            }
            if kept.len() < policy.max_backups {
                kept.push(logical);
                true
            } else {
                doomed.push(backup.path.clone());
                false
            }
        });
    }

    if policy.max_age_days > 0 {
        let cutoff = now - chrono::Duration::days(policy.max_age_days as i64);
        backups.retain(|backup| {
            if backup.timestamp < cutoff {
                doomed.push(backup.path.clone());
                false
            } else {
                true
            }
        });
    }

    let mut first_error = None;
    for path in doomed {
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                first_error.get_or_insert(e);
            }
        }
    }

    if policy.compress {
        for backup in backups.iter().filter(|b| !b.is_compressed()) {
            let target = append_suffix(&backup.path, COMPRESS_SUFFIX);
            if let Err(e) = compress_file(&backup.path, &target) {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Gzip `src` into `dst` and remove `src`.
fn compress_file(src: &Path, dst: &Path) -> io::Result<()> {
    let input = File::open(src)?;
    let permissions = input.metadata()?.permissions();

    let result = (|| {
        let output = File::create(dst)?;
        output.set_permissions(permissions)?;
        let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
        io::copy(&mut BufReader::new(input), &mut encoder)?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        writer.get_ref().sync_all()
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(dst);
        return Err(e);
    }
    fs::remove_file(src)
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}
