//! Capture of raw stdout/stderr output.
//!
//! # Responsibilities
//! - Open the escape file in synchronous append mode
//! - Point descriptors 1 and 2 at it for the rest of the process
//!
//! # Design Decisions
//! - Redirection is never undone
//! - Output buffered in Rust's stdout/stderr handles is flushed first

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors opening or installing the escape file.
#[derive(Debug, Error)]
pub enum EscapeError {
    #[error("failed to open escape file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[cfg(unix)]
    #[error("failed to redirect fd {fd} to escape file: {source}")]
    Redirect {
        fd: i32,
        #[source]
        source: nix::Error,
    },

    #[error("descriptor redirection is not supported on this platform")]
    Unsupported,
}

/// An open escape file.
#[derive(Debug)]
pub struct EscapeFile {
    path: PathBuf,
    file: File,
}

impl EscapeFile {
    /// Open `path` for synchronous appends, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EscapeError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| EscapeError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options
                .mode(0o644)
                .custom_flags(nix::fcntl::OFlag::O_SYNC.bits());
        }
        let file = options.open(&path).map_err(open_err)?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make this file the target of fd 1 and fd 2.
    #[cfg(unix)]
    pub fn redirect(&self) -> Result<(), EscapeError> {
        use std::os::unix::io::AsRawFd;

        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        let source = self.file.as_raw_fd();
        for fd in [1, 2] {
            nix::unistd::dup2(source, fd).map_err(|source| EscapeError::Redirect { fd, source })?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn redirect(&self) -> Result<(), EscapeError> {
        Err(EscapeError::Unsupported)
    }
}

/// Open `path` and redirect stdout/stderr into it.
pub fn redirect_output(path: impl AsRef<Path>) -> Result<EscapeFile, EscapeError> {
    let escape = EscapeFile::open(path)?;
    escape.redirect()?;
    Ok(escape)
}
