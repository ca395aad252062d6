//! Error types for scan operations.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that stop a scan before it produces anything.
///
/// Unreadable entries below the root are skipped during the walk and never
/// surface here.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan root does not exist.
    #[error("Directory not found: {path}")]
    NotFound {
        /// Path as requested.
        path: PathBuf,
    },

    /// The scan root exists but is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory {
        /// Path as requested.
        path: PathBuf,
    },

    /// The scan root cannot be read.
    #[error("Directory is not accessible: {path}")]
    Inaccessible {
        /// Path as requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The name pattern is not a valid glob.
    #[error("Invalid name pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern as supplied.
        pattern: String,
        /// Parser message.
        message: String,
    },
}

impl ScanError {
    /// Returns the path this error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound { path }
            | Self::NotADirectory { path }
            | Self::Inaccessible { path, .. } => Some(path),
            Self::InvalidPattern { .. } => None,
        }
    }
}

/// Checks that `path` is a readable directory and returns its canonical form.
///
/// # Errors
///
/// Returns [`ScanError::NotFound`], [`ScanError::NotADirectory`] or
/// [`ScanError::Inaccessible`] depending on what is wrong with the path.
pub fn resolve_root(path: &Path) -> Result<PathBuf, ScanError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ScanError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ScanError::Inaccessible {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    // Listing permission is separate from stat permission
    std::fs::read_dir(path).map_err(|e| ScanError::Inaccessible {
        path: path.to_path_buf(),
        source: e,
    })?;

    path.canonicalize().map_err(|e| ScanError::Inaccessible {
        path: path.to_path_buf(),
        source: e,
    })
}
