//! Removal of discarded files.
//!
//! # Overview
//!
//! Files discarded as known, duplicate or blacklisted are removed from the
//! source tree:
//! - Permanent deletion (default, the recovery output is a scratch copy)
//! - Move to system trash (recoverable, `--trash`)
//!
//! A failed removal never aborts a run; the caller records it and the run
//! ends in partial success.
//!
//! # Example
//!
//! ```no_run
//! use tombraider::actions::delete::{delete_file, DeleteMode};
//! use std::path::Path;
//!
//! match delete_file(Path::new("recup_dir.1/f0001.jpg"), DeleteMode::Trash) {
//!     Ok(result) => println!("Removed: {}", result.path.display()),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed { path: PathBuf, message: String },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }
}

/// How discarded files are removed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Unlink the file
    #[default]
    Permanent,
    /// Move the file to the system trash
    Trash,
}

impl std::fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::Trash => write!(f, "trash"),
        }
    }
}

/// Result of a successful deletion operation.
#[derive(Debug, Clone)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
    /// Whether deletion was permanent (true) or to trash (false).
    pub permanent: bool,
}

impl DeleteResult {
    /// Create a new delete result.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, permanent: bool) -> Self {
        Self {
            path,
            size,
            permanent,
        }
    }
}

fn stat_before_delete(path: &Path) -> Result<u64, DeleteError> {
    fs::symlink_metadata(path)
        .map(|m| m.len())
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DeleteError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => DeleteError::PermissionDenied(path.to_path_buf()),
            _ => DeleteError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })
}

/// Move a single file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if access is denied
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = stat_before_delete(path)?;

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::debug!("Moved to trash: {} ({} bytes)", path.display(), size);

    Ok(DeleteResult::new(path.to_path_buf(), size, false))
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `PermanentDeleteFailed` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let size = stat_before_delete(path)?;

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::debug!("Permanently deleted: {} ({} bytes)", path.display(), size);

    Ok(DeleteResult::new(path.to_path_buf(), size, true))
}

/// Delete `path` the way `mode` says.
///
/// # Errors
///
/// See [`permanent_delete`] and [`delete_to_trash`].
pub fn delete_file(path: &Path, mode: DeleteMode) -> Result<DeleteResult, DeleteError> {
    match mode {
        DeleteMode::Permanent => permanent_delete(path),
        DeleteMode::Trash => delete_to_trash(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_temp_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_delete_error_path() {
        let path = PathBuf::from("/test/file.txt");
        assert_eq!(DeleteError::NotFound(path.clone()).path(), path.as_path());
        let err = DeleteError::TrashFailed {
            path: path.clone(),
            message: "no trash".to_string(),
        };
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn test_delete_error_display() {
        let err = DeleteError::NotFound(PathBuf::from("/test/file.txt"));
        assert!(err.to_string().contains("file not found"));
        assert!(err.to_string().contains("/test/file.txt"));
    }

    #[test]
    fn test_delete_mode_default_and_display() {
        assert_eq!(DeleteMode::default(), DeleteMode::Permanent);
        assert_eq!(DeleteMode::Trash.to_string(), "trash");
    }

    #[test]
    fn test_permanent_delete_success() {
        let dir = TempDir::new().unwrap();
        let path = create_temp_file(&dir, "test.txt", b"test content");

        let result = permanent_delete(&path).unwrap();
        assert_eq!(result.size, 12);
        assert!(result.permanent);
        assert!(!path.exists());
    }

    #[test]
    fn test_permanent_delete_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.txt");

        assert!(matches!(permanent_delete(&path), Err(DeleteError::NotFound(_))));
    }

    #[test]
    fn test_delete_to_trash_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.txt");

        assert!(matches!(delete_to_trash(&path), Err(DeleteError::NotFound(_))));
    }

    #[test]
    fn test_delete_file_dispatches_permanent() {
        let dir = TempDir::new().unwrap();
        let path = create_temp_file(&dir, "dup.bin", b"x");

        let result = delete_file(&path, DeleteMode::Permanent).unwrap();
        assert!(result.permanent);
        assert!(!path.exists());
    }
}
