//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for enumerating every regular
//! file below a recovery output directory. Directory reads run in parallel
//! through [`jwalk`], but children are sorted by name so the yielded order is
//! deterministic. The consolidation pass relies on that: the first occurrence
//! of a content wins, so the order must not change between runs.
//!
//! # Features
//!
//! - Parallel directory reads using rayon thread pool, sorted output
//! - Configurable symlink following
//! - Hidden file filtering
//! - Excluded subtrees (the destination tree, the index file)
//! - Graceful shutdown via atomic flag
//!
//! Empty files are yielded; the fingerprint engine reports them and the
//! driver counts them as skipped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{FileEntry, ScanError, WalkerConfig};

/// Directory walker for deterministic file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Root directory to scan
    /// * `config` - Walker configuration options
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker will stop iteration
    /// as soon as possible. This allows for clean Ctrl+C handling.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The directory being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn is_excluded(exclude: &[PathBuf], path: &Path) -> bool {
        exclude.iter().any(|e| path.starts_with(e))
    }

    /// Walk the directory tree, yielding file entries in sorted order.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let exclude = self.config.exclude.clone();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Prune excluded subtrees before jwalk descends into them
                children.retain(|child| match child {
                    Ok(entry) => !Self::is_excluded(&exclude, &entry.path()),
                    Err(_) => true,
                });
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    if path == self.root {
                        return None;
                    }

                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }

                    let is_symlink = file_type.is_symlink();
                    if is_symlink && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    let metadata = if self.config.follow_symlinks {
                        std::fs::metadata(&path)
                    } else {
                        std::fs::symlink_metadata(&path)
                    };

                    let metadata = match metadata {
                        Ok(m) => m,
                        Err(e) => return Some(self.handle_io_error(&path, e)),
                    };

                    // Sockets, fifos and devices are never recovered content
                    if !metadata.is_file() {
                        log::trace!("Skipping non-regular file: {}", path.display());
                        return None;
                    }

                    Some(Ok(FileEntry::new(path, metadata.len())))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(self.handle_jwalk_error(path, e))
                }
            }
        })
    }

    /// Handle I/O errors during file access.
    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> Result<FileEntry, ScanError> {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                Err(ScanError::PermissionDenied(path.to_path_buf()))
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                Err(ScanError::NotFound(path.to_path_buf()))
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                Err(ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                })
            }
        }
    }

    /// Handle jwalk errors.
    fn handle_jwalk_error(
        &self,
        path: PathBuf,
        error: jwalk::Error,
    ) -> Result<FileEntry, ScanError> {
        log::warn!("Walker error for {}: {}", path.display(), error);
        Err(ScanError::Io {
            path,
            source: std::io::Error::other(error.to_string()),
        })
    }
}

/// Validate that `path` exists and is a directory.
///
/// # Errors
///
/// Returns [`ScanError::NotFound`] or [`ScanError::NotADirectory`].
pub fn ensure_directory(path: &Path) -> Result<(), ScanError> {
    match std::fs::metadata(path) {
        Ok(m) if m.is_dir() => Ok(()),
        Ok(_) => Err(ScanError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ScanError::NotFound(path.to_path_buf()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ScanError::PermissionDenied(path.to_path_buf()))
        }
        Err(e) => Err(ScanError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
