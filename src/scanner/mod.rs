//! Scanner module for directory traversal, fingerprinting and path flattening.
//!
//! This module provides functionality for:
//! - Deterministic directory walking using jwalk
//! - Content fingerprints with BLAKE3 (exact and sampled modes)
//! - Sanitizing nested relative paths into flat filenames
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 fingerprint engine
//! - [`path_utils`]: `localize` / `sanitize` path flattening
//!
//! # Example
//!
//! ```no_run
//! use tombraider::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("recup_dir"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::path::PathBuf;

// Re-export main types
pub use hasher::{Fingerprint, FingerprintMode, Hasher, HasherConfig};
pub use path_utils::{flat_name, localize, sanitize, FPATH_TRIM_LENGTH};
pub use walker::Walker;

/// Metadata for a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path to the file (rooted at the walked directory)
    pub path: PathBuf,
    /// File size in bytes at discovery time
    pub size: u64,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Paths never yielded: anything equal to or below one of these is skipped.
    ///
    /// Used to keep the destination tree and the index file out of the input.
    pub exclude: Vec<PathBuf>,
}

impl WalkerConfig {
    /// Add a path to exclude from the walk.
    #[must_use]
    pub fn with_exclude(mut self, path: PathBuf) -> Self {
        self.exclude.push(path);
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur while fingerprinting a file.
///
/// All variants are per-file and transient: the file is skipped and left in place.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found (vanished since discovery).
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The file has no content to fingerprint.
    #[error("Empty file: {0}")]
    Empty(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Map an I/O error to the matching variant for `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Empty(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}
