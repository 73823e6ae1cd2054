//! File actions module.
//!
//! This module provides the tools built around the consolidation pipeline:
//! - [`delete`]: removal of discarded files (permanent or system trash)
//! - [`condense`]: flatten a tree in place
//! - [`index`]: write a fingerprint index of a tree without touching it
//! - [`prune`]: drop known and repeated content listed in an index
//! - [`merge`]: combine two consolidated, indexed trees
//! - [`hashset`]: produce a known-set file from one or more trees
//!
//! They share an [`ActionContext`] carrying the walker settings, worker pool
//! size, delete mode, shutdown flag and progress callback.
//!
//! ```no_run
//! use std::path::Path;
//! use tombraider::actions::{condense::condense, ActionContext};
//!
//! let summary = condense(Path::new("recup_dir.1"), &ActionContext::default())?;
//! println!("Moved {} files", summary.moved);
//! # Ok::<(), tombraider::actions::ActionError>(())
//! ```

pub mod condense;
pub mod delete;
pub mod hashset;
pub mod index;
pub mod merge;
pub mod prune;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::consolidate::{
    collect_files, is_shutdown_requested, ConsolidateError, FileFailure, FingerprintPool, PoolRun,
    RelocateError, Tally, DEFAULT_CHUNK_SIZE, DEFAULT_IO_THREADS,
};
use crate::dedupe::{IndexError, KnownSetError};
use crate::progress::{ProgressCallback, PHASE_FINGERPRINTING};
use crate::scanner::{FileEntry, Fingerprint, HashError, Hasher, ScanError, WalkerConfig};

// Re-export commonly used types
pub use condense::{condense, CondenseSummary};
pub use delete::{delete_file, delete_to_trash, permanent_delete, DeleteError, DeleteMode, DeleteResult};
pub use hashset::{build_hashset, HashsetSummary};
pub use index::{build_index, IndexSummary};
pub use merge::{merge, MergeSummary, MergeTree};
pub use prune::{prune, PruneSummary};

/// Errors that abort an action.
#[derive(thiserror::Error, Debug)]
pub enum ActionError {
    /// A tree is missing or unreadable.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Setting up the run failed.
    #[error(transparent)]
    Consolidate(#[from] ConsolidateError),

    /// A file could not be moved into place.
    #[error(transparent)]
    Relocate(#[from] RelocateError),

    /// An index could not be read or written.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// A fingerprint list could not be written.
    #[error(transparent)]
    KnownSet(#[from] KnownSetError),

    /// The worker pool could not be started.
    #[error("Cannot start fingerprint workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A path could not be made absolute.
    #[error("Cannot resolve {path}: {source}")]
    Resolve {
        /// The path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Settings shared by every action.
#[derive(Clone)]
pub struct ActionContext {
    /// Walker settings
    pub walker: WalkerConfig,
    /// Fingerprinting workers
    pub io_threads: usize,
    /// Files fingerprinted per chunk
    pub chunk_size: usize,
    /// How files are removed
    pub delete_mode: DeleteMode,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("walker", &self.walker)
            .field("io_threads", &self.io_threads)
            .field("chunk_size", &self.chunk_size)
            .field("delete_mode", &self.delete_mode)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ActionContext {
    fn default() -> Self {
        Self {
            walker: WalkerConfig::default(),
            io_threads: DEFAULT_IO_THREADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            delete_mode: DeleteMode::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ActionContext {
    /// Set the walker settings.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker = config;
        self
    }

    /// Set the number of fingerprinting workers.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set how files are removed.
    #[must_use]
    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        is_shutdown_requested(self.shutdown_flag.as_ref())
    }

    /// Enumerate the files below `root`, skipping `exclude`.
    pub(crate) fn collect(
        &self,
        root: &Path,
        exclude: &[PathBuf],
        failures: &mut Vec<FileFailure>,
    ) -> Vec<FileEntry> {
        let mut walker = self.walker.clone();
        walker.exclude.extend(exclude.iter().cloned());
        collect_files(
            root,
            &walker,
            self.shutdown_flag.as_ref(),
            self.progress_callback.as_ref(),
            failures,
        )
    }
}

/// Outcome counters for read-only fingerprinting passes.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FingerprintTally {
    /// Distinct contents
    pub unique: Tally,
    /// Repeats of content seen earlier
    pub duplicates: Tally,
    /// Unreadable files
    pub skipped: Tally,
    /// Zero-length files
    pub empty: usize,
    /// Files that could not be enumerated or read
    pub failures: Vec<FileFailure>,
}

/// Fingerprint `entries` in order, handing each readable, non-empty file to
/// `visit`, which reports whether its content is new.
///
/// Returns `true` if every entry was visited.
pub(crate) fn fingerprint_entries<F>(
    entries: &[FileEntry],
    hasher: &Hasher,
    ctx: &ActionContext,
    tally: &mut FingerprintTally,
    mut visit: F,
) -> Result<bool, ActionError>
where
    F: FnMut(&FileEntry, Fingerprint) -> bool,
{
    let pool = FingerprintPool::new(hasher.clone(), ctx.io_threads, ctx.chunk_size)?;
    let progress = ctx.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_phase_start(PHASE_FINGERPRINTING, entries.len());
    }

    let mut processed = 0;
    let run = pool.run(
        entries,
        ctx.shutdown_flag.as_deref(),
        |entry, result| -> Result<(), ActionError> {
            processed += 1;
            if let Some(cb) = progress {
                cb.on_progress(processed, &entry.path.to_string_lossy());
            }
            match result {
                Ok(fingerprint) => {
                    if visit(entry, fingerprint) {
                        tally.unique.add(entry.size);
                    } else {
                        tally.duplicates.add(entry.size);
                    }
                }
                Err(HashError::Empty(_)) => tally.empty += 1,
                Err(e) => {
                    log::warn!("Skipping unreadable file: {}", e);
                    tally.skipped.add(entry.size);
                    tally.failures.push(FileFailure::new(&entry.path, &e));
                }
            }
            if let Some(cb) = progress {
                cb.on_item_completed(entry.size);
            }
            Ok(())
        },
    )?;

    if let Some(cb) = progress {
        cb.on_phase_end(PHASE_FINGERPRINTING);
    }
    Ok(run == PoolRun::Completed)
}

/// Make `path` absolute without resolving symlinks.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf, ActionError> {
    std::path::absolute(path).map_err(|e| ActionError::Resolve {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Remove `path` for `reason`, recording a failure.
///
/// Returns the removed size, or `None` when the file was already gone or
/// could not be removed.
pub(crate) fn remove_discarded(
    path: &Path,
    reason: &str,
    mode: DeleteMode,
    removal_failures: &mut Vec<FileFailure>,
) -> Option<u64> {
    match delete_file(path, mode) {
        Ok(result) => {
            log::debug!("Removed {} file {}", reason, path.display());
            Some(result.size)
        }
        Err(DeleteError::NotFound(_)) => {
            log::debug!("Already gone: {}", path.display());
            None
        }
        Err(e) => {
            log::warn!("Could not remove {} file: {}", reason, e);
            removal_failures.push(FileFailure::new(path, &e));
            None
        }
    }
}
