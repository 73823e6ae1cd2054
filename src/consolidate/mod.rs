//! Consolidation driver.
//!
//! # Overview
//!
//! One pass over one or more source trees. Every file goes through
//!
//! ```text
//! Discovered -> Fingerprinted -> Discarded(known | duplicate)
//!                             -> Classified -> Discarded(blacklisted)
//!                                           -> Relocated
//! ```
//!
//! Fingerprints are computed in parallel one chunk at a time (see
//! [`pool`]); every decision after that is applied on the calling thread in
//! enumeration order, so the found set and the index are consistent after
//! each file. Survivors are moved to `<dest>/<Category>/<flat name>` and
//! recorded in the [`Index`], which is written once the pass completes.
//! Emptied source directories are removed at the end.
//!
//! Sources are processed in the order given: when two trees hold the same
//! content, the copy from the earlier tree is the one kept. Pass the tree
//! whose entries carry the most metadata first (TestDisk before PhotoRec).
//!
//! A fingerprint joins the found set only when its file is relocated, so
//! every copy of blacklisted content is counted as blacklisted. Sampled
//! fingerprints that are not known are confirmed against the known set with
//! a whole-file digest before the file is kept.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tombraider::classify::{Classifier, ClassifierConfig, ClassifierTables};
//! use tombraider::consolidate::{ConsolidateConfig, Consolidator};
//!
//! let classifier = Classifier::new(ClassifierTables::builtin()?, ClassifierConfig::default());
//! let config = ConsolidateConfig::new(PathBuf::from("recovered"));
//! let mut consolidator = Consolidator::new(config, classifier);
//!
//! let summary = consolidator.run(&[PathBuf::from("testdisk"), PathBuf::from("photorec")])?;
//! println!("Relocated {} files", summary.relocated.files);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod pool;
pub mod relocate;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::actions::delete::{delete_file, DeleteMode};
use crate::classify::{Category, Classifier};
use crate::dedupe::index::is_storable;
use crate::dedupe::{Blacklist, DuplicateFilter, Index, IndexError, Verdict};
use crate::progress::{ProgressCallback, PHASE_CONSOLIDATING, PHASE_WALKING};
use crate::scanner::walker::ensure_directory;
use crate::scanner::{
    flat_name, FileEntry, Fingerprint, HashError, Hasher, ScanError, Walker, WalkerConfig,
};

pub use pool::{FingerprintPool, PoolRun, DEFAULT_CHUNK_SIZE, DEFAULT_IO_THREADS};
pub use relocate::{available_path, remove_leftover_dirs, safe_move, RelocateError};

/// Default index file name inside the destination.
pub const DEFAULT_INDEX_NAME: &str = "filesystem.index";

/// Errors that abort a consolidation run.
#[derive(thiserror::Error, Debug)]
pub enum ConsolidateError {
    /// A source tree is missing or unreadable.
    #[error(transparent)]
    Source(#[from] ScanError),

    /// A source lies inside the destination.
    #[error("Source {root} is inside the destination {destination}")]
    SourceInsideDestination {
        /// The source tree
        root: PathBuf,
        /// The destination root
        destination: PathBuf,
    },

    /// The destination could not be created or resolved.
    #[error("Cannot prepare destination {path}: {source}")]
    Destination {
        /// The destination root
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The worker pool could not be started.
    #[error("Cannot start fingerprint workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A survivor could not be moved into place.
    #[error(transparent)]
    Relocate(#[from] RelocateError),

    /// The index could not be written.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A file that could not be processed or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// The file
    pub path: PathBuf,
    /// What went wrong
    pub reason: String,
}

impl FileFailure {
    /// Record a failure for `path`.
    pub fn new(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// A file count with the bytes those files hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Number of files
    pub files: usize,
    /// Total size in bytes
    pub bytes: u64,
}

impl Tally {
    /// Count one file of `size` bytes.
    pub fn add(&mut self, size: u64) {
        self.files += 1;
        self.bytes = self.bytes.saturating_add(size);
    }
}

/// Result of a consolidation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidateSummary {
    /// Resolved source roots, in processing order
    pub sources: Vec<PathBuf>,
    /// Resolved destination root
    pub destination: PathBuf,
    /// Where the index was written (`None` if the run did not complete)
    pub index_path: Option<PathBuf>,
    /// Every enumerated file
    pub total: Tally,
    /// Discarded because the known set holds their fingerprint
    pub known: Tally,
    /// Discarded as repeats of content kept earlier in the run
    pub duplicates: Tally,
    /// Classified into a blacklisted category and discarded
    pub blacklisted: Tally,
    /// Moved into the destination
    pub relocated: Tally,
    /// Left in place because they could not be read
    pub skipped: Tally,
    /// Zero-length files, left in place
    pub empty: usize,
    /// Classified files per category, blacklisted ones included
    pub categories: BTreeMap<Category, usize>,
    /// Files that could not be enumerated or read
    pub failures: Vec<FileFailure>,
    /// Discarded files that could not be removed
    pub removal_failures: Vec<FileFailure>,
    /// Emptied source directories removed at the end
    pub removed_dirs: usize,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
    /// Wall time of the run
    pub duration: Duration,
}

impl ConsolidateSummary {
    /// Files discarded for any reason.
    #[must_use]
    pub fn discarded(&self) -> Tally {
        Tally {
            files: self.known.files + self.duplicates.files + self.blacklisted.files,
            bytes: self.known.bytes + self.duplicates.bytes + self.blacklisted.bytes,
        }
    }

    /// Whether the run completed but some files were skipped or not removed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() || !self.removal_failures.is_empty()
    }
}

/// Settings for a consolidation run.
#[derive(Clone)]
pub struct ConsolidateConfig {
    /// Destination root
    pub destination: PathBuf,
    /// Index file name inside the destination
    pub index_name: String,
    /// Fingerprinting workers
    pub io_threads: usize,
    /// Files fingerprinted per chunk
    pub chunk_size: usize,
    /// How discarded files are removed
    pub delete_mode: DeleteMode,
    /// Walker settings shared by every source
    pub walker: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ConsolidateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidateConfig")
            .field("destination", &self.destination)
            .field("index_name", &self.index_name)
            .field("io_threads", &self.io_threads)
            .field("chunk_size", &self.chunk_size)
            .field("delete_mode", &self.delete_mode)
            .field("walker", &self.walker)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ConsolidateConfig {
    /// Default settings for `destination`.
    #[must_use]
    pub fn new(destination: PathBuf) -> Self {
        Self {
            destination,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            io_threads: DEFAULT_IO_THREADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            delete_mode: DeleteMode::default(),
            walker: WalkerConfig::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the index file name.
    #[must_use]
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
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

    /// Set how discarded files are removed.
    #[must_use]
    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    /// Set the walker settings.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker = config;
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
}

/// Check whether `flag` is set.
pub(crate) fn is_shutdown_requested(flag: Option<&Arc<AtomicBool>>) -> bool {
    flag.is_some_and(|f| f.load(Ordering::SeqCst))
}

/// Enumerate the regular files below `root`, reporting the walking phase.
///
/// Unreadable entries are logged and appended to `failures`.
pub fn collect_files(
    root: &Path,
    config: &WalkerConfig,
    shutdown: Option<&Arc<AtomicBool>>,
    progress: Option<&Arc<dyn ProgressCallback>>,
    failures: &mut Vec<FileFailure>,
) -> Vec<FileEntry> {
    let mut walker = Walker::new(root, config.clone());
    if let Some(flag) = shutdown {
        walker = walker.with_shutdown_flag(Arc::clone(flag));
    }

    if let Some(cb) = progress {
        cb.on_phase_start(PHASE_WALKING, 0);
        cb.on_message(&root.display().to_string());
    }

    let mut files = Vec::new();
    for entry in walker.walk() {
        match entry {
            Ok(file) => {
                files.push(file);
                if let Some(cb) = progress {
                    if let Some(last) = files.last() {
                        cb.on_progress(files.len(), &last.path.to_string_lossy());
                    }
                }
            }
            Err(e) => {
                log::warn!("{}", e);
                failures.push(FileFailure::new(e.path(), &e));
            }
        }
    }

    if let Some(cb) = progress {
        cb.on_phase_end(PHASE_WALKING);
    }
    log::info!("Found {} files under {}", files.len(), root.display());
    files
}

/// Create `path` if needed and return its canonical form.
///
/// # Errors
///
/// Returns [`ConsolidateError::Destination`] if it cannot be created or
/// resolved, and [`ConsolidateError::Index`] if its path cannot be stored in
/// an index.
pub fn prepare_destination(path: &Path) -> Result<PathBuf, ConsolidateError> {
    let destination = fs::create_dir_all(path)
        .and_then(|()| fs::canonicalize(path))
        .map_err(|e| ConsolidateError::Destination {
            path: path.to_path_buf(),
            source: e,
        })?;
    // Every relocated path starts with the destination and lands in the index.
    if !is_storable(&destination) {
        return Err(IndexError::UnrepresentablePath(destination).into());
    }
    Ok(destination)
}

/// Validate a source tree and return its canonical form.
///
/// # Errors
///
/// Fails if the source is not a readable directory or lies inside
/// `destination`.
pub fn resolve_source(path: &Path, destination: &Path) -> Result<PathBuf, ConsolidateError> {
    ensure_directory(path)?;
    let root = fs::canonicalize(path).map_err(|e| ScanError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if root.starts_with(destination) {
        return Err(ConsolidateError::SourceInsideDestination {
            root,
            destination: destination.to_path_buf(),
        });
    }
    Ok(root)
}

/// The consolidation pipeline.
pub struct Consolidator {
    config: ConsolidateConfig,
    hasher: Hasher,
    classifier: Classifier,
    filter: DuplicateFilter,
    blacklist: Blacklist,
}

impl std::fmt::Debug for Consolidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidator")
            .field("config", &self.config)
            .field("hasher", &self.hasher)
            .field("classifier", &self.classifier)
            .field("filter", &self.filter)
            .field("blacklist", &self.blacklist)
            .finish()
    }
}

impl Consolidator {
    /// Create a driver with a fast-mode hasher, an empty known set and no
    /// blacklist.
    #[must_use]
    pub fn new(config: ConsolidateConfig, classifier: Classifier) -> Self {
        Self {
            config,
            hasher: Hasher::new(),
            classifier,
            filter: DuplicateFilter::default(),
            blacklist: Blacklist::new(),
        }
    }

    /// Replace the fingerprint engine.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Replace the duplicate filter (and with it the known set).
    #[must_use]
    pub fn with_filter(mut self, filter: DuplicateFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the blacklist.
    #[must_use]
    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Run one pass over `sources`, in order.
    ///
    /// # Errors
    ///
    /// Fails before touching any file if a source or the destination is
    /// unusable. Once files are moving, only a failed move or a failed index
    /// write aborts the run; the destination is then partially populated and
    /// the index absent.
    pub fn run(&mut self, sources: &[PathBuf]) -> Result<ConsolidateSummary, ConsolidateError> {
        let start_time = Instant::now();
        let destination = prepare_destination(&self.config.destination)?;
        let index_path = destination.join(&self.config.index_name);
        let roots = sources
            .iter()
            .map(|s| resolve_source(s, &destination))
            .collect::<Result<Vec<_>, _>>()?;

        let pool = FingerprintPool::new(
            self.hasher.clone(),
            self.config.io_threads,
            self.config.chunk_size,
        )?;
        let shutdown = self.config.shutdown_flag.clone();
        let progress = self.config.progress_callback.clone();
        let walker_config = self
            .config
            .walker
            .clone()
            .with_exclude(destination.clone())
            .with_exclude(index_path.clone());

        log::info!(
            "Consolidating {} source(s) into {} ({} mode, {} workers)",
            roots.len(),
            destination.display(),
            self.hasher.mode(),
            self.config.io_threads
        );

        let mut summary = ConsolidateSummary {
            sources: roots.clone(),
            destination: destination.clone(),
            ..ConsolidateSummary::default()
        };
        let mut index = Index::new();

        for root in &roots {
            let entries = collect_files(
                root,
                &walker_config,
                shutdown.as_ref(),
                progress.as_ref(),
                &mut summary.failures,
            );
            if is_shutdown_requested(shutdown.as_ref()) {
                summary.interrupted = true;
                break;
            }

            if let Some(cb) = &progress {
                cb.on_phase_start(PHASE_CONSOLIDATING, entries.len());
                cb.on_message(&root.display().to_string());
            }
            let mut processed = 0;
            let run = pool.run(&entries, shutdown.as_deref(), |entry, result| {
                processed += 1;
                if let Some(cb) = &progress {
                    cb.on_progress(processed, &entry.path.to_string_lossy());
                }
                self.apply(root, &destination, entry, result, &mut index, &mut summary)?;
                if let Some(cb) = &progress {
                    cb.on_item_completed(entry.size);
                }
                Ok::<(), ConsolidateError>(())
            })?;
            if let Some(cb) = &progress {
                cb.on_phase_end(PHASE_CONSOLIDATING);
            }

            if run == PoolRun::Interrupted {
                summary.interrupted = true;
                break;
            }
        }

        if summary.interrupted {
            log::warn!("Interrupted; index not written, re-run to complete");
            summary.duration = start_time.elapsed();
            return Ok(summary);
        }

        index.write(&index_path)?;
        summary.index_path = Some(index_path);

        let keep = [destination.clone()];
        for root in &roots {
            summary.removed_dirs += remove_leftover_dirs(root, &keep);
        }

        summary.duration = start_time.elapsed();
        log::info!(
            "Done: {} relocated, {} known, {} duplicates, {} blacklisted, {} skipped",
            summary.relocated.files,
            summary.known.files,
            summary.duplicates.files,
            summary.blacklisted.files,
            summary.skipped.files
        );
        Ok(summary)
    }

    fn apply(
        &mut self,
        root: &Path,
        destination: &Path,
        entry: &FileEntry,
        result: Result<Fingerprint, HashError>,
        index: &mut Index,
        summary: &mut ConsolidateSummary,
    ) -> Result<(), ConsolidateError> {
        summary.total.add(entry.size);

        let fingerprint = match result {
            Ok(fingerprint) => fingerprint,
            Err(HashError::Empty(path)) => {
                log::debug!("Skipping empty file {}", path.display());
                summary.empty += 1;
                return Ok(());
            }
            Err(e) => {
                log::warn!("Skipping unreadable file: {}", e);
                summary.skipped.add(entry.size);
                summary.failures.push(FileFailure::new(&entry.path, &e));
                return Ok(());
            }
        };

        let verdict = match self.filter.check(&fingerprint) {
            Verdict::New if self.hasher.is_sampled(entry.size) => {
                match self.filter.is_known_content(&entry.path, &self.hasher) {
                    Ok(true) => Verdict::Known,
                    Ok(false) => Verdict::New,
                    Err(e) => {
                        log::warn!("Skipping unreadable file: {}", e);
                        summary.skipped.add(entry.size);
                        summary.failures.push(FileFailure::new(&entry.path, &e));
                        return Ok(());
                    }
                }
            }
            verdict => verdict,
        };
        match verdict {
            Verdict::Known => {
                summary.known.add(entry.size);
                self.discard(entry, "known", summary);
                return Ok(());
            }
            Verdict::Duplicate => {
                summary.duplicates.add(entry.size);
                self.discard(entry, "duplicate", summary);
                return Ok(());
            }
            Verdict::New => {}
        }

        let category = self.classifier.classify_with_size(&entry.path, entry.size);
        *summary.categories.entry(category).or_default() += 1;

        if self.blacklist.contains(category) {
            summary.blacklisted.add(entry.size);
            self.discard(entry, category.label(), summary);
            return Ok(());
        }

        let target = destination
            .join(category.label())
            .join(flat_name(&entry.path, root));
        let landed = safe_move(&entry.path, &target)?;
        log::debug!("{} -> {}", entry.path.display(), landed.display());

        self.filter.record(fingerprint);
        index.insert(fingerprint, landed);
        summary.relocated.add(entry.size);
        Ok(())
    }

    fn discard(&self, entry: &FileEntry, reason: &str, summary: &mut ConsolidateSummary) {
        match delete_file(&entry.path, self.config.delete_mode) {
            Ok(_) => log::debug!("Removed {} file {}", reason, entry.path.display()),
            Err(e) => {
                log::warn!("Could not remove {} file: {}", reason, e);
                summary.removal_failures.push(FileFailure::new(&entry.path, &e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ClassifierConfig, ClassifierTables};
    use crate::dedupe::ExactKnownSet;
    use tempfile::TempDir;

    const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00";

    fn classifier() -> Classifier {
        Classifier::new(
            ClassifierTables::builtin().unwrap(),
            ClassifierConfig::default(),
        )
    }

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn jpeg(size: usize, seed: u8) -> Vec<u8> {
        let mut data = JPEG.to_vec();
        data.resize(size, seed);
        data
    }

    fn consolidator(dest: &Path) -> Consolidator {
        Consolidator::new(
            ConsolidateConfig::new(dest.to_path_buf()).with_chunk_size(2),
            classifier(),
        )
    }

    #[test]
    fn test_relocates_by_category_and_writes_index() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("out");
        write(&src.join("photos/my trip/IMG 1.jpg"), &jpeg(60_000, 1));
        write(&src.join("notes.txt"), b"plain words\n");

        let summary = consolidator(&dest).run(&[src.clone()]).unwrap();

        assert_eq!(summary.relocated.files, 2);
        assert!(!summary.is_partial());
        let dest = fs::canonicalize(&dest).unwrap();
        let image = dest.join("Images/photos|my_trip|IMG_1.jpg");
        assert!(image.exists());
        assert!(dest.join("Documents/notes.txt").exists());

        let index = Index::read(&dest.join(DEFAULT_INDEX_NAME)).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.iter().any(|(_, p)| p == image));

        // Emptied source directories are gone, the root stays.
        assert!(!src.join("photos").exists());
        assert!(src.exists());
    }

    #[test]
    fn test_duplicate_across_trees_keeps_first_source() {
        let dir = TempDir::new().unwrap();
        let rich = dir.path().join("testdisk");
        let poor = dir.path().join("photorec");
        let dest = dir.path().join("out");
        write(&rich.join("a.txt"), b"same content\n");
        write(&poor.join("b.txt"), b"same content\n");

        let summary = consolidator(&dest).run(&[rich.clone(), poor.clone()]).unwrap();

        assert_eq!(summary.relocated.files, 1);
        assert_eq!(summary.duplicates.files, 1);
        assert!(!poor.join("b.txt").exists());

        let dest = fs::canonicalize(&dest).unwrap();
        let index = Index::read(&dest.join(DEFAULT_INDEX_NAME)).unwrap();
        assert_eq!(index.len(), 1);
        let (_, kept) = index.iter().next().unwrap();
        assert_eq!(kept, dest.join("Documents/a.txt"));
    }

    #[test]
    fn test_known_files_are_removed() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("out");
        write(&src.join("system.dll"), b"MZ common library");
        write(&src.join("mine.txt"), b"keep me\n");

        let known_fp = Hasher::new().fingerprint(&src.join("system.dll")).unwrap();
        let known: ExactKnownSet = [known_fp].into_iter().collect();

        let summary = consolidator(&dest)
            .with_filter(DuplicateFilter::new(Box::new(known)))
            .run(&[src.clone()])
            .unwrap();

        assert_eq!(summary.known.files, 1);
        assert_eq!(summary.relocated.files, 1);
        assert!(!src.join("system.dll").exists());
        assert!(!summary.categories.contains_key(&Category::Programs));
    }

    #[test]
    fn test_blacklisted_category_is_classified_then_removed() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("out");
        write(&src.join("icon.png"), b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR tiny");

        let summary = consolidator(&dest)
            .with_blacklist(Blacklist::from_labels(["Small_Images"]).unwrap())
            .run(&[src.clone()])
            .unwrap();

        assert_eq!(summary.blacklisted.files, 1);
        assert_eq!(summary.categories.get(&Category::SmallImages), Some(&1));
        assert!(!src.join("icon.png").exists());
        assert!(!dest.join("Small_Images").exists());
    }

    #[test]
    fn test_whole_file_digest_known_set_matches_sampled_run() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("out");
        write(&src.join("big.jpg"), &jpeg(100_000, 3));
        write(&src.join("other.jpg"), &jpeg(100_000, 4));

        let exact = Hasher::new().full_hash(&src.join("big.jpg")).unwrap();
        let known: ExactKnownSet = [exact].into_iter().collect();

        let summary = consolidator(&dest)
            .with_filter(DuplicateFilter::new(Box::new(known)))
            .run(&[src.clone()])
            .unwrap();

        assert_eq!(summary.known.files, 1);
        assert_eq!(summary.relocated.files, 1);
        assert!(!src.join("big.jpg").exists());
        let dest = fs::canonicalize(&dest).unwrap();
        assert!(!dest.join("Images/big.jpg").exists());
        assert!(dest.join("Images/other.jpg").exists());
    }

    #[test]
    fn test_every_blacklisted_copy_counts_as_blacklisted() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("out");
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR tiny";
        write(&src.join("a.png"), png);
        write(&src.join("b.png"), png);

        let summary = consolidator(&dest)
            .with_blacklist(Blacklist::from_labels(["Small_Images"]).unwrap())
            .run(&[src.clone()])
            .unwrap();

        assert_eq!(summary.blacklisted.files, 2);
        assert_eq!(summary.duplicates.files, 0);
        assert_eq!(summary.categories.get(&Category::SmallImages), Some(&2));
        assert!(!src.join("b.png").exists());
    }

    #[test]
    fn test_collision_gets_numeric_suffix() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("out");
        write(&src.join("a.txt"), b"new content\n");
        write(&dest.join("Documents/a.txt"), b"already here\n");

        let summary = consolidator(&dest).run(&[src]).unwrap();

        assert_eq!(summary.relocated.files, 1);
        let dest = fs::canonicalize(&dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("Documents/a.txt")).unwrap(),
            "already here\n"
        );
        assert_eq!(
            fs::read_to_string(dest.join("Documents/a.txt.1")).unwrap(),
            "new content\n"
        );
    }

    #[test]
    fn test_empty_files_are_left_in_place() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("empty.jpg"), b"");

        let summary = consolidator(&dir.path().join("out")).run(&[src.clone()]).unwrap();

        assert_eq!(summary.empty, 1);
        assert_eq!(summary.relocated.files, 0);
        assert!(!summary.is_partial());
        assert!(src.join("empty.jpg").exists());
    }

    #[test]
    fn test_destination_inside_source_is_not_walked() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = src.join("out");
        write(&src.join("a.txt"), b"alpha\n");
        write(&dest.join("Documents/old.txt"), b"previous run\n");

        let summary = consolidator(&dest).run(&[src.clone()]).unwrap();

        assert_eq!(summary.total.files, 1);
        assert!(dest.join("Documents/old.txt").exists());
        assert!(dest.join("Documents/a.txt").exists());
    }

    #[test]
    fn test_source_inside_destination_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out");
        let src = dest.join("Images");
        fs::create_dir_all(&src).unwrap();

        let err = consolidator(&dest).run(&[src]).unwrap_err();
        assert!(matches!(err, ConsolidateError::SourceInsideDestination { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_destination_fails_before_moving() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.txt"), b"alpha\n");
        let dest = dir.path().join(OsStr::from_bytes(b"out\xff"));
        if fs::create_dir(&dest).is_err() {
            return;
        }

        let result = consolidator(&dest).run(&[src.clone()]);
        assert!(matches!(
            result,
            Err(ConsolidateError::Index(IndexError::UnrepresentablePath(_)))
        ));
        assert!(src.join("a.txt").exists());
    }

    #[test]
    fn test_missing_source_fails_before_moving() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good");
        write(&good.join("a.txt"), b"alpha\n");

        let err = consolidator(&dir.path().join("out"))
            .run(&[good.clone(), dir.path().join("missing")])
            .unwrap_err();

        assert!(matches!(err, ConsolidateError::Source(ScanError::NotFound(_))));
        assert!(good.join("a.txt").exists());
    }

    #[test]
    fn test_interrupted_run_skips_index() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("out");
        write(&src.join("a.txt"), b"alpha\n");

        let flag = Arc::new(AtomicBool::new(true));
        let config = ConsolidateConfig::new(dest.clone()).with_shutdown_flag(flag);
        let summary = Consolidator::new(config, classifier())
            .run(&[src.clone()])
            .unwrap();

        assert!(summary.interrupted);
        assert!(summary.index_path.is_none());
        assert!(!dest.join(DEFAULT_INDEX_NAME).exists());
        assert!(src.join("a.txt").exists());
    }

    #[test]
    fn test_summary_discarded_and_partial() {
        let mut summary = ConsolidateSummary::default();
        summary.known.add(10);
        summary.duplicates.add(5);
        summary.blacklisted.add(1);
        assert_eq!(summary.discarded(), Tally { files: 3, bytes: 16 });
        assert!(!summary.is_partial());

        summary
            .removal_failures
            .push(FileFailure::new(Path::new("/x"), "busy"));
        assert!(summary.is_partial());
    }
}
