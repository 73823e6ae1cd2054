//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements [`ProgressCallback`]
//! to display progress bars in the terminal while a tree is processed.
//!
//! Phases:
//! - `walking`: enumerating a source tree (spinner, file count)
//! - `fingerprinting`: hashing files without moving them (`index`, `hashset`)
//! - `consolidating`: the full fingerprint, classify and relocate pass
//!
//! # Accessible Mode
//!
//! When accessible mode is enabled, progress reporting uses simplified output:
//! - No spinners or animations
//! - ASCII bars without Unicode block characters

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name for tree enumeration.
pub const PHASE_WALKING: &str = "walking";
/// Phase name for read-only fingerprinting.
pub const PHASE_FINGERPRINTING: &str = "fingerprinting";
/// Phase name for the consolidation pass.
pub const PHASE_CONSOLIDATING: &str = "consolidating";

/// Progress callback for pipeline phases.
///
/// Implement this trait to receive progress updates while trees are
/// walked and processed.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g., "walking", "consolidating")
    /// * `total` - Total number of items to process (0 if unknown)
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Current item number (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when an item has been processed, providing its size.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    walking: Mutex<Option<ProgressBar>>,
    working: Mutex<Option<ProgressBar>>,
    prefix: Mutex<String>,
    quiet: bool,
    accessible: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use tombraider::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self::with_accessible(quiet, false)
    }

    /// Create a new progress reporter with accessible mode.
    #[must_use]
    pub fn with_accessible(quiet: bool, accessible: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            walking: Mutex::new(None),
            working: Mutex::new(None),
            prefix: Mutex::new(String::new()),
            quiet,
            accessible,
        }
    }

    /// Check if accessible mode is enabled.
    #[must_use]
    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    /// Create a style for the walking phase (spinner).
    fn walking_style(&self) -> ProgressStyle {
        if self.accessible {
            ProgressStyle::with_template("{msg} [{elapsed_precise}] {pos} files")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
        } else {
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        }
    }

    /// Create a style for the per-file phases (progress bar with throughput).
    fn working_style(&self) -> ProgressStyle {
        if self.accessible {
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg} {per_sec} (ETA: {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
        } else {
            ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg} {per_sec} (ETA: {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        if phase == PHASE_WALKING {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(self.walking_style());
            pb.set_message("Walking directory");
            // In accessible mode, use a slower tick rate
            let tick_rate = if self.accessible { 500 } else { 100 };
            pb.enable_steady_tick(Duration::from_millis(tick_rate));
            *lock(&self.walking) = Some(pb);
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(self.working_style());
            pb.set_message(match phase {
                PHASE_FINGERPRINTING => "Fingerprinting".to_string(),
                PHASE_CONSOLIDATING => "Consolidating".to_string(),
                other => other.to_string(),
            });
            *lock(&self.working) = Some(pb);
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        let prefix = lock(&self.prefix);
        let display_msg = if prefix.is_empty() {
            truncate_path(path, 30)
        } else {
            format!("{}: {}", *prefix, truncate_path(path, 30))
        };

        if let Some(ref pb) = *lock(&self.working) {
            pb.set_position(current as u64);
            pb.set_message(display_msg);
        } else if let Some(ref pb) = *lock(&self.walking) {
            pb.set_position(current as u64);
            pb.set_message(display_msg);
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        if phase == PHASE_WALKING {
            if let Some(pb) = lock(&self.walking).take() {
                pb.finish_with_message("Walking complete");
            }
        } else if let Some(pb) = lock(&self.working).take() {
            pb.finish_with_message(format!("{phase} complete"));
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        *lock(&self.prefix) = message.to_string();

        if let Some(ref pb) = *lock(&self.working) {
            pb.set_message(message.to_string());
        } else if let Some(ref pb) = *lock(&self.walking) {
            pb.set_message(message.to_string());
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len >= max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{}", file_name)
}
