//! Read-only indexing of a tree.
//!
//! Fingerprints every file below a root (exact mode unless told otherwise)
//! and writes an [`Index`] of `path, fingerprint` records. Nothing under the
//! root is modified. When several files share content, the first one in
//! walk order is the one recorded. Files whose path cannot be written to
//! an index line (not UTF-8, or containing a line break) are reported as
//! failures and left out.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{absolute, fingerprint_entries, ActionContext, ActionError, FingerprintTally};
use crate::consolidate::FileFailure;
use crate::dedupe::index::is_storable;
use crate::dedupe::Index;
use crate::scanner::walker::ensure_directory;
use crate::scanner::Hasher;

/// Result of an index run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexSummary {
    /// Where the index was written (`None` if interrupted)
    pub output: Option<PathBuf>,
    /// Records written
    pub records: usize,
    /// Fingerprinting counters
    #[serde(flatten)]
    pub tally: FingerprintTally,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
}

/// Default index location for `root`: `<root name>.index` in the current
/// directory.
#[must_use]
pub fn default_output(root: &Path) -> PathBuf {
    let name = std::path::absolute(root)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "root".to_string());
    PathBuf::from(format!("{name}.index"))
}

/// Index every file below `root` into `output`.
///
/// Records carry the absolute form of `root` joined with the file's relative
/// path. `output` itself is never indexed.
///
/// # Errors
///
/// Fails if `root` is not a directory, the worker pool cannot start, or the
/// index cannot be written.
pub fn build_index(
    root: &Path,
    output: &Path,
    hasher: &Hasher,
    ctx: &ActionContext,
) -> Result<IndexSummary, ActionError> {
    ensure_directory(root)?;
    let root = absolute(root)?;
    let output = absolute(output)?;

    let mut summary = IndexSummary::default();
    let entries = ctx.collect(&root, &[output.clone()], &mut summary.tally.failures);
    if ctx.is_shutdown_requested() {
        summary.interrupted = true;
        return Ok(summary);
    }

    let (entries, unstorable): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|e| is_storable(&e.path));
    for entry in unstorable {
        log::warn!("Path cannot be indexed: {}", entry.path.display());
        summary.tally.skipped.add(entry.size);
        summary
            .tally
            .failures
            .push(FileFailure::new(&entry.path, "path is not valid UTF-8 text"));
    }

    let mut index = Index::new();
    let complete = fingerprint_entries(&entries, hasher, ctx, &mut summary.tally, |entry, fp| {
        index.insert(fp, entry.path.clone())
    })?;
    if !complete {
        summary.interrupted = true;
        log::warn!("Interrupted; index not written");
        return Ok(summary);
    }

    index.write(&output)?;
    summary.records = index.len();
    summary.output = Some(output);
    Ok(summary)
}
