//! In-place flattening of a tree.
//!
//! Every file below `ROOT` moves to `ROOT/<flat name>`, where the flat name
//! is the sanitized root-relative path. Nothing is deleted or overwritten: a
//! taken name gets a numeric suffix. Emptied directories are removed last.

use std::path::Path;

use serde::Serialize;

use super::{ActionContext, ActionError};
use crate::consolidate::{remove_leftover_dirs, safe_move, FileFailure};
use crate::scanner::flat_name;
use crate::scanner::walker::ensure_directory;

/// Result of a condense run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CondenseSummary {
    /// Files found
    pub files: usize,
    /// Files moved to a new name
    pub moved: usize,
    /// Files whose flat name is their current name
    pub unchanged: usize,
    /// Directories removed afterwards
    pub removed_dirs: usize,
    /// Entries that could not be enumerated
    pub failures: Vec<FileFailure>,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
}

/// Flatten `root` in place.
///
/// # Errors
///
/// Fails if `root` is not a directory or a move fails; files moved before
/// the failure stay at their new names.
pub fn condense(root: &Path, ctx: &ActionContext) -> Result<CondenseSummary, ActionError> {
    ensure_directory(root)?;
    let mut summary = CondenseSummary::default();
    let entries = ctx.collect(root, &[], &mut summary.failures);
    summary.files = entries.len();

    for entry in &entries {
        if ctx.is_shutdown_requested() {
            summary.interrupted = true;
            log::warn!(
                "Interrupted; {} files not condensed",
                summary.files - summary.moved - summary.unchanged
            );
            return Ok(summary);
        }

        let target = root.join(flat_name(&entry.path, root));
        if target == entry.path {
            summary.unchanged += 1;
            continue;
        }
        let landed = safe_move(&entry.path, &target)?;
        log::debug!("{} -> {}", entry.path.display(), landed.display());
        summary.moved += 1;
    }

    summary.removed_dirs = remove_leftover_dirs(root, &[]);
    log::info!(
        "Condensed {}: {} moved, {} unchanged, {} directories removed",
        root.display(),
        summary.moved,
        summary.unchanged,
        summary.removed_dirs
    );
    Ok(summary)
}
