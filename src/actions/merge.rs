//! Merging two consolidated trees.
//!
//! Both trees come with their index. Records are taken primary first, each
//! in index order, through one [`DuplicateFilter`]: the first record of a
//! fingerprint has its file moved into the destination (keeping its path
//! relative to its tree root), every later one has its file removed. A merged
//! index is written to the destination and emptied directories of both trees
//! are removed. The input indexes are left where they are.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{remove_discarded, ActionContext, ActionError};
use crate::consolidate::{
    prepare_destination, remove_leftover_dirs, resolve_source, safe_move, FileFailure, Tally,
};
use crate::dedupe::index::read_records;
use crate::dedupe::{DuplicateFilter, Index, IndexRecord, Verdict};

/// One side of a merge.
#[derive(Debug, Clone)]
pub struct MergeTree {
    /// Tree root
    pub root: PathBuf,
    /// Index describing the tree
    pub index: PathBuf,
}

impl MergeTree {
    /// Pair a tree with its index.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }
}

/// Result of a merge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeSummary {
    /// Where the merged index was written (`None` if interrupted)
    pub index_path: Option<PathBuf>,
    /// Files moved from the primary tree
    pub primary: Tally,
    /// Files moved from the secondary tree
    pub secondary: Tally,
    /// Files removed because their content was already merged
    pub duplicates: Tally,
    /// Records whose file no longer exists
    pub missing: usize,
    /// Records that could not be placed (outside their tree root)
    pub failures: Vec<FileFailure>,
    /// Duplicate files that could not be removed
    pub removal_failures: Vec<FileFailure>,
    /// Emptied directories removed afterwards
    pub removed_dirs: usize,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
}

impl MergeSummary {
    /// Whether some records could not be handled.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() || !self.removal_failures.is_empty()
    }
}

struct Side {
    root: PathBuf,
    records: Vec<IndexRecord>,
}

/// Merge `primary` and `secondary` into `destination`.
///
/// # Errors
///
/// Fails before moving anything if a tree, an index or the destination is
/// unusable; afterwards only a failed move or index write aborts.
pub fn merge(
    primary: &MergeTree,
    secondary: &MergeTree,
    destination: &Path,
    index_name: &str,
    ctx: &ActionContext,
) -> Result<MergeSummary, ActionError> {
    let destination = prepare_destination(destination)?;
    let sides = [primary, secondary]
        .into_iter()
        .map(|tree| {
            Ok(Side {
                root: resolve_source(&tree.root, &destination)?,
                records: read_records(&tree.index)?,
            })
        })
        .collect::<Result<Vec<_>, ActionError>>()?;

    let mut summary = MergeSummary::default();
    let mut filter = DuplicateFilter::default();
    let mut merged = Index::new();

    for (n, side) in sides.iter().enumerate() {
        for record in &side.records {
            if ctx.is_shutdown_requested() {
                summary.interrupted = true;
                log::warn!("Interrupted; merged index not written");
                return Ok(summary);
            }

            let Ok(path) = fs::canonicalize(&record.path) else {
                log::warn!("Indexed file is missing: {}", record.path.display());
                summary.missing += 1;
                continue;
            };

            match filter.admit(record.fingerprint) {
                Verdict::New => {}
                Verdict::Known | Verdict::Duplicate => {
                    if let Some(size) = remove_discarded(
                        &path,
                        "duplicate",
                        ctx.delete_mode,
                        &mut summary.removal_failures,
                    ) {
                        summary.duplicates.add(size);
                    }
                    continue;
                }
            }

            let Ok(relative) = path.strip_prefix(&side.root) else {
                log::warn!(
                    "{} is not below {}; left in place",
                    path.display(),
                    side.root.display()
                );
                summary
                    .failures
                    .push(FileFailure::new(&path, "outside its tree root"));
                continue;
            };

            let size = fs::symlink_metadata(&path).map_or(0, |m| m.len());
            let landed = safe_move(&path, &destination.join(relative))?;
            merged.insert(record.fingerprint, landed);
            if n == 0 {
                summary.primary.add(size);
            } else {
                summary.secondary.add(size);
            }
        }
    }

    let index_path = destination.join(index_name);
    merged.write(&index_path)?;
    summary.index_path = Some(index_path);

    let keep = [destination.clone()];
    for side in &sides {
        summary.removed_dirs += remove_leftover_dirs(&side.root, &keep);
    }
    log::info!(
        "Merged {} + {} files into {}, {} duplicates removed",
        summary.primary.files,
        summary.secondary.files,
        destination.display(),
        summary.duplicates.files
    );
    Ok(summary)
}
