//! Pruning of an existing index.
//!
//! Walks the records of an index in file order. A record whose fingerprint is
//! in the known set, or repeats one seen earlier in the index, has its file
//! removed. The index is then rewritten with the survivors.
//!
//! Index fingerprints may be sampled (an index written by a fast-mode
//! `process` run), so a record that is not known and whose file is larger
//! than two samples is confirmed against the known set by its whole-file
//! digest.

use std::fs;
use std::path::Path;

use serde::Serialize;

use super::{remove_discarded, ActionContext, ActionError};
use crate::consolidate::{FileFailure, Tally};
use crate::dedupe::index::read_records;
use crate::dedupe::{DuplicateFilter, Index, Verdict};
use crate::scanner::Hasher;

/// Result of a prune run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneSummary {
    /// Records read
    pub records: usize,
    /// Records kept
    pub kept: usize,
    /// Files removed because their content is known
    pub known: Tally,
    /// Files removed as repeats of an earlier record
    pub duplicates: Tally,
    /// Discarded records whose file was already gone
    pub missing: usize,
    /// Discarded files that could not be removed
    pub removal_failures: Vec<FileFailure>,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
}

/// Prune the index at `index_path` through `filter`.
///
/// `hasher` supplies the sample size and computes whole-file digests for
/// records that need confirming.
///
/// # Errors
///
/// Fails if the index cannot be read, is malformed, or cannot be rewritten.
pub fn prune(
    index_path: &Path,
    mut filter: DuplicateFilter,
    hasher: &Hasher,
    ctx: &ActionContext,
) -> Result<PruneSummary, ActionError> {
    let records = read_records(index_path)?;
    let mut summary = PruneSummary {
        records: records.len(),
        ..PruneSummary::default()
    };
    let mut survivors = Vec::with_capacity(records.len());

    for record in records {
        if ctx.is_shutdown_requested() {
            summary.interrupted = true;
            log::warn!("Interrupted; index left unchanged");
            return Ok(summary);
        }

        let verdict = match filter.check(&record.fingerprint) {
            Verdict::New if is_known_content(&filter, &record.path, hasher) => Verdict::Known,
            verdict => verdict,
        };
        let (reason, tally) = match verdict {
            Verdict::New => {
                filter.record(record.fingerprint);
                survivors.push(record);
                continue;
            }
            Verdict::Known => ("known", &mut summary.known),
            Verdict::Duplicate => ("duplicate", &mut summary.duplicates),
        };
        match remove_discarded(
            &record.path,
            reason,
            ctx.delete_mode,
            &mut summary.removal_failures,
        ) {
            Some(size) => tally.add(size),
            None if !record.path.exists() => summary.missing += 1,
            None => {}
        }
    }

    summary.kept = survivors.len();
    Index::from_records(survivors).write(index_path)?;
    log::info!(
        "Pruned {}: kept {}, removed {} known and {} duplicate files",
        index_path.display(),
        summary.kept,
        summary.known.files,
        summary.duplicates.files
    );
    Ok(summary)
}

/// Whole-file confirmation for a record whose fingerprint may be sampled.
/// An unreadable file is kept.
fn is_known_content(filter: &DuplicateFilter, path: &Path, hasher: &Hasher) -> bool {
    if filter.known().is_empty() {
        return false;
    }
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !hasher.samples(metadata.len()) {
        return false;
    }
    filter.is_known_content(path, hasher).unwrap_or_else(|e| {
        log::warn!("Keeping unconfirmed record: {}", e);
        false
    })
}
