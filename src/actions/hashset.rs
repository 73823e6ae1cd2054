//! Known-set generation.
//!
//! Fingerprints every file of one or more trees and writes the distinct
//! fingerprints, one hex digest per line, in the format
//! [`load_known_set`](crate::dedupe::load_known_set) reads back.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{absolute, fingerprint_entries, ActionContext, ActionError, FingerprintTally};
use crate::dedupe::known::write_fingerprints;
use crate::scanner::walker::ensure_directory;
use crate::scanner::{Fingerprint, Hasher};

/// Result of a hashset run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HashsetSummary {
    /// Where the set was written (`None` if interrupted)
    pub output: Option<PathBuf>,
    /// Fingerprints written
    pub fingerprints: usize,
    /// Fingerprinting counters over all trees
    #[serde(flatten)]
    pub tally: FingerprintTally,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
}

/// Fingerprint every file below `roots` and write the distinct set to
/// `output`.
///
/// # Errors
///
/// Fails if a root is not a directory, the worker pool cannot start, or the
/// output cannot be written.
pub fn build_hashset(
    roots: &[PathBuf],
    output: &Path,
    hasher: &Hasher,
    ctx: &ActionContext,
) -> Result<HashsetSummary, ActionError> {
    let roots = roots
        .iter()
        .map(|root| {
            ensure_directory(root)?;
            absolute(root)
        })
        .collect::<Result<Vec<_>, ActionError>>()?;
    let output = absolute(output)?;

    let mut summary = HashsetSummary::default();
    let mut fingerprints: BTreeSet<Fingerprint> = BTreeSet::new();

    for root in &roots {
        let entries = ctx.collect(root, &[output.clone()], &mut summary.tally.failures);
        let complete = !ctx.is_shutdown_requested()
            && fingerprint_entries(&entries, hasher, ctx, &mut summary.tally, |_, fp| {
                fingerprints.insert(fp)
            })?;
        if !complete {
            summary.interrupted = true;
            log::warn!("Interrupted; fingerprint set not written");
            return Ok(summary);
        }
    }

    summary.fingerprints = write_fingerprints(&output, &fingerprints)?;
    summary.output = Some(output);
    log::info!(
        "{} unique files ({} bytes), {} duplicates ({} bytes)",
        summary.tally.unique.files,
        summary.tally.unique.bytes,
        summary.tally.duplicates.files,
        summary.tally.duplicates.bytes
    );
    Ok(summary)
}
