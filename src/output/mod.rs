//! Run reports.
//!
//! Every subcommand ends with a summary. [`Report`] wraps them so the binary
//! can derive the exit code and render either format:
//! - [`text`]: a human-readable table for the terminal
//! - [`json`]: machine-readable JSON for scripting
//!
//! # Example
//!
//! ```no_run
//! use tombraider::consolidate::ConsolidateSummary;
//! use tombraider::output::{json::JsonOutput, Report};
//!
//! let report = Report::Process(ConsolidateSummary::default());
//! let output = JsonOutput::new(&report);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

use serde::Serialize;

use crate::actions::{CondenseSummary, HashsetSummary, IndexSummary, MergeSummary, PruneSummary};
use crate::consolidate::ConsolidateSummary;
use crate::error::ExitCode;

pub use json::JsonOutput;
pub use text::TextOutput;

/// The summary of one subcommand.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Report {
    /// `process`
    Process(ConsolidateSummary),
    /// `condense`
    Condense(CondenseSummary),
    /// `index`
    Index(IndexSummary),
    /// `prune`
    Prune(PruneSummary),
    /// `merge`
    Merge(MergeSummary),
    /// `hashset`
    Hashset(HashsetSummary),
}

impl Report {
    /// Whether the run stopped on a shutdown request.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        match self {
            Self::Process(s) => s.interrupted,
            Self::Condense(s) => s.interrupted,
            Self::Index(s) => s.interrupted,
            Self::Prune(s) => s.interrupted,
            Self::Merge(s) => s.interrupted,
            Self::Hashset(s) => s.interrupted,
        }
    }

    /// Whether some files were skipped or could not be removed.
    #[must_use]
    pub fn partial(&self) -> bool {
        match self {
            Self::Process(s) => s.is_partial(),
            Self::Condense(s) => !s.failures.is_empty(),
            Self::Index(s) => !s.tally.failures.is_empty(),
            Self::Prune(s) => !s.removal_failures.is_empty(),
            Self::Merge(s) => s.is_partial(),
            Self::Hashset(s) => !s.tally.failures.is_empty(),
        }
    }

    /// Exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from_outcome(self.interrupted(), self.partial())
    }
}
