//! Exit codes and structured error reporting.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: every file was handled
/// - 1: a fatal error stopped the run
/// - 3: the run completed but some files were skipped or could not be removed
/// - 130: interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed, nothing left behind.
    Success = 0,
    /// A fatal error stopped the run.
    GeneralError = 1,
    /// Completed with per-file failures.
    PartialSuccess = 3,
    /// Interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Exit code for a finished run.
    #[must_use]
    pub fn from_outcome(interrupted: bool, partial: bool) -> Self {
        if interrupted {
            Self::Interrupted
        } else if partial {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }

    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "TR000",
            Self::GeneralError => "TR001",
            Self::PartialSuccess => "TR003",
            Self::Interrupted => "TR130",
        }
    }
}

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "TR001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// The chain of underlying causes, outermost first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl StructuredError {
    /// Create a structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        }
    }
}
