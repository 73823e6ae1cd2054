//! JSON report formatter.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "report": {
//!     "command": "process",
//!     "destination": "/mnt/sorted",
//!     "total": { "files": 1200, "bytes": 73400320 },
//!     "categories": { "Images": 412, "Small_Images": 96 },
//!     "interrupted": false
//!   },
//!   "exit_code": 0,
//!   "exit_code_name": "TR000"
//! }
//! ```
//!
//! The `report` object carries every field of the subcommand's summary.

use std::io::Write;

use serde::Serialize;

use super::Report;

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    /// The subcommand summary
    pub report: &'a Report,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "TR000")
    pub exit_code_name: &'static str,
}

impl<'a> JsonOutput<'a> {
    /// Wrap a report with its exit code.
    #[must_use]
    pub fn new(report: &'a Report) -> Self {
        let code = report.exit_code();
        Self {
            report,
            exit_code: code.as_i32(),
            exit_code_name: code.code_prefix(),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writeln!(writer).map_err(serde_json::Error::io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::HashsetSummary;
    use crate::classify::Category;
    use crate::consolidate::ConsolidateSummary;

    #[test]
    fn test_json_process_report() {
        let mut summary = ConsolidateSummary::default();
        summary.total.add(100);
        summary.categories.insert(Category::SmallImages, 3);
        let report = Report::Process(summary);

        let value: serde_json::Value =
            serde_json::from_str(&JsonOutput::new(&report).to_json().unwrap()).unwrap();
        assert_eq!(value["exit_code"], 0);
        assert_eq!(value["exit_code_name"], "TR000");
        assert_eq!(value["report"]["command"], "process");
        assert_eq!(value["report"]["total"]["bytes"], 100);
        assert_eq!(value["report"]["categories"]["Small_Images"], 3);
    }

    #[test]
    fn test_json_interrupted_exit_code() {
        let report = Report::Hashset(HashsetSummary {
            interrupted: true,
            ..HashsetSummary::default()
        });
        let output = JsonOutput::new(&report);
        assert_eq!(output.exit_code, 130);
        assert!(output.to_json_pretty().unwrap().contains('\n'));
    }

    #[test]
    fn test_write_to_ends_with_newline() {
        let report = Report::Hashset(HashsetSummary::default());
        let mut buf = Vec::new();
        JsonOutput::new(&report).write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\"unique\""));
    }
}
