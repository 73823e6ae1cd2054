//! Terminal report formatter.
//!
//! Sizes are shown with `bytesize`; headings are bold when colour is on.

use std::io::{self, Write};
use std::path::Path;

use bytesize::ByteSize;
use yansi::Paint;

use super::Report;
use crate::actions::{CondenseSummary, HashsetSummary, IndexSummary, MergeSummary, PruneSummary};
use crate::consolidate::{ConsolidateSummary, FileFailure, Tally};

/// Width of the label column.
const LABEL_WIDTH: usize = 24;

/// Human-readable rendering of a [`Report`].
#[derive(Debug, Clone, Copy)]
pub struct TextOutput<'a> {
    report: &'a Report,
    colored: bool,
}

impl<'a> TextOutput<'a> {
    /// Render `report`, in colour if `colored`.
    #[must_use]
    pub fn new(report: &'a Report, colored: bool) -> Self {
        Self { report, colored }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns any error from `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self.report {
            Report::Process(s) => self.write_process(writer, s),
            Report::Condense(s) => self.write_condense(writer, s),
            Report::Index(s) => self.write_index(writer, s),
            Report::Prune(s) => self.write_prune(writer, s),
            Report::Merge(s) => self.write_merge(writer, s),
            Report::Hashset(s) => self.write_hashset(writer, s),
        }?;
        if self.report.interrupted() {
            writeln!(writer)?;
            writeln!(writer, "{}", self.heading("Interrupted; results are incomplete"))?;
        }
        Ok(())
    }

    /// Render to a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn heading(&self, text: &str) -> String {
        if self.colored {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn write_process<W: Write>(&self, w: &mut W, s: &ConsolidateSummary) -> io::Result<()> {
        writeln!(
            w,
            "{}",
            self.heading(&format!(
                "Consolidated {} source(s) into {}",
                s.sources.len(),
                s.destination.display()
            ))
        )?;
        writeln!(w)?;

        if !s.categories.is_empty() {
            writeln!(w, "{}", self.heading("Categories"))?;
            for (category, count) in &s.categories {
                writeln!(w, "  {:<width$}{count:>8}", category.label(), width = LABEL_WIDTH - 2)?;
            }
            writeln!(w)?;
        }

        tally_line(w, "Files found", s.total)?;
        tally_line(w, "Known", s.known)?;
        tally_line(w, "Duplicates", s.duplicates)?;
        tally_line(w, "Blacklisted", s.blacklisted)?;
        tally_line(w, "Relocated", s.relocated)?;
        tally_line(w, "Skipped", s.skipped)?;
        count_line(w, "Empty (left in place)", s.empty)?;
        count_line(w, "Directories removed", s.removed_dirs)?;
        writeln!(w, "{:<LABEL_WIDTH$}{:.1?}", "Elapsed", s.duration)?;
        index_line(w, "Index", s.index_path.as_deref())?;
        self.write_failures(w, "Could not read", &s.failures)?;
        self.write_failures(w, "Could not remove", &s.removal_failures)
    }

    fn write_condense<W: Write>(&self, w: &mut W, s: &CondenseSummary) -> io::Result<()> {
        writeln!(w, "{}", self.heading("Condense"))?;
        count_line(w, "Files found", s.files)?;
        count_line(w, "Renamed", s.moved)?;
        count_line(w, "Already flat", s.unchanged)?;
        count_line(w, "Directories removed", s.removed_dirs)?;
        self.write_failures(w, "Could not read", &s.failures)
    }

    fn write_index<W: Write>(&self, w: &mut W, s: &IndexSummary) -> io::Result<()> {
        writeln!(w, "{}", self.heading("Index"))?;
        count_line(w, "Records", s.records)?;
        tally_line(w, "Unique", s.tally.unique)?;
        tally_line(w, "Duplicates", s.tally.duplicates)?;
        tally_line(w, "Skipped", s.tally.skipped)?;
        count_line(w, "Empty", s.tally.empty)?;
        index_line(w, "Written to", s.output.as_deref())?;
        self.write_failures(w, "Could not read", &s.tally.failures)
    }

    fn write_prune<W: Write>(&self, w: &mut W, s: &PruneSummary) -> io::Result<()> {
        writeln!(w, "{}", self.heading("Prune"))?;
        count_line(w, "Records", s.records)?;
        count_line(w, "Kept", s.kept)?;
        tally_line(w, "Known removed", s.known)?;
        tally_line(w, "Duplicates removed", s.duplicates)?;
        count_line(w, "Already missing", s.missing)?;
        self.write_failures(w, "Could not remove", &s.removal_failures)
    }

    fn write_merge<W: Write>(&self, w: &mut W, s: &MergeSummary) -> io::Result<()> {
        writeln!(w, "{}", self.heading("Merge"))?;
        tally_line(w, "From primary", s.primary)?;
        tally_line(w, "From secondary", s.secondary)?;
        tally_line(w, "Duplicates removed", s.duplicates)?;
        count_line(w, "Missing records", s.missing)?;
        count_line(w, "Directories removed", s.removed_dirs)?;
        index_line(w, "Index", s.index_path.as_deref())?;
        self.write_failures(w, "Not merged", &s.failures)?;
        self.write_failures(w, "Could not remove", &s.removal_failures)
    }

    fn write_hashset<W: Write>(&self, w: &mut W, s: &HashsetSummary) -> io::Result<()> {
        writeln!(w, "{}", self.heading("Fingerprint set"))?;
        tally_line(w, "Unique", s.tally.unique)?;
        tally_line(w, "Duplicates", s.tally.duplicates)?;
        tally_line(w, "Skipped", s.tally.skipped)?;
        count_line(w, "Empty", s.tally.empty)?;
        count_line(w, "Fingerprints", s.fingerprints)?;
        index_line(w, "Written to", s.output.as_deref())?;
        self.write_failures(w, "Could not read", &s.tally.failures)
    }

    fn write_failures<W: Write>(
        &self,
        w: &mut W,
        title: &str,
        failures: &[FileFailure],
    ) -> io::Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        writeln!(w)?;
        writeln!(w, "{}", self.heading(&format!("{title} ({})", failures.len())))?;
        for failure in failures {
            writeln!(w, "  {}: {}", failure.path.display(), failure.reason)?;
        }
        Ok(())
    }
}

fn tally_line<W: Write>(w: &mut W, label: &str, tally: Tally) -> io::Result<()> {
    writeln!(
        w,
        "{label:<LABEL_WIDTH$}{:>8} files  {:>10}",
        tally.files,
        ByteSize::b(tally.bytes).to_string()
    )
}

fn count_line<W: Write>(w: &mut W, label: &str, count: usize) -> io::Result<()> {
    writeln!(w, "{label:<LABEL_WIDTH$}{count:>8}")
}

fn index_line<W: Write>(w: &mut W, label: &str, path: Option<&Path>) -> io::Result<()> {
    match path {
        Some(path) => writeln!(w, "{label:<LABEL_WIDTH$}{}", path.display()),
        None => writeln!(w, "{label:<LABEL_WIDTH$}not written"),
    }
}
