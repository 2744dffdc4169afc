//! Human-readable sync report.
//!
//! One line per file that needs attention:
//!
//! ```text
//! + album/new-track.mp3 (4.2 MiB)
//! ~ album/retagged.mp3 (3.9 MiB)
//! - album/removed.mp3
//! ```
//!
//! Up-to-date files are listed with `=` only when requested.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::actions::SyncSummary;
use crate::compare::{CompareResult, CompareSummary, Comparison};

/// Text report over a comparison list.
#[derive(Debug, Clone)]
pub struct TextReport<'a> {
    comparisons: &'a [Comparison],
    show_matches: bool,
    sync: Option<SyncSummary>,
}

impl<'a> TextReport<'a> {
    /// Create a report that hides up-to-date files.
    #[must_use]
    pub fn new(comparisons: &'a [Comparison]) -> Self {
        Self {
            comparisons,
            show_matches: false,
            sync: None,
        }
    }

    /// List up-to-date files too.
    #[must_use]
    pub fn with_matches(mut self, show: bool) -> Self {
        self.show_matches = show;
        self
    }

    /// Append the outcome of applying the comparisons.
    #[must_use]
    pub fn with_sync_summary(mut self, summary: SyncSummary) -> Self {
        self.sync = Some(summary);
        self
    }

    fn line(&self, comparison: &Comparison) -> Option<String> {
        let path = &comparison.record.relative_path;
        let size = ByteSize::b(comparison.record.length);
        let line = match comparison.result {
            CompareResult::New => format!("+ {path} ({size})").green().to_string(),
            CompareResult::Unmatch => format!("~ {path} ({size})").yellow().to_string(),
            CompareResult::Missing => format!("- {path}").red().to_string(),
            CompareResult::Match if self.show_matches => format!("= {path}").dim().to_string(),
            CompareResult::Match => return None,
        };
        Some(line)
    }

    /// Render the report as a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.comparisons.iter().filter_map(|c| self.line(c)) {
            out.push_str(&line);
            out.push('\n');
        }

        let summary = CompareSummary::from_comparisons(self.comparisons);
        if summary.is_in_sync() {
            out.push_str(&format!(
                "{} ({} files up to date)\n",
                "Destination is up to date".green().bold(),
                summary.matched
            ));
        } else {
            out.push_str(&format!(
                "{} new, {} changed, {} missing, {} up to date ({} to copy)\n",
                summary.new,
                summary.unmatched,
                summary.missing,
                summary.matched,
                ByteSize::b(summary.bytes_to_copy)
            ));
        }

        if let Some(sync) = self.sync {
            out.push_str(&sync.summary());
            out.push('\n');
        }
        out
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.render().as_bytes())
    }
}
