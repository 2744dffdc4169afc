//! JSON output formatter for sync results.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "source": "/home/user/Music",
//!   "destination": "/mnt/player/Music",
//!   "files": [
//!     {
//!       "relativePath": "album/track.mp3",
//!       "modified": "2024-03-01T10:00:00Z",
//!       "length": 4404019,
//!       "hash": 1311768467463790320,
//!       "result": "new"
//!     }
//!   ],
//!   "summary": { "matched": 0, "unmatched": 0, "new": 1, "missing": 0, "bytes_to_copy": 4404019 },
//!   "sync": { "copied": 1, "replaced": 0, "trashed": 0, "reported": 0, "skipped": 0, "bytes_copied": 4404019, "simulated": false },
//!   "exit_code": 0,
//!   "exit_code_name": "UD000"
//! }
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::actions::SyncSummary;
use crate::compare::{CompareSummary, Comparison};
use crate::error::ExitCode;
use crate::snapshot::BuildStats;

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    /// Source root as given
    pub source: String,
    /// Destination root as given
    pub destination: String,
    /// Every classified file
    pub files: &'a [Comparison],
    /// Counts per classification
    pub summary: CompareSummary,
    /// Source snapshot counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_stats: Option<BuildStats>,
    /// Destination snapshot counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_stats: Option<BuildStats>,
    /// What the sync did, if it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSummary>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "UD000")
    pub exit_code_name: String,
}

impl<'a> JsonReport<'a> {
    /// Create a report over `files`.
    #[must_use]
    pub fn new(source: &Path, destination: &Path, files: &'a [Comparison], exit_code: ExitCode) -> Self {
        Self {
            source: source.to_string_lossy().into_owned(),
            destination: destination.to_string_lossy().into_owned(),
            files,
            summary: CompareSummary::from_comparisons(files),
            source_stats: None,
            destination_stats: None,
            sync: None,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }

    /// Attach both snapshot builds' counters.
    #[must_use]
    pub fn with_stats(mut self, source: BuildStats, destination: BuildStats) -> Self {
        self.source_stats = Some(source);
        self.destination_stats = Some(destination);
        self
    }

    /// Attach the sync outcome.
    #[must_use]
    pub fn with_sync_summary(mut self, summary: SyncSummary) -> Self {
        self.sync = Some(summary);
        self
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

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
