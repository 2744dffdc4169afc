//! Source/destination snapshot comparison.
//!
//! Every source file is classified as [`CompareResult::New`],
//! [`CompareResult::Match`] or [`CompareResult::Unmatch`]; every destination
//! file with no source counterpart as [`CompareResult::Missing`]. Files are
//! paired by normalized relative path and judged by content hash alone.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::cache::{DirectoryCache, FileRecord};
use crate::config::SyncOptions;
use crate::progress::ProgressCallback;
use crate::snapshot::{BuildStats, Snapshot, SnapshotBuilder, SnapshotError};

/// Classification of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareResult {
    /// Present on both sides with the same content
    Match,
    /// Present on both sides with different content
    Unmatch,
    /// Only in the source
    New,
    /// Only in the destination
    Missing,
}

impl fmt::Display for CompareResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::Unmatch => write!(f, "unmatch"),
            Self::New => write!(f, "new"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// One classified file.
///
/// `record` is the source record for New, Match and Unmatch, and the
/// destination record for Missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    /// The file
    #[serde(flatten)]
    pub record: FileRecord,
    /// Its classification
    pub result: CompareResult,
    /// Destination spelling of a paired file, when it differs from the
    /// source spelling (case, accents or separators)
    #[serde(rename = "destinationPath", skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<String>,
}

impl Comparison {
    /// Pair a record with its classification.
    #[must_use]
    pub fn new(record: FileRecord, result: CompareResult) -> Self {
        Self {
            record,
            result,
            destination_path: None,
        }
    }

    /// Record how the destination spells this file.
    #[must_use]
    pub fn with_destination_path(mut self, path: impl Into<String>) -> Self {
        self.destination_path = Some(path.into());
        self
    }

    /// Relative path of the file on the destination side.
    #[must_use]
    pub fn destination_relative(&self) -> &str {
        self.destination_path
            .as_deref()
            .unwrap_or(&self.record.relative_path)
    }
}

/// Classify every file of `source` and `destination`.
///
/// Source files come first in source enumeration order, followed by the
/// destination-only files in destination order.
#[must_use]
pub fn compare(source: &Snapshot, destination: &Snapshot) -> Vec<Comparison> {
    let mut comparisons = Vec::with_capacity(source.len());

    for (key, record) in source.iter() {
        let comparison = match destination.get(key) {
            None => Comparison::new(record.clone(), CompareResult::New),
            Some(other) => {
                let result = if other.hash == record.hash {
                    CompareResult::Match
                } else {
                    CompareResult::Unmatch
                };
                let comparison = Comparison::new(record.clone(), result);
                if other.relative_path == record.relative_path {
                    comparison
                } else {
                    comparison.with_destination_path(other.relative_path.clone())
                }
            }
        };
        comparisons.push(comparison);
    }

    for (key, record) in destination.iter() {
        if !source.contains_key(key) {
            comparisons.push(Comparison::new(record.clone(), CompareResult::Missing));
        }
    }

    comparisons
}

/// Counts per classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompareSummary {
    /// Identical files
    pub matched: usize,
    /// Files whose content differs
    pub unmatched: usize,
    /// Source-only files
    pub new: usize,
    /// Destination-only files
    pub missing: usize,
    /// Bytes the source side of New and Unmatch files occupies
    pub bytes_to_copy: u64,
}

impl CompareSummary {
    /// Tally a comparison list.
    #[must_use]
    pub fn from_comparisons(comparisons: &[Comparison]) -> Self {
        let mut summary = Self::default();
        for comparison in comparisons {
            match comparison.result {
                CompareResult::Match => summary.matched += 1,
                CompareResult::Unmatch => {
                    summary.unmatched += 1;
                    summary.bytes_to_copy += comparison.record.length;
                }
                CompareResult::New => {
                    summary.new += 1;
                    summary.bytes_to_copy += comparison.record.length;
                }
                CompareResult::Missing => summary.missing += 1,
            }
        }
        summary
    }

    /// Total number of classified files.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matched + self.unmatched + self.new + self.missing
    }

    /// Whether the destination already mirrors the source.
    #[must_use]
    pub fn is_in_sync(&self) -> bool {
        self.unmatched == 0 && self.new == 0 && self.missing == 0
    }
}

/// Both snapshots' build counters plus the comparison.
#[derive(Debug, Clone)]
pub struct DirectoryComparison {
    /// Classified files
    pub comparisons: Vec<Comparison>,
    /// Counters of the source build
    pub source_stats: BuildStats,
    /// Counters of the destination build
    pub destination_stats: BuildStats,
}

impl DirectoryComparison {
    /// Counts per classification.
    #[must_use]
    pub fn summary(&self) -> CompareSummary {
        CompareSummary::from_comparisons(&self.comparisons)
    }
}

/// Snapshot both directories through `cache` and compare them.
///
/// # Errors
///
/// Returns the first [`SnapshotError`] of either build.
pub fn compare_directories(
    source_root: &Path,
    destination_root: &Path,
    cache: &DirectoryCache,
    options: &SyncOptions,
    progress: Option<&dyn ProgressCallback>,
) -> Result<DirectoryComparison, SnapshotError> {
    let mut builder = SnapshotBuilder::new(cache, options);
    if let Some(callback) = progress {
        builder = builder.with_progress(callback);
    }
    compare_with(&builder, source_root, destination_root)
}

/// Compare two directories using a configured builder.
///
/// # Errors
///
/// Returns the first [`SnapshotError`] of either build.
pub fn compare_with(
    builder: &SnapshotBuilder<'_>,
    source_root: &Path,
    destination_root: &Path,
) -> Result<DirectoryComparison, SnapshotError> {
    if let Some(callback) = builder.progress() {
        callback.on_message("source");
    }
    let (source, source_stats) = builder.build(source_root)?;

    if let Some(callback) = builder.progress() {
        callback.on_message("destination");
    }
    let (destination, destination_stats) = builder.build(destination_root)?;

    let comparisons = compare(&source, &destination);
    log::debug!(
        "Compared {} source and {} destination files",
        source.len(),
        destination.len()
    );

    Ok(DirectoryComparison {
        comparisons,
        source_stats,
        destination_stats,
    })
}
