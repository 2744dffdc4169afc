//! Applying a comparison to the destination tree.
//!
//! # Example
//!
//! ```no_run
//! use updir::actions::{DialoguerConfirm, SyncPlan};
//! use updir::compare::compare;
//! use updir::config::SyncOptions;
//! use updir::snapshot::Snapshot;
//! use std::path::Path;
//!
//! let options = SyncOptions::default();
//! let comparisons = compare(&Snapshot::new(), &Snapshot::new());
//! let confirm = DialoguerConfirm;
//! let plan = SyncPlan::new(Path::new("/music"), Path::new("/mnt/player"), &options, &confirm);
//! let summary = plan.apply(&comparisons).unwrap();
//! println!("{}", summary.summary());
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::{ActionError, Confirm};
use crate::compare::{CompareResult, Comparison};
use crate::config::{MissingPolicy, SyncOptions};

/// How destination files are removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Move to the system trash (recoverable)
    #[default]
    Trash,
    /// Delete from disk
    Permanent,
}

/// What a sync run did (or, when simulating, would do).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// New files copied into the destination
    pub copied: usize,
    /// Changed files replaced by the source version
    pub replaced: usize,
    /// Destination-only files removed
    pub trashed: usize,
    /// Destination-only files reported and left alone
    pub reported: usize,
    /// Destination-only files ignored or kept at the prompt
    pub skipped: usize,
    /// Bytes written into the destination
    pub bytes_copied: u64,
    /// Whether the run only simulated its actions
    pub simulated: bool,
}

impl SyncSummary {
    /// Number of files the destination gained, lost or had rewritten.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.copied + self.replaced + self.trashed
    }

    /// One-line description.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.simulated { "Would copy" } else { "Copied" };
        format!(
            "{} {} new and {} changed files ({}), removed {}, reported {}, skipped {}",
            verb,
            self.copied,
            self.replaced,
            bytesize::ByteSize(self.bytes_copied),
            self.trashed,
            self.reported,
            self.skipped
        )
    }
}

/// Applies comparisons between a source and a destination root.
pub struct SyncPlan<'a> {
    source_root: &'a Path,
    destination_root: &'a Path,
    options: &'a SyncOptions,
    confirm: &'a dyn Confirm,
    delete_mode: DeleteMode,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl<'a> SyncPlan<'a> {
    /// Create a plan. Missing files are handled per `options.missing`,
    /// asking through `confirm` when the policy is [`MissingPolicy::Ask`].
    #[must_use]
    pub fn new(
        source_root: &'a Path,
        destination_root: &'a Path,
        options: &'a SyncOptions,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            source_root,
            destination_root,
            options,
            confirm,
            delete_mode: DeleteMode::Trash,
            shutdown_flag: None,
        }
    }

    /// Set how destination files are removed.
    #[must_use]
    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    /// Set the shutdown flag checked before each action.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Apply every comparison in order.
    ///
    /// Stops at the first failure; actions already taken are not undone.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] for the first copy, removal or prompt that
    /// fails, or [`ActionError::Interrupted`] on shutdown.
    pub fn apply(&self, comparisons: &[Comparison]) -> Result<SyncSummary, ActionError> {
        let simulate = self.options.simulate;
        let mut summary = SyncSummary {
            simulated: simulate,
            ..SyncSummary::default()
        };

        for comparison in comparisons {
            if self.is_shutdown_requested() {
                return Err(ActionError::Interrupted);
            }

            let relative = comparison.record.relative_path.as_str();
            let source = self.source_root.join(relative);
            let destination = self
                .destination_root
                .join(comparison.destination_relative());

            match comparison.result {
                CompareResult::Match => {
                    log::trace!("Up to date: {}", relative);
                }
                CompareResult::New => {
                    log::info!("New: {}", relative);
                    summary.bytes_copied += self.copy(&source, &destination, simulate)?;
                    summary.copied += 1;
                }
                CompareResult::Unmatch => {
                    log::info!("Replacing: {}", relative);
                    self.remove(&destination)?;
                    summary.bytes_copied += self.copy(&source, &destination, simulate)?;
                    summary.replaced += 1;
                }
                CompareResult::Missing => match self.options.missing {
                    MissingPolicy::Ignore => {
                        log::debug!("Ignoring missing: {}", relative);
                        summary.skipped += 1;
                    }
                    MissingPolicy::Ask if !simulate => {
                        let prompt = format!(
                            "{} is not in the source. Do you want to delete it?",
                            destination.display()
                        );
                        if self.confirm.confirm(&prompt)? {
                            self.remove(&destination)?;
                            summary.trashed += 1;
                        } else {
                            log::info!("Kept: {}", relative);
                            summary.skipped += 1;
                        }
                    }
                    MissingPolicy::Report | MissingPolicy::Ask => {
                        log::warn!("Missing in source: {}", relative);
                        summary.reported += 1;
                    }
                },
            }
        }

        Ok(summary)
    }

    /// Copy one file, creating its parent directories. Returns bytes copied.
    fn copy(&self, source: &Path, destination: &Path, simulate: bool) -> Result<u64, ActionError> {
        if simulate {
            log::info!(
                "[simulate] copy {} -> {}",
                source.display(),
                destination.display()
            );
            return Ok(fs::metadata(source).map(|m| m.len()).unwrap_or(0));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| ActionError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let bytes = fs::copy(source, destination).map_err(|e| ActionError::Copy {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: e,
        })?;
        log::debug!("Copied {} ({} bytes)", destination.display(), bytes);
        Ok(bytes)
    }

    /// Remove one destination file according to the delete mode.
    fn remove(&self, path: &Path) -> Result<(), ActionError> {
        if self.options.simulate {
            log::info!("[simulate] remove {}", path.display());
            return Ok(());
        }

        match self.delete_mode {
            DeleteMode::Trash => {
                trash::delete(path).map_err(|e| {
                    log::error!("Trash operation failed for {}: {}", path.display(), e);
                    ActionError::TrashFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    }
                })?;
                log::info!("Moved to trash: {}", path.display());
            }
            DeleteMode::Permanent => {
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        log::warn!("Already gone: {}", path.display());
                    }
                    Err(source) => {
                        return Err(ActionError::DeleteFailed {
                            path: path.to_path_buf(),
                            source,
                        })
                    }
                }
                log::info!("Deleted: {}", path.display());
            }
        }
        Ok(())
    }
}
