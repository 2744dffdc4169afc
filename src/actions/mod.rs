//! Actions that bring the destination in line with the source.
//!
//! # Overview
//!
//! This module turns a comparison list into file operations:
//! - New files are copied into the destination
//! - Changed files are moved to the trash and copied again
//! - Destination-only files are reported, ignored, or trashed after asking
//!
//! # Safety
//!
//! Nothing is ever overwritten in place: a destination file is moved to the
//! system trash (recoverable) before its replacement is copied. Permanent
//! deletion must be requested explicitly with [`DeleteMode::Permanent`].

pub mod confirm;
pub mod sync;

use std::io;
use std::path::{Path, PathBuf};

pub use confirm::{AlwaysAnswer, Confirm, DialoguerConfirm};
pub use sync::{DeleteMode, SyncPlan, SyncSummary};

/// Error type for sync actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Copying a file failed.
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        /// Source file
        from: PathBuf,
        /// Destination file
        to: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Creating a destination directory failed.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Moving a file to the trash failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that could not be trashed
        path: PathBuf,
        /// Message from the trash backend
        message: String,
    },

    /// Permanently deleting a file failed.
    #[error("permanent delete failed for {path}: {source}")]
    DeleteFailed {
        /// File that could not be deleted
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Reading the user's answer failed.
    #[error("failed to get user input: {0}")]
    Prompt(String),

    /// Shutdown was requested between two actions.
    #[error("sync interrupted")]
    Interrupted,
}

impl ActionError {
    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Copy { to: p, .. }
            | Self::CreateDir { path: p, .. }
            | Self::TrashFailed { path: p, .. }
            | Self::DeleteFailed { path: p, .. } => Some(p),
            Self::Prompt(_) | Self::Interrupted => None,
        }
    }
}
