//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for enumerating the files of a
//! directory tree together with the metadata the snapshot builder needs
//! (size and modification time).
//!
//! # Features
//!
//! - Deep (recursive) or shallow (top-level only) traversal
//! - Entries sorted by file name within each directory, so two walks of an
//!   unchanged tree yield the same order
//! - Optional symlink following with cycle detection
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use updir::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Music"), WalkerConfig::new(true, false));
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use walkdir::WalkDir;

use super::{FileEntry, ScanError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root directory being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding file entries.
    ///
    /// Directories themselves are not yielded. Errors are yielded as
    /// [`ScanError`] values; it is up to the caller whether to stop.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let mut walk_dir = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();
        if !self.config.deep {
            walk_dir = walk_dir.max_depth(1);
        }

        walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        return None;
                    }

                    // Follows the link when follow_symlinks is set.
                    let metadata = match entry.metadata() {
                        Ok(m) => m,
                        Err(e) => return Some(Err(self.handle_walkdir_error(e))),
                    };

                    if !metadata.is_file() {
                        log::trace!("Skipping non-regular file: {}", entry.path().display());
                        return None;
                    }

                    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    Some(Ok(FileEntry::new(
                        entry.into_path(),
                        metadata.len(),
                        modified,
                    )))
                }
                Err(e) => Some(Err(self.handle_walkdir_error(e))),
            })
    }

    /// Convert a walkdir error into a [`ScanError`].
    fn handle_walkdir_error(&self, error: walkdir::Error) -> ScanError {
        use std::io::ErrorKind;

        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if let Some(ancestor) = error.loop_ancestor() {
            log::warn!(
                "Symlink loop at {} (points back to {})",
                path.display(),
                ancestor.display()
            );
        }

        match error.io_error().map(std::io::Error::kind) {
            Some(ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(ErrorKind::NotFound) => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                let message = error.to_string();
                let source = error
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(message));
                ScanError::Io { path, source }
            }
        }
    }
}
