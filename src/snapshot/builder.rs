//! Snapshot construction with hash reuse.
//!
//! # Overview
//!
//! Building a snapshot of a directory goes through four steps:
//!
//! 1. **Lookup**: the canonical directory path, normalized, is the cache key
//!    under which the previous snapshot was stored.
//! 2. **Enumerate**: files are walked in sorted order (deep or shallow) and
//!    excluded paths are dropped.
//! 3. **Reuse**: a previous record whose size and modification time still
//!    match is kept with its hash; anything else gets a fresh record.
//! 4. **Hash and persist**: every record without a hash is hashed in one
//!    batch, then the full record list replaces the cached one.
//!
//! The cache is written once, at the very end, so a failed or interrupted
//! build leaves the previous entry untouched.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Snapshot, SnapshotError};
use crate::cache::{DirectoryCache, FileRecord};
use crate::config::SyncOptions;
use crate::progress::ProgressCallback;
use crate::scanner::path_utils::{directory_key, path_key, relative_path_string};
use crate::scanner::{HashError, Hasher, Walker, WalkerConfig};

/// Counters from one snapshot build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Files in the resulting snapshot
    pub files: usize,
    /// Files whose cached hash was reused
    pub cache_hits: usize,
    /// Files that had to be read and hashed
    pub hashed: usize,
    /// Files skipped because their path is excluded
    pub excluded: usize,
}

impl BuildStats {
    /// Percentage of files served from the cache.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.files == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / self.files as f64) * 100.0
        }
    }
}

/// Builds [`Snapshot`]s of directories.
pub struct SnapshotBuilder<'a> {
    cache: Option<&'a DirectoryCache>,
    options: &'a SyncOptions,
    progress: Option<&'a dyn ProgressCallback>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for SnapshotBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotBuilder")
            .field("cache", &self.cache)
            .field("options", &self.options)
            .field("progress", &self.progress.map(|_| "<callback>"))
            .field("shutdown_flag", &self.shutdown_flag)
            .finish()
    }
}

impl<'a> SnapshotBuilder<'a> {
    /// Create a builder backed by a hash cache.
    #[must_use]
    pub fn new(cache: &'a DirectoryCache, options: &'a SyncOptions) -> Self {
        Self {
            cache: Some(cache),
            options,
            progress: None,
            shutdown_flag: None,
        }
    }

    /// Create a builder that hashes every file and persists nothing.
    #[must_use]
    pub fn without_cache(options: &'a SyncOptions) -> Self {
        Self {
            cache: None,
            options,
            progress: None,
            shutdown_flag: None,
        }
    }

    /// Report hashing progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: &'a dyn ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Set the shutdown flag shared with the walker and the hasher.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Options the builder was created with.
    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        self.options
    }

    /// Progress callback, if any.
    #[must_use]
    pub fn progress(&self) -> Option<&'a dyn ProgressCallback> {
        self.progress
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the snapshot of `root`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::InvalidRoot`] if `root` is not a directory,
    /// or the first walker, hasher or cache failure.
    pub fn build(&self, root: &Path) -> Result<(Snapshot, BuildStats), SnapshotError> {
        let root = canonical_root(root)?;
        let dir_key = directory_key(&root);

        let mut previous: HashMap<String, FileRecord> = match self.cache {
            Some(cache) => cache
                .get(&dir_key)?
                .unwrap_or_default()
                .into_iter()
                .map(|record| (record.key(), record))
                .collect(),
            None => HashMap::new(),
        };
        log::debug!(
            "Building snapshot of {} ({} cached records)",
            root.display(),
            previous.len()
        );

        let mut walker = Walker::new(
            &root,
            WalkerConfig::new(self.options.deep, self.options.follow_symlinks),
        );
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let mut snapshot = Snapshot::new();
        let mut stats = BuildStats::default();

        for entry in walker.walk() {
            let entry = entry?;
            let Some(relative) = relative_path_string(&root, &entry.path) else {
                log::warn!("Skipping path outside {}: {}", root.display(), entry.path.display());
                continue;
            };

            let key = path_key(&relative);
            if self.options.is_excluded(&key) {
                log::debug!("Excluded: {}", relative);
                stats.excluded += 1;
                continue;
            }

            let modified = DateTime::<Utc>::from(entry.modified);
            let record = match previous.remove(&key) {
                Some(mut cached) if cached.matches_metadata(entry.size, modified) => {
                    log::trace!("Cache hit: {}", relative);
                    cached.relative_path = relative;
                    cached
                }
                _ => FileRecord::new(relative, modified, entry.size),
            };

            if let Some(replaced) = snapshot.insert(record) {
                log::warn!(
                    "{} collides with another file after normalization, keeping the later one",
                    replaced.relative_path
                );
            }
        }

        if self.is_shutdown_requested() {
            return Err(HashError::Interrupted.into());
        }

        if !previous.is_empty() {
            log::debug!("Dropping {} records of deleted files", previous.len());
        }

        let pending: Vec<PathBuf> = snapshot
            .records()
            .filter(|r| r.needs_hash())
            .map(|r| root.join(&r.relative_path))
            .collect();

        stats.files = snapshot.len();
        stats.hashed = pending.len();
        stats.cache_hits = stats.files - stats.hashed;

        let mut hasher = Hasher::with_buffer_size(self.options.buffer_size);
        if let Some(ref flag) = self.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }
        let hashes = hasher.hash_batch(&pending, self.progress)?;

        for (record, hash) in snapshot
            .records_mut()
            .filter(|r| r.needs_hash())
            .zip(hashes)
        {
            record.hash = hash;
        }

        if let Some(cache) = self.cache {
            let records: Vec<FileRecord> = snapshot.records().cloned().collect();
            cache.set(&dir_key, &records)?;
        }

        log::info!(
            "{}: {} files, {} hashed, {} from cache",
            root.display(),
            stats.files,
            stats.hashed,
            stats.cache_hits
        );
        Ok((snapshot, stats))
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, SnapshotError> {
    let invalid = |reason: String| SnapshotError::InvalidRoot {
        path: root.to_path_buf(),
        reason,
    };

    let metadata = fs::metadata(root).map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    fs::canonicalize(root).map_err(|e| invalid(e.to_string()))
}
