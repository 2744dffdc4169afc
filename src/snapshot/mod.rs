//! Directory snapshots.
//!
//! A [`Snapshot`] is the set of [`FileRecord`]s of one directory tree at one
//! point in time, keyed by normalized relative path and iterated in the order
//! the files were enumerated. [`SnapshotBuilder`] produces snapshots, reusing
//! cached hashes for files whose size and modification time did not change.
//!
//! # Example
//!
//! ```no_run
//! use updir::cache::DirectoryCache;
//! use updir::config::SyncOptions;
//! use updir::snapshot::SnapshotBuilder;
//! use std::path::Path;
//!
//! let cache = DirectoryCache::open("/tmp/updir-cache").unwrap();
//! let options = SyncOptions::default().with_deep(true);
//! let (snapshot, stats) = SnapshotBuilder::new(&cache, &options)
//!     .build(Path::new("/home/user/Music"))
//!     .unwrap();
//! println!("{} files, {} hashed", snapshot.len(), stats.hashed);
//! ```

pub mod builder;

use std::collections::HashMap;
use std::path::PathBuf;

pub use builder::{BuildStats, SnapshotBuilder};

use crate::cache::{FileRecord, StoreError};
use crate::scanner::{HashError, ScanError};

/// Errors that can occur while building a snapshot.
#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    /// The root does not exist or is not a directory.
    #[error("Invalid directory {path}: {reason}")]
    InvalidRoot {
        /// Path as given
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Enumerating the tree failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Reading a file for hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// The hash cache could not be read or written.
    #[error("Cache error: {0}")]
    Cache(#[from] StoreError),
}

impl SnapshotError {
    /// Whether the build stopped because shutdown was requested.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Hash(HashError::Interrupted))
    }
}

/// Files of one directory tree, keyed by normalized relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(String, FileRecord)>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its key.
    ///
    /// A record whose key is already present replaces the old one in place,
    /// keeping the original position. The replaced record is returned.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        let key = record.key();
        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position].1, record)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, record));
                None
            }
        }
    }

    /// Record stored under a normalized key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FileRecord> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Whether a normalized key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key and record pairs in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Records in enumeration order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.entries.iter().map(|(_, r)| r)
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.entries.iter_mut().map(|(_, r)| r)
    }

    /// Total size of every file in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.records().map(|r| r.length).sum()
    }

    /// Consume the snapshot, returning its records in enumeration order.
    #[must_use]
    pub fn into_records(self) -> Vec<FileRecord> {
        self.entries.into_iter().map(|(_, r)| r).collect()
    }
}

impl FromIterator<FileRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}
