//! Cache entry definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::path_utils::path_key;

/// Hash value meaning "content not hashed yet".
///
/// A file whose xxHash64 digest happens to be exactly this value cannot be
/// told apart from an unhashed one and is rehashed on every build.
pub const UNSET_HASH: u64 = 0;

/// Represents a single file in a directory snapshot.
///
/// The whole record list of one directory is what the cache stores under
/// that directory's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Path relative to the snapshot root, original case preserved.
    #[serde(alias = "RelativePath", alias = "relativepath")]
    pub relative_path: String,
    /// Last modification time.
    #[serde(alias = "Modified")]
    pub modified: DateTime<Utc>,
    /// File size in bytes.
    #[serde(alias = "Length")]
    pub length: u64,
    /// xxHash64 of the content, or [`UNSET_HASH`].
    #[serde(default, alias = "Hash")]
    pub hash: u64,
}

impl FileRecord {
    /// Create a record with an unset hash.
    #[must_use]
    pub fn new(relative_path: impl Into<String>, modified: DateTime<Utc>, length: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            modified,
            length,
            hash: UNSET_HASH,
        }
    }

    /// Normalized comparison key of the relative path.
    #[must_use]
    pub fn key(&self) -> String {
        path_key(&self.relative_path)
    }

    /// Whether the content hash still has to be computed.
    #[must_use]
    pub fn needs_hash(&self) -> bool {
        self.hash == UNSET_HASH
    }

    /// Whether the cached metadata still describes the file on disk.
    #[must_use]
    pub fn matches_metadata(&self, length: u64, modified: DateTime<Utc>) -> bool {
        self.length == length && self.modified == modified
    }
}
