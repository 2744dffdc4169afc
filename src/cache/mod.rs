//! Persistent hash cache for updir.
//!
//! This module provides durable storage for directory snapshots so that
//! subsequent runs can skip re-hashing unchanged files.
//!
//! # Architecture
//!
//! The caching system is split into three components:
//!
//! * [`store`]: A generic string-keyed map laid out as bucket directories on disk.
//! * [`codec`]: The pluggable (de)serializer used for the map's slot files.
//! * [`entry`]: The [`FileRecord`] stored for every file of a cached directory.
//!
//! # Cache Invalidation
//!
//! The cache key is the normalized absolute path of a directory and the value
//! is the full list of its file records. A record is trusted only while both
//! its size and modification time match the file on disk; if either changes,
//! the file is re-hashed during the next build.

pub mod codec;
pub mod entry;
pub mod store;

pub use codec::{Codec, CodecError, JsonCodec};
pub use entry::{FileRecord, UNSET_HASH};
pub use store::{AddError, DirMap, StoreError, DEFAULT_BUCKET_COUNT};

/// The map type used to cache directory snapshots.
pub type DirectoryCache = DirMap<Vec<FileRecord>>;
