//! Filesystem-backed persistent map.
//!
//! # Layout
//!
//! ```text
//! root/
//! ├── count            decimal number of entries across all buckets
//! ├── 01c5/
//! │   ├── keys         one key per line, line order = slot order
//! │   ├── 0            encoded value of the first key
//! │   └── 1            encoded value of the second key
//! └── 012c/
//!     └── ...
//! ```
//!
//! A key lives in the bucket named after its 32-bit FNV-1a hash modulo the
//! bucket count. Slot files of a bucket are always numbered `0..n-1`; removing
//! a key shifts every later slot down by one.
//!
//! # Limitations
//!
//! - The `count` file is written separately from the bucket it describes. A
//!   crash between the two writes leaves the counter out of sync and nothing
//!   repairs it.
//! - The bucket count is fixed for the lifetime of a map root. Skewed key sets
//!   pile into a few buckets and lookups become linear in the bucket size.
//! - The in-process mutex is the only guard. Two processes sharing a root can
//!   corrupt it.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::codec::{Codec, CodecError, JsonCodec};

/// Default number of buckets.
pub const DEFAULT_BUCKET_COUNT: u32 = 1024;

/// Name of the map-level entry counter file.
pub const COUNT_FILE_NAME: &str = "count";

/// Name of the per-bucket key list file.
pub const KEYS_FILE_NAME: &str = "keys";

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over the UTF-16 code units of `key`.
///
/// UTF-16 keeps bucket names identical to caches written by the original
/// .NET tool, which hashed `char`s.
#[must_use]
pub fn bucket_hash(key: &str) -> u32 {
    key.encode_utf16().fold(FNV_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// Directory name of the bucket holding `key`.
#[must_use]
pub fn bucket_name(key: &str, bucket_count: u32) -> String {
    format!("{:04x}", bucket_hash(key) % bucket_count)
}

/// Storage faults raised by [`DirMap`].
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Reading or writing a bucket, slot, or count file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The count file does not hold a decimal number.
    #[error("Corrupt entry count in {path}: {content:?}")]
    CorruptCount {
        /// Path of the count file
        path: PathBuf,
        /// What was found instead
        content: String,
    },

    /// A slot file could not be decoded.
    #[error("Failed to decode {path}: {source}")]
    Decode {
        /// Path of the slot file
        path: PathBuf,
        /// Codec failure
        #[source]
        source: CodecError,
    },

    /// A value could not be encoded.
    #[error("Failed to encode value for key {key:?}: {source}")]
    Encode {
        /// Key being written
        key: String,
        /// Codec failure
        #[source]
        source: CodecError,
    },

    /// Keys are stored one per line and cannot contain line breaks.
    #[error("Invalid key {0:?}: keys cannot contain line breaks")]
    InvalidKey(String),

    /// A map needs at least one bucket.
    #[error("Bucket count must be greater than zero")]
    InvalidBucketCount,
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Failure of [`DirMap::add`].
#[derive(thiserror::Error, Debug)]
pub enum AddError {
    /// The key is already present. Nothing was written.
    #[error("Key already exists in the map: {0}")]
    Duplicate(String),

    /// The underlying storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// In-memory view of one bucket directory.
struct Bucket {
    dir: PathBuf,
    keys: Vec<String>,
}

impl Bucket {
    fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    fn slot_path(&self, slot: usize) -> PathBuf {
        self.dir.join(slot.to_string())
    }

    fn keys_path(&self) -> PathBuf {
        self.dir.join(KEYS_FILE_NAME)
    }

    fn save_keys(&self) -> Result<(), StoreError> {
        let path = self.keys_path();
        let mut content = String::with_capacity(self.keys.iter().map(|k| k.len() + 1).sum());
        for key in &self.keys {
            content.push_str(key);
            content.push('\n');
        }
        fs::write(&path, content).map_err(|e| StoreError::io(&path, e))
    }
}

fn read_keys(path: &Path) -> Result<Vec<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// A string-keyed map persisted as a directory tree.
///
/// Every operation takes one instance-wide lock, so calls from several
/// threads on the same instance run one after another.
///
/// # Example
///
/// ```no_run
/// use updir::cache::DirMap;
///
/// let map: DirMap<Vec<u32>> = DirMap::open("/tmp/updir-cache").unwrap();
/// map.set("answer", &vec![42]).unwrap();
/// assert_eq!(map.get("answer").unwrap(), Some(vec![42]));
/// ```
pub struct DirMap<V, C = JsonCodec<V>> {
    root: PathBuf,
    bucket_count: u32,
    codec: C,
    /// Entry counter mirrored from the `count` file. Also the instance lock.
    count: Mutex<usize>,
    _marker: PhantomData<fn() -> V>,
}

impl<V, C> std::fmt::Debug for DirMap<V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirMap")
            .field("root", &self.root)
            .field("bucket_count", &self.bucket_count)
            .finish_non_exhaustive()
    }
}

impl<V, C> DirMap<V, C>
where
    C: Codec<V> + Default,
{
    /// Open (or create) a map at `root` with the default bucket count and codec.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the root cannot be created or the count file
    /// is unreadable.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with(root, DEFAULT_BUCKET_COUNT, C::default())
    }
}

impl<V, C> DirMap<V, C>
where
    C: Codec<V>,
{
    /// Open (or create) a map with an explicit bucket count and codec.
    ///
    /// The bucket count must stay the same for a given root; reopening with a
    /// different one makes existing keys unreachable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidBucketCount`] for zero buckets, or an I/O
    /// / corrupt-count error while reading the root.
    pub fn open_with(
        root: impl Into<PathBuf>,
        bucket_count: u32,
        codec: C,
    ) -> Result<Self, StoreError> {
        if bucket_count == 0 {
            return Err(StoreError::InvalidBucketCount);
        }

        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;

        let count_path = root.join(COUNT_FILE_NAME);
        let count = match fs::read_to_string(&count_path) {
            Ok(content) => {
                content
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| StoreError::CorruptCount {
                        path: count_path.clone(),
                        content,
                    })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(StoreError::io(&count_path, e)),
        };

        log::debug!(
            "Opened map at {} ({} entries, {} buckets)",
            root.display(),
            count,
            bucket_count
        );

        Ok(Self {
            root,
            bucket_count,
            codec,
            count: Mutex::new(count),
            _marker: PhantomData,
        })
    }

    /// Root directory of the map.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of buckets keys are spread over.
    #[must_use]
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Number of entries, as recorded in the count file.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Look up the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the bucket or slot cannot be read or decoded.
    pub fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let _guard = self.lock();

        let Some(bucket) = self.find_bucket(key)? else {
            return Ok(None);
        };
        let Some(slot) = bucket.position(key) else {
            return Ok(None);
        };

        let path = bucket.slot_path(slot);
        let file = File::open(&path).map_err(|e| StoreError::io(&path, e))?;
        let mut reader = BufReader::new(file);
        let value = self
            .codec
            .decode(&mut reader)
            .map_err(|source| StoreError::Decode {
                path: path.clone(),
                source,
            })?;

        log::trace!("Read slot {} for key {:?}", path.display(), key);
        Ok(Some(value))
    }

    /// Insert or overwrite the value for `key`.
    ///
    /// An existing key keeps its slot and the counter is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any storage failure.
    pub fn set(&self, key: &str, value: &V) -> Result<(), StoreError> {
        let mut count = self.lock();
        let mut bucket = self.bucket_for_write(key)?;

        match bucket.position(key) {
            Some(slot) => {
                self.write_slot(&bucket.slot_path(slot), key, value)?;
                log::trace!("Overwrote slot {} of {}", slot, bucket.dir.display());
            }
            None => self.append(&mut count, &mut bucket, key, value)?,
        }
        Ok(())
    }

    /// Insert a value for a key that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`AddError::Duplicate`] if the key is present (the map is left
    /// untouched), or [`AddError::Store`] on storage failure.
    pub fn add(&self, key: &str, value: &V) -> Result<(), AddError> {
        let mut count = self.lock();
        let mut bucket = self.bucket_for_write(key)?;

        if bucket.position(key).is_some() {
            return Err(AddError::Duplicate(key.to_string()));
        }
        self.append(&mut count, &mut bucket, key, value)?;
        Ok(())
    }

    /// Remove `key` and its value.
    ///
    /// Returns `false` if the key was not present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if deleting or renaming slot files fails.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut count = self.lock();

        let Some(mut bucket) = self.find_bucket(key)? else {
            return Ok(false);
        };
        let Some(slot) = bucket.position(key) else {
            return Ok(false);
        };

        let removed = bucket.slot_path(slot);
        fs::remove_file(&removed).map_err(|e| StoreError::io(&removed, e))?;

        // Close the gap: slot i becomes slot i - 1.
        for i in slot + 1..bucket.keys.len() {
            let from = bucket.slot_path(i);
            let to = bucket.slot_path(i - 1);
            fs::rename(&from, &to).map_err(|e| StoreError::io(&from, e))?;
        }

        bucket.keys.remove(slot);
        bucket.save_keys()?;
        let new_count = count.saturating_sub(1);
        self.store_count(&mut count, new_count)?;

        log::debug!(
            "Removed key {:?} from {} ({} keys left in bucket)",
            key,
            bucket.dir.display(),
            bucket.keys.len()
        );
        Ok(true)
    }

    /// Whether `key` is present, without decoding its value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the key list cannot be read.
    pub fn contains_key(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.lock();
        Ok(self
            .find_bucket(key)?
            .is_some_and(|bucket| bucket.position(key).is_some()))
    }

    /// Every key in the map.
    ///
    /// Reads the key list of every bucket, so this is slow on large maps.
    /// Buckets are visited in name order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the root or a key list cannot be read.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock();

        let mut bucket_dirs = self.bucket_dirs()?;
        bucket_dirs.sort();

        let mut keys = Vec::new();
        for dir in bucket_dirs {
            keys.extend(read_keys(&dir.join(KEYS_FILE_NAME))?);
        }
        Ok(keys)
    }

    /// Remove every entry and reset the counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a bucket directory cannot be deleted.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut count = self.lock();

        for dir in self.bucket_dirs()? {
            fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        self.store_count(&mut count, 0)?;

        log::debug!("Cleared map at {}", self.root.display());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // The counter is rewritten from disk state on every mutation, so a
        // panic mid-operation leaves nothing worth refusing to read.
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bucket_dir(&self, key: &str) -> PathBuf {
        self.root.join(bucket_name(key, self.bucket_count))
    }

    fn find_bucket(&self, key: &str) -> Result<Option<Bucket>, StoreError> {
        let dir = self.bucket_dir(key);
        if !dir.is_dir() {
            return Ok(None);
        }
        let keys = read_keys(&dir.join(KEYS_FILE_NAME))?;
        Ok(Some(Bucket { dir, keys }))
    }

    fn bucket_for_write(&self, key: &str) -> Result<Bucket, StoreError> {
        if key.contains(['\n', '\r']) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        if let Some(bucket) = self.find_bucket(key)? {
            return Ok(bucket);
        }

        let dir = self.bucket_dir(key);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        log::trace!("Created bucket {}", dir.display());
        Ok(Bucket {
            dir,
            keys: Vec::new(),
        })
    }

    fn bucket_dirs(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }

    /// New-key path shared by `set` and `add`: slot file, key list, counter.
    fn append(
        &self,
        count: &mut MutexGuard<'_, usize>,
        bucket: &mut Bucket,
        key: &str,
        value: &V,
    ) -> Result<(), StoreError> {
        let slot = bucket.keys.len();
        self.write_slot(&bucket.slot_path(slot), key, value)?;

        bucket.keys.push(key.to_string());
        bucket.save_keys()?;

        let new_count = **count + 1;
        self.store_count(count, new_count)?;

        log::trace!(
            "Added key {:?} at slot {} of {}",
            key,
            slot,
            bucket.dir.display()
        );
        Ok(())
    }

    fn write_slot(&self, path: &Path, key: &str, value: &V) -> Result<(), StoreError> {
        let file = File::create(path).map_err(|e| StoreError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.codec
            .encode(value, &mut writer)
            .map_err(|source| match source {
                CodecError::Io(e) => StoreError::io(path, e),
                source => StoreError::Encode {
                    key: key.to_string(),
                    source,
                },
            })?;
        writer.flush().map_err(|e| StoreError::io(path, e))
    }

    fn store_count(
        &self,
        count: &mut MutexGuard<'_, usize>,
        new_count: usize,
    ) -> Result<(), StoreError> {
        let path = self.root.join(COUNT_FILE_NAME);
        fs::write(&path, new_count.to_string()).map_err(|e| StoreError::io(&path, e))?;
        **count = new_count;
        Ok(())
    }
}
