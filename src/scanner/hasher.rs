//! xxHash64 file hasher with streaming support.
//!
//! # Overview
//!
//! Files are read through one fixed-size buffer that is allocated once per
//! batch and reused for every file in it, so hashing thousands of files does
//! not allocate per file. xxHash64 is used for throughput: the goal is
//! content identity, not tamper resistance.
//!
//! Files in a batch are hashed strictly one after another, which keeps the
//! progress callback order identical to the input order.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use xxhash_rust::xxh64::Xxh64;

use super::HashError;
use crate::progress::ProgressCallback;

/// Default read buffer size (4 MiB).
pub const OPTIMAL_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Seed for every digest. Changing it invalidates every cached hash.
pub const HASH_SEED: u64 = 0;

/// Progress phase name reported by [`Hasher::hash_batch`].
pub const HASH_PHASE: &str = "hashing";

/// Streaming content hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default 4 MiB buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer_size(OPTIMAL_BUFFER_SIZE)
    }

    /// Create a hasher with a custom buffer size (at least one byte).
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag checked before each file of a batch.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Size of the read buffer used per batch.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash a single file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn hash_file(&self, path: &Path) -> Result<u64, HashError> {
        let mut buffer = vec![0u8; self.buffer_size];
        let mut state = Xxh64::new(HASH_SEED);
        stream_file(path, &mut buffer, &mut state)
    }

    /// Hash every file in `paths`, in order.
    ///
    /// The progress callback is told about each file before it is read. The
    /// batch is all-or-nothing: the first unreadable file aborts it and no
    /// hashes are returned.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] for the first file that fails, or
    /// [`HashError::Interrupted`] if shutdown was requested.
    pub fn hash_batch(
        &self,
        paths: &[PathBuf],
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<Vec<u64>, HashError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(callback) = progress {
            callback.on_phase_start(HASH_PHASE, paths.len());
        }
        log::debug!(
            "Hashing {} files with a {} byte buffer",
            paths.len(),
            self.buffer_size
        );

        let mut buffer = vec![0u8; self.buffer_size];
        let mut state = Xxh64::new(HASH_SEED);
        let mut hashes = Vec::with_capacity(paths.len());

        for (index, path) in paths.iter().enumerate() {
            if self.is_shutdown_requested() {
                log::debug!("Hasher: Shutdown requested after {} files", index);
                return Err(HashError::Interrupted);
            }

            if let Some(callback) = progress {
                callback.on_progress(index + 1, &path.to_string_lossy());
            }

            state.reset(HASH_SEED);
            let hash = stream_file(path, &mut buffer, &mut state)?;
            log::trace!("{} {}", hash_to_hex(hash), path.display());
            hashes.push(hash);
        }

        if let Some(callback) = progress {
            callback.on_phase_end(HASH_PHASE);
        }
        Ok(hashes)
    }
}

fn stream_file(path: &Path, buffer: &mut [u8], state: &mut Xxh64) -> Result<u64, HashError> {
    let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
    loop {
        match file.read(buffer) {
            Ok(0) => break,
            Ok(n) => state.update(&buffer[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(HashError::from_io(path, e)),
        }
    }
    Ok(state.digest())
}

/// Render a hash as 16 lowercase hex digits.
#[must_use]
pub fn hash_to_hex(hash: u64) -> String {
    format!("{hash:016x}")
}
