//! Ctrl+C handling.
//!
//! A single `AtomicBool` is shared by the walker, the hasher and the sync
//! actions. Each checks it between two units of work (a directory entry, a
//! file to hash, a file to copy), so an interrupted run never leaves a file
//! half-copied and never persists a partial snapshot.
//!
//! ```rust,no_run
//! use updir::signal::install_handler;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//! let flag = handler.get_flag();
//! // Pass `flag` to SnapshotBuilder::with_shutdown_flag and SyncPlan::with_shutdown_flag.
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once Ctrl+C was pressed or [`Self::request_shutdown`] was called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request a shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to long-running components.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler.
///
/// Calling it again returns the installed handler with its flag cleared, so
/// `run_app` can be invoked several times in one process (tests do).
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if a different Ctrl+C handler was
/// already registered by someone else.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing current file...");
        let _ = std::io::stderr().flush();

        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => Ok(handler),
        // A concurrent first call won the race and installed the same closure.
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered");
            Ok(handler)
        }
        Err(e) => Err(e.into()),
    }
}
