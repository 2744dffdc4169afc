//! Structured error handling and exit codes.

use serde::Serialize;

use crate::actions::ActionError;
use crate::config::ConfigError;
use crate::snapshot::SnapshotError;

/// Exit codes for updir.
///
/// - 0: Success (sync or cache command completed)
/// - 1: General error (unexpected failure)
/// - 2: Invalid input (bad directory, bad configuration)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Invalid input: a path or setting was rejected before any work began.
    InvalidInput = 2,
    /// Interrupted: the run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "UD000",
            Self::GeneralError => "UD001",
            Self::InvalidInput => "UD002",
            Self::Interrupted => "UD130",
        }
    }

    /// Pick the exit code for an application error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<SnapshotError>() {
                return match e {
                    e if e.is_interrupted() => Self::Interrupted,
                    SnapshotError::InvalidRoot { .. } => Self::InvalidInput,
                    _ => Self::GeneralError,
                };
            }
            if let Some(ActionError::Interrupted) = cause.downcast_ref::<ActionError>() {
                return Self::Interrupted;
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return Self::InvalidInput;
            }
        }
        Self::GeneralError
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "UD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
