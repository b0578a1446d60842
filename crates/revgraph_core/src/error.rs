//! Error types for revgraph_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for revgraph_core operations.
#[derive(Error, Debug)]
pub enum RevError {
    /// The external tool could not be launched.
    #[error("failed to start '{command}': {reason}")]
    StartFailure {
        /// The command line that was being started
        command: String,
        /// Why the launch failed
        reason: String,
    },

    /// The external tool terminated abnormally or wrote diagnostics.
    #[error("'{command}' failed: {diagnostic}")]
    StreamFailure {
        /// The command line that failed
        command: String,
        /// Captured diagnostic output (usually stderr)
        diagnostic: String,
    },

    /// The operation was canceled. Not a user-facing failure.
    #[error("operation canceled")]
    Canceled,

    /// The stream ended in the middle of a record.
    #[error("stream ended inside a record, {bytes} bytes discarded")]
    ParseTruncation {
        /// Number of discarded bytes
        bytes: usize,
    },

    /// A record would break a graph invariant and was dropped.
    #[error("structural violation: {0}")]
    StructuralViolation(String),

    /// No placeholder separator is free for quoted-argument splitting.
    #[error("cannot tokenize command line, no free separator: {command}")]
    TokenizeFailure {
        /// The command line that could not be split
        command: String,
    },

    /// A synchronous wait was attempted while another one holds the context.
    #[error("re-entrant synchronous wait refused")]
    ReentrantWait,

    /// Invalid hex string or length for a commit identifier.
    #[error("invalid commit id: {0}")]
    InvalidCommitId(String),

    /// No commit with this identifier is loaded.
    #[error("unknown commit: {0}")]
    UnknownCommit(String),

    /// No load session with this identifier exists.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The directory is not inside a work tree the tool recognises.
    #[error("not a repository: {}", .0.display())]
    NotARepository(PathBuf),

    /// The event bus already has the maximum number of subscribers.
    #[error("too many event listeners (limit {limit})")]
    TooManyListeners {
        /// Configured maximum
        limit: usize,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error during file or pipe operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RevError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::StartFailure { .. } => {
                Some("Check that git is installed and that process.git_program points at it.")
            }
            Self::NotARepository(_) => Some("Run from inside a git work tree."),
            Self::TokenizeFailure { .. } => {
                Some("Remove one of the characters #%&!? from the command line.")
            }
            Self::ConfigError(_) => Some("Fix or delete revgraph.toml to fall back to defaults."),
            Self::TooManyListeners { .. } => {
                Some("Drop unused event receivers or raise events.max_listeners.")
            }
            _ => None,
        }
    }

    /// Whether the error should be shown to a user as a diagnostic.
    ///
    /// Cancellation is a normal outcome and is never reported.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Canceled)
    }
}

/// Convenience Result type for revgraph_core operations.
pub type Result<T> = std::result::Result<T, RevError>;
