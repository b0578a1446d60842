//! External tool invocation.
//!
//! A [`ProcessRunner`] launches one command per call. Asynchronous callers get
//! a [`RunningProcess`] and poll it for [`ProcessEvent`]s; synchronous callers
//! use [`ProcessRunner::run_sync`], which blocks while still giving the caller
//! an idle hook to service other work.
//!
//! Every started process reports exactly one [`ProcessEvent::Finished`]. A
//! process that cannot be started reports an error immediately instead.

mod runner;

pub use runner::{CancelHandle, ProcessRunner, RunningProcess, SyncOutput};

use crate::config::FailurePolicy;
use crate::error::{RevError, Result};

/// Which pipe a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// Notification from a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of output, in arrival order per pipe.
    Data {
        /// Raw bytes as read from the pipe.
        bytes: Vec<u8>,
        /// Source pipe.
        stream: OutputStream,
    },
    /// The process is gone. Always the last event.
    Finished(ProcessOutcome),
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Exit code zero.
    Clean,
    /// Exit with a non-zero code.
    NonZero(i32),
    /// Killed by a signal or otherwise ended without an exit code.
    Abnormal,
    /// Terminated because cancellation was requested.
    Canceled,
}

/// Final report of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit classification.
    pub exit: ExitClass,
    /// Everything the process wrote to stderr.
    pub stderr: String,
    /// Whether the failure policy judged this run failed.
    pub failed: bool,
}

impl ProcessOutcome {
    /// Classifies a finished run under `policy`.
    ///
    /// Abnormal termination always fails. Cancellation never does.
    pub fn classify(exit: ExitClass, stderr: String, policy: &FailurePolicy) -> Self {
        let failed = match exit {
            ExitClass::Canceled => false,
            ExitClass::Abnormal => true,
            ExitClass::Clean => policy.stderr_is_failure && has_diagnostics(&stderr),
            ExitClass::NonZero(_) => {
                policy.nonzero_exit_is_failure
                    || (policy.stderr_is_failure && has_diagnostics(&stderr))
            }
        };
        Self {
            exit,
            stderr,
            failed,
        }
    }

    /// Whether the run was canceled.
    pub fn is_canceled(&self) -> bool {
        self.exit == ExitClass::Canceled
    }

    /// Converts the outcome into a `Result` for `command`.
    ///
    /// # Errors
    ///
    /// `RevError::Canceled` for canceled runs, `RevError::StreamFailure`
    /// carrying the diagnostic text for failed ones.
    pub fn check(&self, command: &str) -> Result<()> {
        if self.is_canceled() {
            return Err(RevError::Canceled);
        }
        if self.failed {
            return Err(RevError::StreamFailure {
                command: command.to_string(),
                diagnostic: self.diagnostic(),
            });
        }
        Ok(())
    }

    /// Human readable failure description.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.exit {
            ExitClass::NonZero(code) => format!("exited with status {}", code),
            ExitClass::Abnormal => "terminated abnormally".to_string(),
            _ if !self.stderr.is_empty() => "blank output on stderr".to_string(),
            _ => String::new(),
        }
    }
}

fn has_diagnostics(stderr: &str) -> bool {
    !stderr.is_empty()
}

/// Permission to block in a synchronous wait.
///
/// There is one token per mutation context. A synchronous wait takes it out
/// of its slot for the duration of the wait and puts it back afterwards, so a
/// nested wait finds the slot empty and is refused.
#[derive(Debug)]
pub struct ContextToken {
    _private: (),
}

impl ContextToken {
    /// Creates the token for a new mutation context.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for ContextToken {
    fn default() -> Self {
        Self::new()
    }
}
