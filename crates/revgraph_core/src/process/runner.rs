//! Thread-backed process execution.

use super::{ContextToken, ExitClass, OutputStream, ProcessEvent, ProcessOutcome};
use crate::config::{FailurePolicy, ProcessConfig};
use crate::error::{RevError, Result};
use crate::tokenizer::tokenize;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Launches external commands according to a [`ProcessConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: ProcessConfig,
}

impl ProcessRunner {
    /// Creates a runner.
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    /// Returns the runner configuration.
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Starts `command` in `cwd` and returns a handle streaming its events.
    ///
    /// When `input` is given it is written to the child's stdin once, then
    /// stdin is closed.
    ///
    /// # Errors
    ///
    /// `RevError::TokenizeFailure` if the command line cannot be split and
    /// `RevError::StartFailure` if the program cannot be launched. No
    /// completion event is produced in either case.
    pub fn start(&self, command: &str, cwd: &Path, input: Option<Vec<u8>>) -> Result<RunningProcess> {
        let args = tokenize(command)?;
        let (program, rest) = args.split_first().ok_or_else(|| RevError::StartFailure {
            command: command.to_string(),
            reason: "empty command line".to_string(),
        })?;

        let mut child = Command::new(program)
            .args(rest)
            .current_dir(cwd)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RevError::StartFailure {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        let pid = child.id();
        debug!(command, pid, "process started");

        match self.attach(&mut child, command, input) {
            Ok((events, cancel, threads)) => {
                let waiter = Waiter {
                    command: command.to_string(),
                    poll: self.config.poll_interval(),
                    policy: self.config.failure,
                    cancel: Arc::clone(&cancel),
                };
                thread::Builder::new()
                    .name("revgraph-wait".into())
                    .spawn(move || waiter.run(child, threads))
                    .map_err(|e| RevError::StartFailure {
                        command: command.to_string(),
                        reason: e.to_string(),
                    })?;

                Ok(RunningProcess {
                    command: command.to_string(),
                    pid,
                    events,
                    cancel,
                    finished: false,
                })
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(e)
            }
        }
    }

    /// Runs `command` to completion, blocking the caller.
    ///
    /// The wait takes the token out of `context` and restores it on return.
    /// `idle` is invoked on every poll tick while no output is pending, so
    /// the caller can keep servicing other loads.
    ///
    /// # Errors
    ///
    /// `RevError::ReentrantWait` if `context` holds no token, plus every
    /// error of [`start`](Self::start). A finished run is returned as `Ok`
    /// whatever its outcome; use [`SyncOutput::into_stdout`] to check it.
    pub fn run_sync(
        &self,
        command: &str,
        cwd: &Path,
        input: Option<Vec<u8>>,
        context: &mut Option<ContextToken>,
        mut idle: impl FnMut(),
    ) -> Result<SyncOutput> {
        let token = context.take().ok_or(RevError::ReentrantWait)?;
        let result = self.drain(command, cwd, input, &mut idle);
        *context = Some(token);
        result
    }

    fn drain(
        &self,
        command: &str,
        cwd: &Path,
        input: Option<Vec<u8>>,
        idle: &mut dyn FnMut(),
    ) -> Result<SyncOutput> {
        let mut process = self.start(command, cwd, input)?;
        let mut stdout = Vec::new();

        loop {
            match process.wait_event(self.config.poll_interval()) {
                Some(ProcessEvent::Data {
                    bytes,
                    stream: OutputStream::Stdout,
                }) => stdout.extend_from_slice(&bytes),
                // Collected whole by the waiter and reported in the outcome.
                Some(ProcessEvent::Data {
                    stream: OutputStream::Stderr,
                    ..
                }) => {}
                Some(ProcessEvent::Finished(outcome)) => {
                    return Ok(SyncOutput {
                        command: command.to_string(),
                        stdout,
                        outcome,
                    });
                }
                None => idle(),
            }
        }
    }

    fn attach(
        &self,
        child: &mut Child,
        command: &str,
        input: Option<Vec<u8>>,
    ) -> Result<(Receiver<ProcessEvent>, Arc<AtomicBool>, Threads)> {
        let missing = |pipe: &str| RevError::StartFailure {
            command: command.to_string(),
            reason: format!("{} not captured", pipe),
        };
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (tx, rx) = mpsc::channel();
        let chunk = self.config.read_chunk_size;

        let stdin = match (input, child.stdin.take()) {
            (Some(bytes), Some(pipe)) => Some(
                thread::Builder::new()
                    .name("revgraph-stdin".into())
                    .spawn(move || feed_stdin(pipe, bytes))?,
            ),
            _ => None,
        };

        let out_tx = tx.clone();
        let stdout = thread::Builder::new()
            .name("revgraph-stdout".into())
            .spawn(move || read_pipe(stdout, OutputStream::Stdout, out_tx, chunk))?;

        let err_tx = tx.clone();
        let stderr = thread::Builder::new()
            .name("revgraph-stderr".into())
            .spawn(move || read_pipe(stderr, OutputStream::Stderr, err_tx, chunk))?;

        let threads = Threads {
            stdin,
            stdout,
            stderr,
            tx,
        };
        Ok((rx, Arc::new(AtomicBool::new(false)), threads))
    }
}

struct Threads {
    stdin: Option<JoinHandle<()>>,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
    tx: Sender<ProcessEvent>,
}

struct Waiter {
    command: String,
    poll: Duration,
    policy: FailurePolicy,
    cancel: Arc<AtomicBool>,
}

impl Waiter {
    fn run(self, mut child: Child, threads: Threads) {
        let exit = loop {
            if self.cancel.load(Ordering::SeqCst) {
                if let Err(e) = child.kill() {
                    debug!(command = %self.command, error = %e, "kill failed");
                }
                let _ = child.wait();
                break ExitClass::Canceled;
            }
            match child.try_wait() {
                Ok(Some(status)) => break exit_class(status),
                Ok(None) => thread::sleep(self.poll),
                Err(e) => {
                    warn!(command = %self.command, error = %e, "wait failed");
                    break ExitClass::Abnormal;
                }
            }
        };

        // A killed child may leave grandchildren holding the pipes open, so
        // readers are only joined after a natural exit.
        let stderr = if exit == ExitClass::Canceled {
            String::new()
        } else {
            if let Some(stdin) = threads.stdin {
                let _ = stdin.join();
            }
            let _ = threads.stdout.join();
            match threads.stderr.join() {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => {
                    warn!(command = %self.command, "stderr reader panicked");
                    String::new()
                }
            }
        };

        let outcome = ProcessOutcome::classify(exit, stderr, &self.policy);
        debug!(
            command = %self.command,
            exit = ?outcome.exit,
            failed = outcome.failed,
            "process finished"
        );
        let _ = threads.tx.send(ProcessEvent::Finished(outcome));
    }
}

fn exit_class(status: ExitStatus) -> ExitClass {
    match status.code() {
        Some(0) => ExitClass::Clean,
        Some(code) => ExitClass::NonZero(code),
        None => ExitClass::Abnormal,
    }
}

fn feed_stdin(mut pipe: ChildStdin, bytes: Vec<u8>) {
    if let Err(e) = pipe.write_all(&bytes) {
        if e.kind() != ErrorKind::BrokenPipe {
            debug!(error = %e, "stdin write failed");
        }
    }
}

/// Forwards a pipe chunk by chunk. Returns a copy of everything read from
/// stderr; stdout is not retained.
fn read_pipe<R: Read>(
    mut pipe: R,
    stream: OutputStream,
    tx: Sender<ProcessEvent>,
    chunk: usize,
) -> Vec<u8> {
    let mut buf = vec![0u8; chunk.max(1)];
    let mut captured = Vec::new();
    let mut listening = true;

    loop {
        match pipe.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if stream == OutputStream::Stderr {
                    captured.extend_from_slice(&buf[..n]);
                }
                // Keep draining after the receiver is gone so the child
                // never blocks on a full pipe.
                if listening {
                    let event = ProcessEvent::Data {
                        bytes: buf[..n].to_vec(),
                        stream,
                    };
                    listening = tx.send(event).is_ok();
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(?stream, error = %e, "pipe read failed");
                break;
            }
        }
    }

    captured
}

/// Handle to a started process.
///
/// Dropping the handle before completion requests cancellation.
#[derive(Debug)]
pub struct RunningProcess {
    command: String,
    pid: u32,
    events: Receiver<ProcessEvent>,
    cancel: Arc<AtomicBool>,
    finished: bool,
}

impl RunningProcess {
    /// The command line this process was started with.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Requests termination. Idempotent, and a no-op once finished.
    pub fn cancel(&self) {
        if !self.finished && !self.cancel.swap(true, Ordering::SeqCst) {
            debug!(command = %self.command, pid = self.pid, "cancel requested");
        }
    }

    /// Whether cancellation was requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Returns a handle that can cancel this process from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    /// Whether the completion event has been delivered.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the next pending event without blocking.
    pub fn try_event(&mut self) -> Option<ProcessEvent> {
        if self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => Some(self.observe(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.lost()),
        }
    }

    /// Waits up to `timeout` for the next event.
    pub fn wait_event(&mut self, timeout: Duration) -> Option<ProcessEvent> {
        if self.finished {
            return None;
        }
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(self.observe(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(self.lost()),
        }
    }

    fn observe(&mut self, event: ProcessEvent) -> ProcessEvent {
        if matches!(event, ProcessEvent::Finished(_)) {
            self.finished = true;
        }
        event
    }

    fn lost(&mut self) -> ProcessEvent {
        warn!(command = %self.command, "process channel closed without completion");
        self.finished = true;
        ProcessEvent::Finished(ProcessOutcome {
            exit: ExitClass::Abnormal,
            stderr: String::new(),
            failed: true,
        })
    }
}

impl Drop for RunningProcess {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.store(true, Ordering::SeqCst);
        }
    }
}

/// Cloneable cancellation switch for a [`RunningProcess`].
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests termination.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a synchronous run.
#[derive(Debug, Clone)]
pub struct SyncOutput {
    /// The command line that ran.
    pub command: String,
    /// Everything written to stdout.
    pub stdout: Vec<u8>,
    /// Exit classification and stderr.
    pub outcome: ProcessOutcome,
}

impl SyncOutput {
    /// Captured stderr text.
    pub fn stderr(&self) -> &str {
        &self.outcome.stderr
    }

    /// Returns stdout if the run succeeded.
    ///
    /// # Errors
    ///
    /// See [`ProcessOutcome::check`].
    pub fn into_stdout(self) -> Result<Vec<u8>> {
        self.outcome.check(&self.command)?;
        Ok(self.stdout)
    }

    /// Returns stdout decoded lossily as UTF-8 if the run succeeded.
    pub fn into_text(self) -> Result<String> {
        let bytes = self.into_stdout()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
