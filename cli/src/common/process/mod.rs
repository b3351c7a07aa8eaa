//! # Managed External Process
//!
//! File: cli/src/common/process/mod.rs
//!
//! ## Overview
//!
//! `Process` owns exactly one invocation of an external command. It spawns the child
//! with an explicitly constructed environment and working directory, hands output back
//! to the caller while the child is still running, enforces a wall-clock timeout and
//! makes sure neither the child nor any of its pipes outlive the `Process` value.
//!
//! ## Architecture
//!
//! - `state`: The `ProcessState` lifecycle (`Ready`, `Running`, `Stopped`,
//!   `ForceStopped`, `TimedOut`).
//! - `pipes`: Non-blocking stdout/stderr draining driven by `poll(2)`.
//! - `signal`: `StopSignal::{Terminate, Kill}` and their delivery to the child or its
//!   process group.
//!
//! Supervision is a single-threaded cooperative loop. Each iteration waits at most
//! `POLL_SLICE` for output, forwards whatever arrived, then checks whether the child
//! exited and whether the deadline passed. Nothing else blocks.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::process::{OutputChunk, Process};
//! use std::time::Duration;
//!
//! let mut process = Process::new("php")
//!     .args(["composer.phar", "install"])
//!     .env("PATH", "/usr/bin:/bin")
//!     .timeout(Duration::from_secs(600));
//! let output = process.execute(Some(Box::new(|chunk: &OutputChunk<'_>| print!("{}", chunk.text()))))?;
//! println!("exit code: {}", process.exit_code());
//! ```
//!
//! A non-zero exit code is not an error; callers decide what it means.
//!
mod pipes;
mod signal;
mod state;

pub use pipes::OutputStream;
pub use signal::StopSignal;
pub use state::ProcessState;

use pipes::{OutputPipes, Received};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Longest single wait for output before liveness and the deadline are re-checked.
pub const POLL_SLICE: Duration = Duration::from_millis(200);

/// How long a child may take to honour `StopSignal::Terminate` before it is killed.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Liveness check interval while waiting out the grace period.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Budget used when no timeout is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors raised while supervising a child process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The OS refused to create the process (missing executable, permissions, ...).
    #[error("Failed to start '{command}'")]
    Start {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Process is already running")]
    AlreadyRunning,

    #[error("Process is still running and cannot be cleaned up")]
    StillRunning,

    /// The wall-clock budget ran out. Output received until then is attached.
    #[error("Process timed out after {timeout:?}")]
    Timeout {
        timeout: Duration,
        partial_output: String,
    },

    #[error("I/O error while supervising process")]
    Io(#[from] io::Error),

    #[error("Failed to signal process")]
    Signal(#[source] io::Error),
}

/// One piece of output as it arrives.
#[derive(Debug, Clone, Copy)]
pub struct OutputChunk<'a> {
    /// The stream the bytes were read from.
    pub stream: OutputStream,
    /// Bytes received in this chunk.
    pub bytes: &'a [u8],
    /// Everything received since `start`, this chunk included.
    pub cumulative: &'a [u8],
}

impl OutputChunk<'_> {
    /// The chunk as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes)
    }
}

/// Sink invoked once per received chunk.
pub type OutputCallback<'cb> = Box<dyn FnMut(&OutputChunk<'_>) + 'cb>;

/// A single supervised invocation of an external command.
pub struct Process<'cb> {
    command: String,
    arguments: Vec<String>,
    environment: BTreeMap<String, String>,
    working_directory: Option<PathBuf>,
    timeout: Duration,
    isolate_process_group: bool,

    state: ProcessState,
    output: Vec<u8>,
    child: Option<Child>,
    pipes: Option<OutputPipes>,
    callback: Option<OutputCallback<'cb>>,
    started_at: Option<Instant>,
    exit_status: Option<ExitStatus>,
}

impl<'cb> Process<'cb> {
    /// Creates a process for `command` with no arguments and an empty environment.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            arguments: Vec::new(),
            environment: BTreeMap::new(),
            working_directory: None,
            timeout: DEFAULT_TIMEOUT,
            isolate_process_group: false,
            state: ProcessState::Ready,
            output: Vec::new(),
            child: None,
            pipes: None,
            callback: None,
            started_at: None,
            exit_status: None,
        }
    }

    pub fn arg(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Adds one variable to the child's environment.
    ///
    /// The child sees only what is set here; nothing is inherited from the parent.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the child's working directory. Defaults to the caller's current directory.
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spawns the child as the leader of a new process group and sends stop signals to
    /// the whole group, so helpers spawned by the child are stopped with it.
    pub fn isolate_process_group(mut self, isolate: bool) -> Self {
        self.isolate_process_group = isolate;
        self
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }

    /// OS process id of the current child, if one is attached.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Exit status of the last run; `-1` while running or when the child ended without
    /// one (e.g. killed by a signal).
    pub fn exit_code(&self) -> i32 {
        if self.is_running() {
            return -1;
        }
        self.exit_status.and_then(|status| status.code()).unwrap_or(-1)
    }

    /// Raw combined output of the current or last run.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Shell-escaped command line, for logs and error messages only.
    pub fn command_line(&self) -> String {
        let words = std::iter::once(self.command.as_str()).chain(self.arguments.iter().map(String::as_str));
        shlex::try_join(words.clone()).unwrap_or_else(|_| words.collect::<Vec<_>>().join(" "))
    }

    /// Spawns the child and returns immediately.
    ///
    /// Output and liveness are only observed while `poll`, `wait` or `execute` run.
    /// A process in a terminal state is re-armed: previous output is discarded.
    pub fn start(&mut self, on_output: Option<OutputCallback<'cb>>) -> Result<(), ProcessError> {
        if self.is_running() {
            return Err(ProcessError::AlreadyRunning);
        }
        self.cleanup()?;
        self.output.clear();
        self.exit_status = None;

        let command_line = self.command_line();
        let mut command = Command::new(&self.command);
        command
            .args(&self.arguments)
            .env_clear()
            .envs(&self.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }
        if self.isolate_process_group {
            command.process_group(0);
        }

        debug!("Spawning: {}", command_line);
        let mut child = command.spawn().map_err(|source| ProcessError::Start {
            command: command_line.clone(),
            source,
        })?;
        // Closing stdin right away; the child never gets interactive input.
        drop(child.stdin.take());

        let pipes = match OutputPipes::new(child.stdout.take(), child.stderr.take()) {
            Ok(pipes) => pipes,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Io(e));
            }
        };

        trace!("Child {} started", child.id());
        self.child = Some(child);
        self.pipes = Some(pipes);
        self.callback = on_output;
        self.started_at = Some(Instant::now());
        self.state = ProcessState::Running;
        Ok(())
    }

    /// Runs the command to completion and returns everything it printed.
    ///
    /// Blocks cooperatively until the child exits or the timeout fires, then cleans
    /// up. On timeout the returned error carries the output received so far.
    pub fn execute(&mut self, on_output: Option<OutputCallback<'cb>>) -> Result<String, ProcessError> {
        self.start(on_output)?;
        let state = match self.wait() {
            Ok(state) => state,
            Err(e) => {
                let _ = self.stop(StopSignal::Kill);
                return Err(e);
            }
        };
        self.cleanup()?;

        if state == ProcessState::TimedOut {
            return Err(ProcessError::Timeout {
                timeout: self.timeout,
                partial_output: self.output_text(),
            });
        }
        Ok(self.output_text())
    }

    /// Polls until the process reaches a terminal state.
    pub fn wait(&mut self) -> Result<ProcessState, ProcessError> {
        while self.is_running() {
            self.poll()?;
        }
        Ok(self.state)
    }

    /// One supervision step: waits up to `POLL_SLICE` for output, forwards it, then
    /// checks whether the child exited and whether the deadline passed.
    ///
    /// A process that is not running is left untouched.
    pub fn poll(&mut self) -> Result<ProcessState, ProcessError> {
        if !self.is_running() {
            return Ok(self.state);
        }

        if let Some(pipes) = self.pipes.as_mut() {
            let received = pipes.wait_and_read(POLL_SLICE)?;
            self.deliver(received);
        }

        if let Some(status) = self.try_reap()? {
            debug!("Child exited with {}", status);
            self.drain_remaining();
            self.state = ProcessState::Stopped;
            return Ok(self.state);
        }

        let elapsed = self.started_at.map(|at| at.elapsed()).unwrap_or_default();
        if elapsed >= self.timeout {
            warn!(
                "'{}' exceeded its timeout of {:?}, terminating",
                self.command, self.timeout
            );
            self.terminate(StopSignal::Terminate)?;
            self.state = ProcessState::TimedOut;
        }
        Ok(self.state)
    }

    /// Stops a running child and cleans up.
    ///
    /// `Terminate` gives the child `STOP_GRACE_PERIOD` to exit before it is killed.
    /// Ends in `Stopped` when the child honoured the request, `ForceStopped` when a
    /// kill was needed. A process that is not running only gets cleaned up.
    pub fn stop(&mut self, signal: StopSignal) -> Result<ProcessState, ProcessError> {
        if self.is_running() {
            info!("Stopping '{}' ({:?})", self.command, signal);
            self.state = self.terminate(signal)?;
        }
        self.cleanup()?;
        Ok(self.state)
    }

    /// Drains leftover output, closes the pipes and reaps the child.
    ///
    /// Safe to call repeatedly. Refused while the process is running.
    pub fn cleanup(&mut self) -> Result<(), ProcessError> {
        if self.is_running() {
            return Err(ProcessError::StillRunning);
        }
        self.drain_remaining();
        self.pipes = None;
        if let Some(mut child) = self.child.take() {
            // Already reaped in every terminal state; `wait` then returns the cached status.
            let status = child.wait()?;
            self.exit_status.get_or_insert(status);
        }
        self.callback = None;
        Ok(())
    }

    /// Sends `signal` and waits for the child to go away, escalating to a kill when a
    /// graceful stop is ignored. Returns `Stopped` or `ForceStopped`.
    fn terminate(&mut self, signal: StopSignal) -> Result<ProcessState, ProcessError> {
        let Some(child) = self.child.as_ref() else {
            return Ok(ProcessState::Stopped);
        };
        signal::send(child, signal, self.isolate_process_group).map_err(ProcessError::Signal)?;

        if signal == StopSignal::Terminate {
            let deadline = Instant::now() + STOP_GRACE_PERIOD;
            while Instant::now() < deadline {
                // Keep the pipes moving so a chatty child cannot block on a full buffer.
                self.drain_remaining();
                if self.try_reap()?.is_some() {
                    return Ok(ProcessState::Stopped);
                }
                std::thread::sleep(STOP_POLL_INTERVAL);
            }
            if self.try_reap()?.is_some() {
                return Ok(ProcessState::Stopped);
            }
            debug!("Grace period elapsed, killing '{}'", self.command);
            if let Some(child) = self.child.as_ref() {
                signal::send(child, StopSignal::Kill, self.isolate_process_group)
                    .map_err(ProcessError::Signal)?;
            }
        }

        if let Some(child) = self.child.as_mut() {
            let status = child.wait()?;
            self.exit_status = Some(status);
        }
        Ok(ProcessState::ForceStopped)
    }

    fn try_reap(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(self.exit_status);
        };
        let status = child.try_wait()?;
        if status.is_some() {
            self.exit_status = status;
        }
        Ok(status)
    }

    fn drain_remaining(&mut self) {
        let Some(pipes) = self.pipes.as_mut() else {
            return;
        };
        match pipes.read_remaining() {
            Ok(received) => self.deliver(received),
            Err(e) => debug!("Ignoring error while draining output: {}", e),
        }
    }

    fn deliver(&mut self, received: Vec<Received>) {
        for Received { stream, bytes } in received {
            self.output.extend_from_slice(&bytes);
            if let Some(callback) = self.callback.as_mut() {
                callback(&OutputChunk {
                    stream,
                    bytes: &bytes,
                    cumulative: &self.output,
                });
            }
        }
    }
}

impl Drop for Process<'_> {
    fn drop(&mut self) {
        if self.is_running() {
            debug!("Process dropped while running, stopping '{}'", self.command);
            match self.terminate(StopSignal::Terminate) {
                Ok(state) => self.state = state,
                Err(e) => {
                    warn!("Failed to stop '{}' on drop: {}", self.command, e);
                    if let Some(child) = self.child.as_mut() {
                        let _ = child.kill();
                    }
                    self.state = ProcessState::ForceStopped;
                }
            }
        }
        let _ = self.cleanup();
    }
}
