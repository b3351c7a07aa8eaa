//! # Output Pipes
//!
//! File: cli/src/common/process/pipes.rs
//!
//! Readiness multiplexing over a child's stdout and stderr. Both read ends are switched
//! to `O_NONBLOCK` once at construction; a bounded `poll(2)` then tells which of them
//! have data (or hit end-of-file), and every ready stream is drained until the read
//! would block. A stream that reports end-of-file is dropped, which closes our end.
//!
//! This is the only place the supervising thread can block, and never for longer than
//! the slice handed to `wait_and_read`.
//!
use super::ProcessError;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd};
use std::process::{ChildStderr, ChildStdout};
use std::time::Duration;
use tracing::{debug, trace};

/// Size of a single `read(2)`.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Upper bound for one drain of one stream, so a child that writes without pause
/// cannot keep the poll loop from checking its deadline.
const DRAIN_LIMIT: usize = 1024 * 1024;

/// Which of the child's output streams a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Bytes read from one stream in one drain.
#[derive(Debug)]
pub(crate) struct Received {
    pub(crate) stream: OutputStream,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct Readiness {
    stdout: bool,
    stderr: bool,
}

/// The read ends of a child's stdout and stderr.
#[derive(Debug)]
pub(crate) struct OutputPipes {
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl OutputPipes {
    pub(crate) fn new(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> io::Result<Self> {
        if let Some(out) = &stdout {
            set_nonblocking(out)?;
        }
        if let Some(err) = &stderr {
            set_nonblocking(err)?;
        }
        Ok(Self { stdout, stderr })
    }

    /// Both streams reached end-of-file (or were never attached).
    pub(crate) fn is_closed(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }

    /// Waits at most `slice` for output, then drains every stream that is ready.
    ///
    /// With both streams closed this just sleeps for `slice`, so the caller keeps its
    /// cadence for liveness and deadline checks.
    pub(crate) fn wait_and_read(&mut self, slice: Duration) -> Result<Vec<Received>, ProcessError> {
        if self.is_closed() {
            std::thread::sleep(slice);
            return Ok(Vec::new());
        }
        let ready = retry_once_on_eintr(|| self.poll_streams(slice))?;

        let mut received = Vec::new();
        if ready.stdout {
            drain(&mut self.stdout, OutputStream::Stdout, &mut received)?;
        }
        if ready.stderr {
            drain(&mut self.stderr, OutputStream::Stderr, &mut received)?;
        }
        Ok(received)
    }

    /// Reads whatever is still buffered without waiting.
    pub(crate) fn read_remaining(&mut self) -> io::Result<Vec<Received>> {
        let mut received = Vec::new();
        drain(&mut self.stdout, OutputStream::Stdout, &mut received)?;
        drain(&mut self.stderr, OutputStream::Stderr, &mut received)?;
        Ok(received)
    }

    fn poll_streams(&self, slice: Duration) -> nix::Result<Readiness> {
        let mut fds = Vec::with_capacity(2);
        let mut streams = Vec::with_capacity(2);
        if let Some(out) = &self.stdout {
            fds.push(PollFd::new(out.as_fd(), PollFlags::POLLIN));
            streams.push(OutputStream::Stdout);
        }
        if let Some(err) = &self.stderr {
            fds.push(PollFd::new(err.as_fd(), PollFlags::POLLIN));
            streams.push(OutputStream::Stderr);
        }

        let count = poll(&mut fds, poll_timeout(slice))?;
        let mut ready = Readiness::default();
        if count == 0 {
            return Ok(ready);
        }
        for (fd, stream) in fds.iter().zip(streams) {
            // POLLHUP without POLLIN still needs a read to observe end-of-file.
            let fired = fd.revents().is_some_and(|events| {
                events.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
            });
            match stream {
                OutputStream::Stdout => ready.stdout = fired,
                OutputStream::Stderr => ready.stderr = fired,
            }
        }
        Ok(ready)
    }
}

/// Runs `attempt` and, if it was interrupted by a signal, runs it exactly once more.
/// A second interruption, like any other failure, becomes `ProcessError::Io`.
fn retry_once_on_eintr<T>(mut attempt: impl FnMut() -> nix::Result<T>) -> Result<T, ProcessError> {
    let result = match attempt() {
        Err(Errno::EINTR) => {
            debug!("Readiness wait was interrupted by a signal, retrying once.");
            attempt()
        }
        other => other,
    };
    result.map_err(|errno| ProcessError::Io(io::Error::from(errno)))
}

fn poll_timeout(slice: Duration) -> PollTimeout {
    PollTimeout::from(u16::try_from(slice.as_millis()).unwrap_or(u16::MAX))
}

fn set_nonblocking<F: AsRawFd>(fd: &F) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(raw, FcntlArg::F_GETFL)?);
    fcntl(raw, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Reads `slot` until it would block, hits end-of-file or `DRAIN_LIMIT` is reached.
/// On end-of-file the stream is dropped.
fn drain<R: Read>(
    slot: &mut Option<R>,
    stream: OutputStream,
    received: &mut Vec<Received>,
) -> io::Result<()> {
    let Some(reader) = slot.as_mut() else {
        return Ok(());
    };

    let mut bytes = Vec::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let mut eof = false;
    while bytes.len() < DRAIN_LIMIT {
        match reader.read(&mut buffer) {
            Ok(0) => {
                eof = true;
                break;
            }
            Ok(n) => bytes.extend_from_slice(buffer.get(..n).unwrap_or_default()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    if eof {
        trace!("{:?} reached end-of-file", stream);
        *slot = None;
    }
    if !bytes.is_empty() {
        received.push(Received { stream, bytes });
    }
    Ok(())
}
