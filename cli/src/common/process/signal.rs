//! # Stop Signals
//!
//! File: cli/src/common/process/signal.rs
//!
//! Platform-neutral "graceful stop" and "force kill" primitives. Callers only ever
//! say `Terminate` or `Kill`; the mapping to `SIGTERM` and `SIGKILL`, and whether the
//! signal goes to the child alone or to the process group it leads, lives here.
//!
use std::io;
use std::process::Child;

/// How a running child should be asked to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopSignal {
    /// Ask the child to shut down (`SIGTERM`).
    #[default]
    Terminate,
    /// End the child unconditionally (`SIGKILL`).
    Kill,
}

impl StopSignal {
    fn as_nix(self) -> nix::sys::signal::Signal {
        match self {
            Self::Terminate => nix::sys::signal::Signal::SIGTERM,
            Self::Kill => nix::sys::signal::Signal::SIGKILL,
        }
    }
}

/// Delivers `signal` to `child`, or to its whole process group when `group` is set.
///
/// A child that has already exited (`ESRCH`) is not an error.
pub(crate) fn send(child: &Child, signal: StopSignal, group: bool) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg};
    use nix::unistd::Pid;

    let raw_pid = i32::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let pid = Pid::from_raw(raw_pid);
    let result = if group {
        killpg(pid, signal.as_nix())
    } else {
        kill(pid, signal.as_nix())
    };
    match result {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}
