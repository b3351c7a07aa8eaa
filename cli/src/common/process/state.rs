//! # Process Lifecycle State
//!
//! File: cli/src/common/process/state.rs
//!
//! The lifecycle of one supervised invocation:
//!
//! ```text
//!   Ready ──start()──▶ Running ──exit──────────────▶ Stopped
//!                         │ ──stop(Terminate) ok────▶ Stopped
//!                         │ ──stop(Kill)/escalate──▶ ForceStopped
//!                         └ ──deadline passed─────▶ TimedOut
//! ```
//!
//! The last three are terminal. A terminal process can be re-armed with a fresh
//! `start()`, which moves it straight back to `Running`.
//!
use std::fmt;

/// Where a `Process` is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Configured, never started.
    Ready,
    /// Child spawned, pipes open, polling active.
    Running,
    /// Child exited on its own or honoured a graceful stop.
    Stopped,
    /// A kill signal was needed to end the child.
    ForceStopped,
    /// The wall-clock budget ran out; the child was terminated.
    TimedOut,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::ForceStopped | Self::TimedOut)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::ForceStopped => "force-stopped",
            Self::TimedOut => "timed-out",
        };
        f.write_str(label)
    }
}
