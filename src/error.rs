//! Error types for the farm.

use std::io;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::master::state::WorkerState;

/// Transport faults on a worker's pipe pair.
///
/// A short read leaves the stream at an unknown offset, so every variant here
/// means the channel can no longer be trusted for further frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to read {expected}-byte frame header: {source}")]
    Header {
        expected: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {expected}-byte frame payload: {source}")]
    Payload {
        expected: usize,
        #[source]
        source: io::Error,
    },

    #[error("declared frame size {size} is smaller than the {header}-byte header")]
    Undersized { size: u64, header: usize },

    #[error("declared frame size {size} exceeds the {limit}-byte limit")]
    Oversized { size: u64, limit: usize },

    #[error("failed to write frame: {0}")]
    Write(#[source] io::Error),
}

impl FrameError {
    /// True when the peer closed the channel before a header arrived.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Header { source, .. } if source.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Errors that end the worker runtime.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("transport fault: {0}")]
    Frame(#[from] FrameError),

    #[error("failed to install handler for {signal}: {source}")]
    Install {
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    #[error("signal operation failed: {0}")]
    Signal(#[from] nix::Error),
}

/// Errors that end the master.
///
/// Everything except `Frame` is a process-management fault: the pool's
/// consistency depends on every spawn, signal and wait succeeding.
#[derive(Debug, thiserror::Error)]
pub enum FarmError {
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to send {signal} to worker {worker} (pid {pid}): {source}")]
    Signal {
        worker: usize,
        pid: Pid,
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    #[error("waitpid failed: {0}")]
    Wait(#[source] nix::Error),

    #[error("transport fault on worker {worker}: {source}")]
    Frame {
        worker: usize,
        #[source]
        source: FrameError,
    },

    #[error("worker {worker} (pid {pid}) died unexpectedly: {status}")]
    WorkerDied {
        worker: usize,
        pid: Pid,
        status: String,
    },

    #[error("worker {worker} cannot move from {from} to {to}")]
    InvalidTransition {
        worker: usize,
        from: WorkerState,
        to: WorkerState,
    },

    #[error("worker {worker} stopped without a problem in flight")]
    NoProblemInFlight { worker: usize },

    #[error("status change reported for unknown pid {0}")]
    UnknownPid(Pid),

    #[error("unexpected status for worker {worker}: {status}")]
    UnexpectedStatus { worker: usize, status: String },
}

/// Result type alias for the master.
pub type Result<T> = std::result::Result<T, FarmError>;
