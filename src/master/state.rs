//! Worker lifecycle state machine, as seen by the master.

/// State of one worker.
///
/// Mutated only by the master, after observing a status change from
/// `waitpid` or right before sending a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Spawned, not yet confirmed stopped.
    Started,
    /// Stopped and ready for a problem.
    Idle,
    /// Sent SIGCONT, not yet confirmed running.
    Continued,
    /// Confirmed running with a problem assigned.
    Running,
    /// Confirmed stopped (or asked to stop by cancellation).
    Stopped,
    /// Exited successfully at shutdown.
    Exited,
    /// Exited unsuccessfully or was killed.
    Aborted,
}

impl WorkerState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, target),
            (Started, Idle) | (Started, Aborted) |
            (Idle, Continued) | (Idle, Stopped) | (Idle, Exited) | (Idle, Aborted) |
            (Continued, Running) | (Continued, Aborted) |
            (Running, Stopped) | (Running, Aborted) |
            (Stopped, Idle)
        )
    }

    /// Check if the worker process is gone.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited | Self::Aborted)
    }

    /// Check if the worker may receive a problem.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Started => "started",
            Self::Idle => "idle",
            Self::Continued => "continued",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Exited => "exited",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}
