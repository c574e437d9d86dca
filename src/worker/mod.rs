//! Worker side of the farm.
//!
//! A worker announces readiness by stopping itself. The master continues it
//! once a problem is waiting on its stdin; the worker reads the problem,
//! solves it, writes exactly one answer to stdout and stops again.
//!
//! - `signals`: [`SignalControl`], the job-control signal backend
//! - `runtime`: [`WorkerRuntime`], the event loop
//! - `cancel`: [`CancelToken`], cancellation requests tagged by problem id

pub mod cancel;
pub mod runtime;
pub mod signals;

use std::io;

use crate::error::WorkerError;
use crate::solver::SolverRegistry;

pub use cancel::CancelToken;
pub use runtime::WorkerRuntime;
pub use signals::SignalControl;

/// Pending requests, drained in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Exit now.
    Terminate,
    /// A problem is available on the input channel.
    Run,
    /// A cancel request arrived; it has already been routed to the
    /// [`CancelToken`].
    Cancel,
}

/// How the runtime waits for requests and yields back to its observer.
pub trait Control {
    /// Block until an event is pending, then clear and return it.
    fn next_event(&mut self) -> Result<Event, WorkerError>;

    /// Cancellation requests received for this worker.
    fn cancel(&self) -> &CancelToken;

    /// Become idle; returns once the observer wakes the worker again.
    fn suspend(&mut self) -> Result<(), WorkerError>;
}

/// Run a worker on this process's stdin/stdout with the built-in solvers.
pub fn run_worker() -> Result<(), WorkerError> {
    let control = SignalControl::install()?;
    let mut runtime = WorkerRuntime::new(
        control,
        io::stdin().lock(),
        io::stdout().lock(),
        SolverRegistry::with_defaults(),
    );
    runtime.run()
}
