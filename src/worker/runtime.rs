//! The worker event loop.

use std::io::{Read, Write};
use std::sync::atomic::Ordering;

use crate::error::WorkerError;
use crate::protocol::{Answer, DEFAULT_MAX_FRAME_BYTES, Problem, read_frame, write_frame};
use crate::solver::SolverRegistry;
use crate::worker::{Control, Event};

/// Executes problems read from `input` and reports answers on `output`.
pub struct WorkerRuntime<C, R, W> {
    control: C,
    input: R,
    output: W,
    solvers: SolverRegistry,
    max_frame_bytes: usize,
    attempts: u64,
}

impl<C: Control, R: Read, W: Write> WorkerRuntime<C, R, W> {
    pub fn new(control: C, input: R, output: W, solvers: SolverRegistry) -> Self {
        Self {
            control,
            input,
            output,
            solvers,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            attempts: 0,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Number of problems this runtime has answered.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Announce readiness, then serve events until asked to terminate.
    pub fn run(&mut self) -> Result<(), WorkerError> {
        self.control.suspend()?;

        loop {
            match self.control.next_event()? {
                Event::Terminate => {
                    tracing::debug!(attempts = self.attempts, "terminating");
                    return Ok(());
                }
                Event::Run => self.attempt()?,
                Event::Cancel => {
                    // The token already holds the request; nothing is in flight.
                    tracing::debug!("cancellation with nothing in flight ignored");
                }
            }
        }
    }

    /// Read, solve and answer one problem, then suspend.
    ///
    /// Exactly one answer is written for every problem decoded here.
    fn attempt(&mut self) -> Result<(), WorkerError> {
        let problem: Problem = read_frame(&mut self.input, self.max_frame_bytes)?;
        tracing::debug!(id = problem.id, kind = problem.kind, size = problem.size(), "problem received");

        // A cancel for this problem may already have arrived with the SIGCONT
        // that woke us; arming picks it up.
        let cancel = self.control.cancel().arm(problem.id);
        let answer = match self.solvers.solve(&problem, cancel) {
            None => {
                tracing::debug!(id = problem.id, "attempt abandoned");
                Answer::failed(problem.id)
            }
            Some(answer) => {
                if cancel.load(Ordering::SeqCst) {
                    tracing::debug!(id = problem.id, "cancellation arrived after the outcome");
                }
                if answer.failed {
                    Answer::failed(problem.id)
                } else {
                    Answer {
                        id: problem.id,
                        ..answer
                    }
                }
            }
        };
        self.control.cancel().disarm();
        drop(problem);

        write_frame(&mut self.output, &answer)?;
        self.attempts += 1;
        tracing::debug!(id = answer.id, failed = answer.failed, "answer sent");

        self.control.suspend()
    }
}
