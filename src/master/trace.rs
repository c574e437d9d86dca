//! Observability hook for the master.
//!
//! Every state transition and every problem/answer exchange is reported to a
//! [`Tracer`]. Tracers observe only; they cannot influence the protocol.

use nix::unistd::Pid;

use crate::master::state::WorkerState;
use crate::protocol::{Answer, Problem};

pub trait Tracer {
    /// The farm is about to spawn its workers.
    fn start(&mut self) {}

    fn change_state(&mut self, worker: usize, pid: Pid, from: WorkerState, to: WorkerState);

    fn send_problem(&mut self, worker: usize, pid: Pid, problem: &Problem);

    fn recv_answer(&mut self, worker: usize, pid: Pid, answer: &Answer);

    /// The master is about to cancel the worker's attempt.
    fn cancel(&mut self, worker: usize, pid: Pid);

    /// Every worker has been reaped.
    fn end(&mut self) {}
}

/// Reports events through `tracing`.
#[derive(Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn start(&mut self) {
        tracing::info!("farm starting");
    }

    fn change_state(&mut self, worker: usize, pid: Pid, from: WorkerState, to: WorkerState) {
        tracing::debug!(worker, pid = pid.as_raw(), %from, %to, "state change");
    }

    fn send_problem(&mut self, worker: usize, pid: Pid, problem: &Problem) {
        tracing::debug!(
            worker,
            pid = pid.as_raw(),
            id = problem.id,
            kind = problem.kind,
            variant = problem.variant,
            size = problem.size(),
            "problem sent"
        );
    }

    fn recv_answer(&mut self, worker: usize, pid: Pid, answer: &Answer) {
        tracing::debug!(
            worker,
            pid = pid.as_raw(),
            id = answer.id,
            failed = answer.failed,
            size = answer.size(),
            "answer received"
        );
    }

    fn cancel(&mut self, worker: usize, pid: Pid) {
        tracing::debug!(worker, pid = pid.as_raw(), "cancelling attempt");
    }

    fn end(&mut self) {
        tracing::info!("farm finished");
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn change_state(&mut self, _: usize, _: Pid, _: WorkerState, _: WorkerState) {}

    fn send_problem(&mut self, _: usize, _: Pid, _: &Problem) {}

    fn recv_answer(&mut self, _: usize, _: Pid, _: &Answer) {}

    fn cancel(&mut self, _: usize, _: Pid) {}
}
