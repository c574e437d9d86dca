//! Master loop: assignment, arbitration, cancellation and shutdown.

use std::time::Instant;

use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::{FarmError, Result};
use crate::master::config::FarmConfig;
use crate::master::pool::WorkerPool;
use crate::master::state::WorkerState;
use crate::master::summary::{RunSummary, ShutdownReport};
use crate::master::trace::Tracer;
use crate::workload::{Judge, VariantSource, Verdict};

/// Drives a pool of workers through rounds of problem variants.
pub struct Master<T: Tracer> {
    pool: WorkerPool,
    tracer: T,
}

impl<T: Tracer> Master<T> {
    /// Spawn the pool and wait until every worker has stopped itself.
    pub fn start(config: &FarmConfig, mut tracer: T) -> Result<Self> {
        // A worker that exits early must surface as a write error, not kill us.
        // SAFETY: SIG_IGN installs no handler code.
        if let Err(err) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) } {
            tracing::warn!("failed to ignore SIGPIPE: {}", err);
        }

        tracer.start();
        let pool = WorkerPool::spawn(config)?;
        let mut master = Self { pool, tracer };

        for _ in 0..master.pool.len() {
            let (index, status) = master.pool.wait_any(Some(WaitPidFlag::WUNTRACED))?;
            if !is_report(&status) {
                return Err(master.unexpected(index, status));
            }
            master.transition(index, WorkerState::Idle)?;
        }

        tracing::info!(workers = master.pool.len(), "all workers idle");
        Ok(master)
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.pool.pids()
    }

    pub fn states(&self) -> Vec<WorkerState> {
        self.pool.states()
    }

    /// Run rounds until the workload runs out of variants.
    pub fn run<W: VariantSource + Judge>(&mut self, workload: &mut W) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut exhausted = false;

        while !exhausted {
            let assigned = self.assign_round(workload, &mut exhausted, &mut summary)?;
            if assigned == 0 {
                break;
            }
            summary.rounds += 1;

            match self.arbitrate(workload, assigned, &mut summary)? {
                Some(winner) => {
                    summary.accepted += 1;
                    tracing::info!(round = summary.rounds, worker = winner, "round won");
                    self.cancel_outstanding(&mut summary)?;
                }
                None => {
                    summary.unsolved_rounds += 1;
                    tracing::warn!(round = summary.rounds, "every variant was rejected");
                    workload.round_unsolved();
                }
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Hand one variant to each worker in index order. Returns how many were
    /// assigned; sets `exhausted` once the source runs dry.
    fn assign_round<W: VariantSource>(
        &mut self,
        workload: &mut W,
        exhausted: &mut bool,
        summary: &mut RunSummary,
    ) -> Result<usize> {
        let workers = self.pool.len();
        let mut assigned = 0;

        for index in 0..workers {
            let Some(problem) = workload.next_variant(workers, assigned) else {
                tracing::debug!("variant source exhausted");
                *exhausted = true;
                break;
            };

            // The transition check refuses to continue a worker that is not idle.
            self.transition(index, WorkerState::Continued)?;
            self.pool.signal(index, Signal::SIGCONT)?;
            match self.pool.wait_for(index, Some(WaitPidFlag::WCONTINUED))? {
                WaitStatus::Continued(_) => {}
                other => return Err(self.unexpected(index, other)),
            }
            self.transition(index, WorkerState::Running)?;

            self.tracer.send_problem(index, self.pool.pid(index), &problem);
            self.pool.send_problem(index, problem)?;
            summary.problems_sent += 1;
            assigned += 1;
        }

        Ok(assigned)
    }

    /// Collect answers as workers stop until one is accepted, or every
    /// assigned worker has reported.
    fn arbitrate<W: Judge>(
        &mut self,
        workload: &mut W,
        assigned: usize,
        summary: &mut RunSummary,
    ) -> Result<Option<usize>> {
        let mut outstanding = assigned;

        while outstanding > 0 {
            let (index, status) = self.pool.wait_any(Some(WaitPidFlag::WUNTRACED))?;
            if !is_report(&status) {
                return Err(self.unexpected(index, status));
            }
            self.transition(index, WorkerState::Stopped)?;
            self.transition(index, WorkerState::Idle)?;
            outstanding -= 1;

            // The worker flushed this answer before it stopped.
            let answer = self.pool.receive_answer(index)?;
            self.tracer.recv_answer(index, self.pool.pid(index), &answer);
            summary.answers_received += 1;

            let problem = self.pool.take_problem(index)?;
            match workload.judge(&answer, &problem) {
                Verdict::Accepted => {
                    tracing::debug!(worker = index, id = answer.id, "answer accepted");
                    return Ok(Some(index));
                }
                Verdict::Rejected => {
                    tracing::debug!(worker = index, id = answer.id, failed = answer.failed, "answer rejected");
                    summary.rejected += 1;
                }
            }
        }

        Ok(None)
    }

    /// Cancel every worker still attempting a problem and bring it back to idle.
    fn cancel_outstanding(&mut self, summary: &mut RunSummary) -> Result<()> {
        for index in 0..self.pool.len() {
            if self.pool.state(index).is_assignable() {
                continue;
            }

            let pid = self.pool.pid(index);
            let polled = WaitPidFlag::WUNTRACED | WaitPidFlag::WNOHANG;
            let mut status = self.pool.wait_for(index, Some(polled))?;
            if status == WaitStatus::StillAlive {
                self.tracer.cancel(index, pid);
                self.pool.cancel(index)?;
                status = self.pool.wait_for(index, Some(WaitPidFlag::WUNTRACED))?;
            } else {
                tracing::debug!(worker = index, "finished before it could be cancelled");
            }
            if !is_report(&status) {
                return Err(self.unexpected(index, status));
            }
            self.transition(index, WorkerState::Stopped)?;
            self.transition(index, WorkerState::Idle)?;

            // The worker reports exactly once per problem, even when it
            // finished before the cancel arrived. Drain that answer so the
            // next round starts on a clean pipe.
            let answer = self.pool.receive_answer(index)?;
            self.tracer.recv_answer(index, pid, &answer);
            self.pool.take_problem(index)?;
            summary.answers_received += 1;
            summary.cancelled += 1;
        }

        Ok(())
    }

    /// Close every channel, ask every worker to exit and reap them all.
    ///
    /// Abnormal exits are recorded in the report; waiting continues until
    /// every worker is reaped.
    pub fn shutdown(mut self) -> Result<ShutdownReport> {
        let workers = self.pool.len();
        for index in 0..workers {
            self.pool.close_channels(index);
        }

        // A stopped worker must be woken to observe SIGTERM.
        for index in 0..workers {
            self.pool.signal(index, Signal::SIGTERM)?;
            self.pool.signal(index, Signal::SIGCONT)?;
        }

        let mut report = ShutdownReport::default();
        let mut remaining = workers;
        while remaining > 0 {
            let (index, status) = self.pool.wait_any(None)?;
            let abnormal = match status {
                WaitStatus::Exited(_, 0) => None,
                WaitStatus::Exited(_, code) => Some(format!("exit status {}", code)),
                WaitStatus::Signaled(_, signal, _) => Some(format!("killed by {}", signal)),
                _ => continue,
            };
            remaining -= 1;

            match abnormal {
                None => {
                    self.transition(index, WorkerState::Exited)?;
                    report.exited.push(index);
                }
                Some(how) => {
                    tracing::warn!(worker = index, "worker ended abnormally: {}", how);
                    self.transition(index, WorkerState::Aborted)?;
                    report.aborted.push((index, how));
                }
            }
        }

        self.tracer.end();
        Ok(report)
    }

    fn transition(&mut self, index: usize, to: WorkerState) -> Result<()> {
        self.pool.transition(index, to, &mut self.tracer)
    }

    /// Turn an unexpected wait status into an error, recording a dead worker.
    fn unexpected(&mut self, index: usize, status: WaitStatus) -> FarmError {
        match status {
            WaitStatus::Exited(pid, _) | WaitStatus::Signaled(pid, _, _) => {
                if let Err(err) = self.transition(index, WorkerState::Aborted) {
                    tracing::debug!("{}", err);
                }
                FarmError::WorkerDied {
                    worker: index,
                    pid,
                    status: format!("{:?}", status),
                }
            }
            other => FarmError::UnexpectedStatus {
                worker: index,
                status: format!("{:?}", other),
            },
        }
    }
}

/// A worker reports by stopping itself with SIGSTOP. Terminal stops
/// (SIGTSTP, SIGTTIN, SIGTTOU) leave nothing to read.
fn is_report(status: &WaitStatus) -> bool {
    matches!(status, WaitStatus::Stopped(_, Signal::SIGSTOP))
}
