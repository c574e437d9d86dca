//! The worker processes and their pipes.
//!
//! All workers share one process group led by the first worker, so a single
//! `waitpid(-pgid)` reports whichever worker changes state next without
//! touching other children of this process.

use std::collections::HashMap;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{ChildStdin, ChildStdout, Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

use crate::error::{FarmError, FrameError, Result};
use crate::master::config::FarmConfig;
use crate::master::state::WorkerState;
use crate::master::trace::Tracer;
use crate::protocol::{ANSWER_HEADER_LEN, Answer, Problem, read_frame, write_frame};

/// Master-side record of one worker.
#[derive(Debug)]
struct WorkerSlot {
    id: usize,
    pid: Pid,
    state: WorkerState,
    /// Master to worker (the worker's stdin).
    input: Option<ChildStdin>,
    /// Worker to master (the worker's stdout).
    output: Option<ChildStdout>,
    /// The problem this worker is attempting, if any.
    problem: Option<Problem>,
    reaped: bool,
}

pub struct WorkerPool {
    slots: Vec<WorkerSlot>,
    by_pid: HashMap<Pid, usize>,
    group: Option<Pid>,
    max_frame_bytes: usize,
}

impl WorkerPool {
    /// Spawn `config.workers` workers, each in state `Started`.
    ///
    /// On failure the workers spawned so far are killed and reaped.
    pub fn spawn(config: &FarmConfig) -> Result<Self> {
        let mut pool = Self {
            slots: Vec::with_capacity(config.workers),
            by_pid: HashMap::with_capacity(config.workers),
            group: None,
            max_frame_bytes: config.max_frame_bytes,
        };

        for id in 0..config.workers {
            let mut command = Command::new(&config.worker_program);
            command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .process_group(pool.group.map_or(0, |group| group.as_raw()));

            let mut child = command
                .spawn()
                .map_err(|source| FarmError::Spawn { worker: id, source })?;
            let pid = Pid::from_raw(child.id() as i32);
            pool.group.get_or_insert(pid);

            tracing::debug!(worker = id, pid = pid.as_raw(), "worker spawned");
            pool.by_pid.insert(pid, id);
            pool.slots.push(WorkerSlot {
                id,
                pid,
                state: WorkerState::Started,
                input: child.stdin.take(),
                output: child.stdout.take(),
                problem: None,
                reaped: false,
            });
        }

        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn pid(&self, index: usize) -> Pid {
        self.slots[index].pid
    }

    pub fn state(&self, index: usize) -> WorkerState {
        self.slots[index].state
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.slots.iter().map(|slot| slot.pid).collect()
    }

    pub fn states(&self) -> Vec<WorkerState> {
        self.slots.iter().map(|slot| slot.state).collect()
    }

    pub fn index_of(&self, pid: Pid) -> Result<usize> {
        self.by_pid.get(&pid).copied().ok_or(FarmError::UnknownPid(pid))
    }

    /// Move a worker to `to`, reporting the change to `tracer`.
    pub fn transition<T: Tracer + ?Sized>(
        &mut self,
        index: usize,
        to: WorkerState,
        tracer: &mut T,
    ) -> Result<()> {
        let slot = &mut self.slots[index];
        let from = slot.state;
        if !from.can_transition_to(to) {
            return Err(FarmError::InvalidTransition {
                worker: index,
                from,
                to,
            });
        }
        tracer.change_state(index, slot.pid, from, to);
        slot.state = to;
        Ok(())
    }

    pub fn signal(&self, index: usize, signal: Signal) -> Result<()> {
        let pid = self.slots[index].pid;
        kill(pid, signal).map_err(|source| FarmError::Signal {
            worker: index,
            pid,
            signal,
            source,
        })
    }

    /// Ask worker `index` to abandon the problem in flight.
    ///
    /// SIGHUP is queued with the problem id, so a request that reaches the
    /// worker after it answered cannot cancel its next problem.
    pub fn cancel(&self, index: usize) -> Result<()> {
        let slot = &self.slots[index];
        let id = slot
            .problem
            .as_ref()
            .map(|problem| problem.id)
            .ok_or(FarmError::NoProblemInFlight { worker: index })?;

        let value = libc::sigval {
            sival_ptr: id as usize as *mut libc::c_void,
        };
        // SAFETY: sigqueue only reads its arguments.
        if unsafe { libc::sigqueue(slot.pid.as_raw(), libc::SIGHUP, value) } == -1 {
            return Err(FarmError::Signal {
                worker: index,
                pid: slot.pid,
                signal: Signal::SIGHUP,
                source: Errno::last(),
            });
        }
        Ok(())
    }

    /// Block until any worker reports a status change matching `flags`.
    pub fn wait_any(&mut self, flags: Option<WaitPidFlag>) -> Result<(usize, WaitStatus)> {
        let group = self.group.ok_or(FarmError::Wait(Errno::ECHILD))?;
        loop {
            let status = wait_retrying(Pid::from_raw(-group.as_raw()), flags)?;
            // Only WNOHANG produces a status without a pid.
            let Some(pid) = status.pid() else { continue };
            let index = self.index_of(pid)?;
            self.note_status(index, &status);
            return Ok((index, status));
        }
    }

    /// Block until worker `index` reports a status change matching `flags`.
    pub fn wait_for(&mut self, index: usize, flags: Option<WaitPidFlag>) -> Result<WaitStatus> {
        let status = wait_retrying(self.slots[index].pid, flags)?;
        self.note_status(index, &status);
        Ok(status)
    }

    fn note_status(&mut self, index: usize, status: &WaitStatus) {
        if matches!(status, WaitStatus::Exited(..) | WaitStatus::Signaled(..)) {
            self.slots[index].reaped = true;
        }
    }

    /// Write `problem` to the worker and remember it as in flight.
    pub fn send_problem(&mut self, index: usize, problem: Problem) -> Result<()> {
        let slot = &mut self.slots[index];
        let input = slot.input.as_mut().ok_or_else(|| FarmError::Frame {
            worker: index,
            source: FrameError::Write(closed_channel()),
        })?;
        write_frame(input, &problem).map_err(|source| FarmError::Frame {
            worker: index,
            source,
        })?;
        slot.problem = Some(problem);
        Ok(())
    }

    /// Read the one answer a stopped worker has written.
    pub fn receive_answer(&mut self, index: usize) -> Result<Answer> {
        let max_frame_bytes = self.max_frame_bytes;
        let output = self.slots[index].output.as_mut().ok_or_else(|| FarmError::Frame {
            worker: index,
            source: FrameError::Header {
                expected: ANSWER_HEADER_LEN,
                source: closed_channel(),
            },
        })?;
        read_frame(output, max_frame_bytes).map_err(|source| FarmError::Frame {
            worker: index,
            source,
        })
    }

    /// Hand back the problem worker `index` was attempting.
    pub fn take_problem(&mut self, index: usize) -> Result<Problem> {
        self.slots[index]
            .problem
            .take()
            .ok_or(FarmError::NoProblemInFlight { worker: index })
    }

    /// Drop both pipe ends held for worker `index`.
    pub fn close_channels(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.input = None;
        slot.output = None;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if slot.reaped {
                continue;
            }
            slot.input = None;
            slot.output = None;
            tracing::warn!(worker = slot.id, pid = slot.pid.as_raw(), state = %slot.state, "killing worker left behind");
            if kill(slot.pid, Signal::SIGKILL).is_ok() {
                let _ = wait_retrying(slot.pid, None);
            }
            slot.reaped = true;
        }
    }
}

fn wait_retrying(pid: Pid, flags: Option<WaitPidFlag>) -> Result<WaitStatus> {
    loop {
        match waitpid(pid, flags) {
            Err(Errno::EINTR) => continue,
            other => return other.map_err(FarmError::Wait),
        }
    }
}

fn closed_channel() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "channel already closed")
}
