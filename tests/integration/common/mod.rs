use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use nix::unistd::Pid;
use procfarm::master::{FarmConfig, Tracer, WorkerState};
use procfarm::solver::ScriptOp;
use procfarm::{Answer, Judge, Problem, VariantSource, Verdict};

pub fn worker_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_procfarm-worker"))
}

pub fn farm_config(workers: usize) -> FarmConfig {
    FarmConfig::default()
        .with_workers(workers)
        .with_worker_program(worker_binary())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Start,
    State {
        worker: usize,
        from: WorkerState,
        to: WorkerState,
    },
    Send {
        worker: usize,
        id: u32,
    },
    Recv {
        worker: usize,
        id: u32,
        failed: bool,
    },
    Cancel {
        worker: usize,
    },
    End,
}

/// Tracer whose log stays readable after the master consumes it.
#[derive(Clone, Default)]
pub struct RecordingTracer {
    pub events: Rc<RefCell<Vec<TraceEvent>>>,
}

impl RecordingTracer {
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    pub fn cancelled_workers(&self) -> Vec<usize> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Cancel { worker } => Some(*worker),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl Tracer for RecordingTracer {
    fn start(&mut self) {
        self.push(TraceEvent::Start);
    }

    fn change_state(&mut self, worker: usize, _: Pid, from: WorkerState, to: WorkerState) {
        self.push(TraceEvent::State { worker, from, to });
    }

    fn send_problem(&mut self, worker: usize, _: Pid, problem: &Problem) {
        self.push(TraceEvent::Send {
            worker,
            id: problem.id,
        });
    }

    fn recv_answer(&mut self, worker: usize, _: Pid, answer: &Answer) {
        self.push(TraceEvent::Recv {
            worker,
            id: answer.id,
            failed: answer.failed,
        });
    }

    fn cancel(&mut self, worker: usize, _: Pid) {
        self.push(TraceEvent::Cancel { worker });
    }

    fn end(&mut self) {
        self.push(TraceEvent::End);
    }
}

/// Hands out pre-built rounds of problems and accepts the answers whose
/// payload equals `winner`.
pub struct ScriptWorkload {
    rounds: VecDeque<Vec<Problem>>,
    current: Vec<Problem>,
    winner: Vec<u8>,
    pub verdicts: Vec<(u32, Verdict)>,
    pub unsolved: usize,
}

impl ScriptWorkload {
    pub fn new(winner: &[u8]) -> Self {
        Self {
            rounds: VecDeque::new(),
            current: Vec::new(),
            winner: winner.to_vec(),
            verdicts: Vec::new(),
            unsolved: 0,
        }
    }

    /// Append a round of script ops; ids are assigned in order.
    pub fn round(mut self, ops: Vec<ScriptOp>) -> Self {
        let first = self.next_id();
        let problems = ops
            .into_iter()
            .enumerate()
            .map(|(i, op)| op.into_problem(first + i as u32))
            .collect();
        self.rounds.push_back(problems);
        self
    }

    /// Append a round of raw problems.
    pub fn raw_round(mut self, problems: Vec<Problem>) -> Self {
        self.rounds.push_back(problems);
        self
    }

    fn next_id(&self) -> u32 {
        self.rounds.iter().map(|round| round.len() as u32).sum()
    }
}

impl VariantSource for ScriptWorkload {
    fn next_variant(&mut self, workers: usize, variant: usize) -> Option<Problem> {
        if variant == 0 {
            self.current = self.rounds.pop_front()?;
        }
        let problem = self.current.get(variant)?.clone();
        Some(problem.with_variant(workers as u16, variant as u16))
    }

    fn round_unsolved(&mut self) {
        self.unsolved += 1;
    }
}

impl Judge for ScriptWorkload {
    fn judge(&mut self, answer: &Answer, problem: &Problem) -> Verdict {
        let verdict = if answer.id == problem.id && !answer.failed && answer.payload == self.winner
        {
            Verdict::Accepted
        } else {
            Verdict::Rejected
        };
        self.verdicts.push((problem.id, verdict));
        verdict
    }
}
