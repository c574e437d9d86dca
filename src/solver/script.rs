//! Scripted solver: the payload tells the solver how to behave.
//!
//! Layout: `op:u8` followed by op-specific bytes.
//! - `Echo` (0): answer with the remaining bytes.
//! - `Fail` (1): failed answer.
//! - `Delay` (2): `millis:u32`, then echo bytes. Sleeps while polling the
//!   cancel flag.
//! - `Hang` (3): never finishes on its own; returns only once cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::protocol::{Answer, Problem, ProblemKind};
use crate::solver::Solver;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    Echo(Vec<u8>),
    Fail,
    Delay { millis: u32, echo: Vec<u8> },
    Hang,
}

impl ScriptOp {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ScriptOp::Echo(echo) => {
                let mut out = vec![0];
                out.extend_from_slice(echo);
                out
            }
            ScriptOp::Fail => vec![1],
            ScriptOp::Delay { millis, echo } => {
                let mut out = vec![2];
                out.extend_from_slice(&millis.to_le_bytes());
                out.extend_from_slice(echo);
                out
            }
            ScriptOp::Hang => vec![3],
        }
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        let (&op, rest) = payload.split_first()?;
        match op {
            0 => Some(ScriptOp::Echo(rest.to_vec())),
            1 => Some(ScriptOp::Fail),
            2 if rest.len() >= 4 => Some(ScriptOp::Delay {
                millis: u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]),
                echo: rest[4..].to_vec(),
            }),
            3 => Some(ScriptOp::Hang),
            _ => None,
        }
    }

    /// Wrap this op in a script problem.
    pub fn into_problem(self, id: u32) -> Problem {
        Problem::new(id, ProblemKind::Script, self.encode())
    }
}

pub struct ScriptSolver;

impl Solver for ScriptSolver {
    fn name(&self) -> &str {
        "script"
    }

    fn solve(&self, problem: &Problem, cancel: &AtomicBool) -> Option<Answer> {
        let Some(op) = ScriptOp::decode(&problem.payload) else {
            tracing::warn!(id = problem.id, "malformed script payload");
            return Some(Answer::failed(problem.id));
        };

        match op {
            ScriptOp::Echo(echo) => Some(Answer::solved(problem.id, echo)),
            ScriptOp::Fail => Some(Answer::failed(problem.id)),
            ScriptOp::Delay { millis, echo } => {
                let deadline = Instant::now() + Duration::from_millis(u64::from(millis));
                while Instant::now() < deadline {
                    if cancel.load(Ordering::SeqCst) {
                        return None;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Some(Answer::solved(problem.id, echo))
            }
            ScriptOp::Hang => {
                while !cancel.load(Ordering::SeqCst) {
                    thread::sleep(POLL_INTERVAL);
                }
                None
            }
        }
    }
}
