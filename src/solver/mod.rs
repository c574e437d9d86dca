//! Solver capabilities invoked by the worker runtime.
//!
//! A solver receives one problem and a cooperative cancellation flag. It must
//! poll the flag and return `None` once it observes a cancellation; otherwise
//! it returns an [`Answer`], either solved or failed.

pub mod miner;
pub mod script;

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use crate::protocol::{Answer, Problem, ProblemKind};

pub use miner::{MinerSolver, MinerTask};
pub use script::{ScriptOp, ScriptSolver};

/// A capability that attempts to solve problems of one kind.
pub trait Solver: Send + Sync {
    fn name(&self) -> &str;

    /// Attempt `problem`, returning `None` if `cancel` was observed.
    fn solve(&self, problem: &Problem, cancel: &AtomicBool) -> Option<Answer>;
}

/// Dispatch table from problem kind to solver.
#[derive(Default)]
pub struct SolverRegistry {
    solvers: HashMap<u16, Box<dyn Solver>>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in solver.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ProblemKind::Script, ScriptSolver);
        registry.register(ProblemKind::Miner, MinerSolver);
        registry
    }

    pub fn register(&mut self, kind: ProblemKind, solver: impl Solver + 'static) {
        self.register_code(kind.code(), solver);
    }

    /// Register a solver under a raw kind code.
    pub fn register_code(&mut self, code: u16, solver: impl Solver + 'static) {
        self.solvers.insert(code, Box::new(solver));
    }

    pub fn get(&self, code: u16) -> Option<&dyn Solver> {
        self.solvers.get(&code).map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    /// Dispatch `problem` to the solver registered for its kind.
    ///
    /// A problem of an unregistered kind gets a failed answer.
    pub fn solve(&self, problem: &Problem, cancel: &AtomicBool) -> Option<Answer> {
        match self.get(problem.kind) {
            Some(solver) => {
                tracing::debug!(id = problem.id, solver = solver.name(), "dispatching problem");
                solver.solve(problem, cancel)
            }
            None => {
                tracing::warn!(id = problem.id, kind = problem.kind, "no solver for problem kind");
                Some(Answer::failed(problem.id))
            }
        }
    }
}
