//! The master's collaborators: where problem variants come from and how
//! answers are judged.

pub mod miner;

use crate::protocol::{Answer, Problem};

pub use miner::MinerWorkload;

/// Produces the problem variants handed out each round.
pub trait VariantSource {
    /// Variant `variant` (0-based) of the current round for a pool of
    /// `workers`, or `None` when there is nothing left to solve.
    fn next_variant(&mut self, workers: usize, variant: usize) -> Option<Problem>;

    /// Every variant of the last round was rejected.
    fn round_unsolved(&mut self) {}
}

/// Decides whether an answer solves the problem it was produced for.
pub trait Judge {
    fn judge(&mut self, answer: &Answer, problem: &Problem) -> Verdict;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }
}
