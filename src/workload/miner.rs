//! Proof-of-work workload: mine a fixed number of random blocks.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::protocol::{Answer, Problem};
use crate::solver::MinerTask;
use crate::solver::miner::{answer_nonce, verify};
use crate::workload::{Judge, VariantSource, Verdict};

/// Length of each generated block.
pub const BLOCK_LEN: usize = 32;

/// A block together with the nonce that solved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedBlock {
    pub block: Vec<u8>,
    pub nonce: u64,
}

pub struct MinerWorkload {
    rounds: u64,
    difficulty: u8,
    window: u64,
    rng: ChaCha8Rng,
    next_id: u32,
    /// Block currently being mined, if any.
    block: Option<Vec<u8>>,
    offset: u64,
    mined: Vec<MinedBlock>,
}

impl MinerWorkload {
    /// Mine `rounds` blocks at `difficulty` leading zero bits, searching
    /// `window` nonces per round. Without a seed the blocks are random.
    pub fn new(rounds: u64, difficulty: u8, window: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        Self {
            rounds,
            difficulty,
            window: window.max(1),
            rng,
            next_id: 0,
            block: None,
            offset: 0,
            mined: Vec::new(),
        }
    }

    pub fn mined(&self) -> &[MinedBlock] {
        &self.mined
    }

    pub fn is_done(&self) -> bool {
        self.mined.len() as u64 >= self.rounds
    }

    fn current_block(&mut self) -> Vec<u8> {
        if let Some(block) = &self.block {
            return block.clone();
        }
        let mut block = vec![0; BLOCK_LEN];
        self.rng.fill_bytes(&mut block);
        self.offset = 0;
        tracing::debug!(round = self.mined.len() + 1, "new block");
        self.block = Some(block.clone());
        block
    }
}

impl VariantSource for MinerWorkload {
    fn next_variant(&mut self, workers: usize, variant: usize) -> Option<Problem> {
        if self.is_done() {
            return None;
        }

        let task = MinerTask {
            difficulty: self.difficulty,
            offset: self.offset,
            window: self.window,
            block: self.current_block(),
        };
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let variants = u16::try_from(workers).unwrap_or(u16::MAX);
        let variant = u16::try_from(variant).unwrap_or(u16::MAX);
        Some(task.into_problem(id).with_variant(variants, variant))
    }

    fn round_unsolved(&mut self) {
        self.offset = self.offset.saturating_add(self.window);
        tracing::debug!(offset = self.offset, "window exhausted, moving on");
    }
}

impl Judge for MinerWorkload {
    fn judge(&mut self, answer: &Answer, problem: &Problem) -> Verdict {
        if answer.id != problem.id || answer.failed {
            return Verdict::Rejected;
        }
        let (Some(task), Some(nonce)) = (MinerTask::decode(&problem.payload), answer_nonce(answer))
        else {
            return Verdict::Rejected;
        };
        if !verify(&task.block, nonce, task.difficulty) {
            tracing::warn!(id = answer.id, nonce, "nonce does not meet difficulty");
            return Verdict::Rejected;
        }

        self.mined.push(MinedBlock {
            block: task.block,
            nonce,
        });
        self.block = None;
        Verdict::Accepted
    }
}
