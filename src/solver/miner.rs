//! Proof-of-work nonce search.
//!
//! A nonce solves a block when SHA-256(block || nonce as u64 LE) starts with
//! at least `difficulty` zero bits. Variants of the same task interleave the
//! nonce space: variant `v` of `n` tries `offset + v`, `offset + v + n`, ...

use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};

use crate::protocol::{Answer, Problem, ProblemKind};
use crate::solver::Solver;

/// Nonces tried between two polls of the cancel flag.
const CANCEL_POLL_STRIDE: u64 = 1024;

const TASK_HEADER_LEN: usize = 17;

/// Payload of a miner problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerTask {
    pub difficulty: u8,
    /// First nonce of the search window.
    pub offset: u64,
    /// Number of nonces in the window, shared by all variants.
    pub window: u64,
    pub block: Vec<u8>,
}

impl MinerTask {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TASK_HEADER_LEN + self.block.len());
        out.push(self.difficulty);
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.window.to_le_bytes());
        out.extend_from_slice(&self.block);
        out
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < TASK_HEADER_LEN {
            return None;
        }
        let mut offset = [0; 8];
        offset.copy_from_slice(&payload[1..9]);
        let mut window = [0; 8];
        window.copy_from_slice(&payload[9..17]);
        Some(Self {
            difficulty: payload[0],
            offset: u64::from_le_bytes(offset),
            window: u64::from_le_bytes(window),
            block: payload[TASK_HEADER_LEN..].to_vec(),
        })
    }

    pub fn into_problem(self, id: u32) -> Problem {
        Problem::new(id, ProblemKind::Miner, self.encode())
    }
}

/// Number of leading zero bits in `bytes`.
pub fn leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut bits = 0;
    for &byte in bytes {
        if byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

pub fn digest(block: &[u8], nonce: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(block);
    hasher.update(nonce.to_le_bytes());
    hasher.finalize().into()
}

/// Check that `nonce` meets `difficulty` for `block`.
pub fn verify(block: &[u8], nonce: u64, difficulty: u8) -> bool {
    leading_zero_bits(&digest(block, nonce)) >= u32::from(difficulty)
}

/// Decode the nonce carried by a solved miner answer.
pub fn answer_nonce(answer: &Answer) -> Option<u64> {
    let raw: [u8; 8] = answer.payload.as_slice().try_into().ok()?;
    Some(u64::from_le_bytes(raw))
}

pub struct MinerSolver;

impl Solver for MinerSolver {
    fn name(&self) -> &str {
        "miner"
    }

    fn solve(&self, problem: &Problem, cancel: &AtomicBool) -> Option<Answer> {
        let Some(task) = MinerTask::decode(&problem.payload) else {
            tracing::warn!(id = problem.id, "malformed miner payload");
            return Some(Answer::failed(problem.id));
        };

        let stride = u64::from(problem.variants.max(1));
        let end = task.offset.saturating_add(task.window);
        let mut nonce = task.offset.saturating_add(u64::from(problem.variant));
        let mut tried = 0u64;

        while nonce < end {
            if tried % CANCEL_POLL_STRIDE == 0 && cancel.load(Ordering::SeqCst) {
                return None;
            }
            if verify(&task.block, nonce, task.difficulty) {
                tracing::debug!(id = problem.id, nonce, tried, "nonce found");
                return Some(Answer::solved(problem.id, nonce.to_le_bytes().to_vec()));
            }
            tried += 1;
            nonce = match nonce.checked_add(stride) {
                Some(next) => next,
                None => break,
            };
        }

        tracing::debug!(id = problem.id, tried, "window exhausted");
        Some(Answer::failed(problem.id))
    }
}
