//! procfarm: a master process drives a fixed pool of worker processes over
//! pipes, using job-control signals to hand out problems, cancel attempts and
//! shut workers down.
//!
//! - [`protocol`]: problem/answer messages and their framing
//! - [`worker`]: the signal-driven worker runtime
//! - [`solver`]: what a worker can solve
//! - [`master`]: the pool, its state machine and the round loop
//! - [`workload`]: where variants come from and how answers are judged

pub mod error;
pub mod master;
pub mod protocol;
pub mod solver;
pub mod worker;
pub mod workload;

pub use error::{FarmError, FrameError, WorkerError};
pub use master::{FarmConfig, FarmOutcome, Master, RunSummary, ShutdownReport, run_farm};
pub use protocol::{Answer, Problem, ProblemKind};
pub use workload::{Judge, VariantSource, Verdict};
