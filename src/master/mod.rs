//! Master side of the farm.
//!
//! The master spawns a fixed pool of worker processes and steers each one
//! with job-control signals:
//! - `SIGCONT`: a problem is ready on the worker's stdin
//! - `SIGHUP`: abandon the current attempt
//! - `SIGTERM` (followed by `SIGCONT`): exit
//!
//! A worker reports progress by stopping itself, which the master observes
//! through `waitpid`. Every report is validated against the [`state`] machine.

pub mod config;
pub mod orchestrator;
pub mod pool;
pub mod state;
pub mod summary;
pub mod trace;

pub use config::FarmConfig;
pub use orchestrator::Master;
pub use pool::WorkerPool;
pub use state::WorkerState;
pub use summary::{FarmOutcome, RunSummary, ShutdownReport};
pub use trace::{LogTracer, NoopTracer, Tracer};

use crate::error::Result;
use crate::workload::{Judge, VariantSource};

/// Start a pool, run `workload` to exhaustion and shut the pool down.
///
/// If any step fails the pool is dropped, which kills and reaps every worker
/// not yet reaped.
pub fn run_farm<W, T>(config: &FarmConfig, workload: &mut W, tracer: T) -> Result<FarmOutcome>
where
    W: VariantSource + Judge,
    T: Tracer,
{
    let mut master = Master::start(config, tracer)?;
    let summary = master.run(workload)?;
    let shutdown = master.shutdown()?;

    tracing::info!(
        rounds = summary.rounds,
        accepted = summary.accepted,
        exited = shutdown.exited.len(),
        aborted = shutdown.aborted.len(),
        "farm run complete"
    );
    Ok(FarmOutcome { summary, shutdown })
}
