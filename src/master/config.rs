//! Configuration for a worker pool.

use std::env;
use std::path::PathBuf;

use crate::protocol::DEFAULT_MAX_FRAME_BYTES;

/// File name of the worker binary.
pub const WORKER_PROGRAM: &str = "procfarm-worker";

/// Configuration for a farm run.
#[derive(Debug, Clone)]
pub struct FarmConfig {
    /// Number of worker processes to spawn.
    pub workers: usize,
    /// Program executed for each worker, with no arguments.
    pub worker_program: PathBuf,
    /// Largest frame accepted from a worker.
    pub max_frame_bytes: usize,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            worker_program: default_worker_program(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl FarmConfig {
    /// Create a new config with the specified number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the number of workers from an Option.
    pub fn with_workers_option(self, workers: Option<usize>) -> Self {
        match workers {
            Some(workers) => self.with_workers(workers),
            None => self,
        }
    }

    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = program.into();
        self
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }
}

/// The worker binary installed next to the running executable, falling back
/// to a `$PATH` lookup.
pub fn default_worker_program() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_PROGRAM)))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(WORKER_PROGRAM))
}
