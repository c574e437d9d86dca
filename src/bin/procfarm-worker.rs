//! Worker process. Takes no arguments: problems arrive on stdin, answers
//! leave on stdout, and all control happens through signals.

use std::process::ExitCode;

fn main() -> ExitCode {
    // stdout carries answers, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match procfarm::worker::run_worker() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(pid = std::process::id(), "worker failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
