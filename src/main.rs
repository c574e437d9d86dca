use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use procfarm::master::{FarmConfig, LogTracer, run_farm};
use procfarm::workload::MinerWorkload;

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "procfarm")]
#[command(about = "procfarm - drive a pool of worker processes with job-control signals")]
#[command(version)]
#[command(subcommand_required = true)]
#[command(arg_required_else_help = true)]
struct Args {
    /// Number of worker processes (defaults to the number of CPUs)
    #[arg(long, short = 'j', global = true)]
    workers: Option<usize>,
    /// Worker executable (defaults to procfarm-worker next to this binary)
    #[arg(long, env = "PROCFARM_WORKER", global = true)]
    worker_bin: Option<PathBuf>,
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine proof-of-work nonces for random blocks
    Mine {
        /// Number of blocks to mine
        #[arg(long, default_value = "4")]
        rounds: u64,
        /// Required leading zero bits of the block digest
        #[arg(long, default_value = "16")]
        difficulty: u8,
        /// Nonces searched per round, split between the workers
        #[arg(long, default_value = "16777216")]
        window: u64,
        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = FarmConfig::default().with_workers_option(args.workers);
    if let Some(program) = args.worker_bin {
        config = config.with_worker_program(program);
    }

    match args.command {
        Commands::Mine {
            rounds,
            difficulty,
            window,
            seed,
        } => {
            println!(
                "Mining {} block(s) at difficulty {} with {} worker(s)",
                rounds, difficulty, config.workers
            );
            let mut workload = MinerWorkload::new(rounds, difficulty, window, seed);

            let outcome = match run_farm(&config, &mut workload, LogTracer) {
                Ok(outcome) => outcome,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            println!("\n{}", outcome.summary.format_summary());
            if !workload.mined().is_empty() {
                println!("\nMined blocks:");
                for (i, mined) in workload.mined().iter().enumerate() {
                    println!("  {}: nonce {}", i + 1, mined.nonce);
                }
            }

            if outcome.success() {
                println!("\nAll {} worker(s) exited cleanly", outcome.shutdown.exited.len());
                ExitCode::SUCCESS
            } else {
                eprintln!("\nSome workers ended abnormally:");
                for (worker, how) in &outcome.shutdown.aborted {
                    eprintln!("  worker {}: {}", worker, how);
                }
                ExitCode::FAILURE
            }
        }
    }
}
