//! ries - research-evaluation benchmarks and RCI classes from paper tables
//!
//! Reads paper, HEP and field-name tables, runs the benchmark/RCI pipeline
//! and stores every output table as Parquet under a versioned run directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "ries")]
#[command(about = "Research-evaluation benchmark and RCI classification engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./ries.toml or ~/.config/ries/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline from run.toml (skipped when the stored run is current)
    Run(cmd::run::RunArgs),
    /// List stored runs
    Runs(cmd::store::RunsArgs),
    /// Verify a stored run's files against its manifest
    Verify(cmd::store::VerifyArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = ries_core::ProgressContext::new();

    // Logging:
    //   TTY:     quiet (warn) unless --debug; stage spinners show activity
    //   non-TTY: info unless --debug; logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    ries_core::init_logging(quiet, cli.debug, multi).context("failed to install logger")?;

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, &progress),
        Command::Runs(args) => cmd::store::runs(args, &config),
        Command::Verify(args) => cmd::store::verify(args, &config),
        Command::Config => {
            eprintln!("\n{}", cmd::config::show(&config));
            Ok(())
        }
    }
}
