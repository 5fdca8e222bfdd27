use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use covdiff::cli::{cmd_diff_coverage, cmd_print_config, load_settings, DiffCoverageArgs, RunStatus};
use covdiff::config::{CiEnvironment, DEFAULT_CONFIG_FILE};

/// covdiff: code coverage restricted to the lines a change touches.
#[derive(Parser)]
#[command(name = "covdiff", version, about)]
struct Cli {
    /// Path to the YAML config file, relative to the project root.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Project root (must contain `.git` for diff coverage).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute coverage for the lines changed between two revisions.
    DiffCoverage {
        #[command(flatten)]
        args: DiffCoverageArgs,
    },

    /// Print the fully resolved configuration as YAML.
    PrintConfig {
        #[command(flatten)]
        args: DiffCoverageArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(RunStatus::Skipped | RunStatus::Passed) => ExitCode::SUCCESS,
        Ok(RunStatus::GateFailed) => ExitCode::from(2),
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<RunStatus> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let ci = CiEnvironment::from_env();

    match cli.command {
        Commands::DiffCoverage { args } => {
            let settings = load_settings(&root, &cli.config, &args, ci)?;
            cmd_diff_coverage(&settings)
        }
        Commands::PrintConfig { args } => {
            let settings = load_settings(&root, &cli.config, &args, ci)?;
            print!("{}", cmd_print_config(&settings)?);
            Ok(RunStatus::Passed)
        }
    }
}
