//! Command handler functions for the covdiff CLI.
//!
//! Handlers take already-resolved inputs and return a value instead of
//! printing, so they are easy to test without capturing stdout.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{ArgAction, Args};

use crate::config::{CiEnvironment, ConfigFile, Overrides, Settings};
use crate::reporters::{build_reporters, ReporterKind};
use crate::run::{Orchestrator, Outcome};

/// Arguments of the `diff-coverage` command.
#[derive(Debug, Clone, Default, Args)]
pub struct DiffCoverageArgs {
    /// The base branch/sha to compare against [default: $GITHUB_BASE_REF or origin/main]
    #[arg(long)]
    pub base: Option<String>,

    /// The head branch/sha to compare [default: $GITHUB_SHA or HEAD]
    #[arg(long)]
    pub head: Option<String>,

    /// Comma separated list of changed files, bypassing the git diff.
    #[arg(long)]
    pub changed_files: Option<String>,

    /// Path to the LCOV tracefile [default: coverage/lcov.info]
    #[arg(long)]
    pub coverage_file: Option<PathBuf>,

    /// Comma separated list of reporters [default: cli-table]
    #[arg(long, value_enum, value_delimiter = ',')]
    pub reporters: Option<Vec<ReporterKind>>,

    /// Minimum percentage for lines, functions and branches [default: 80]
    #[arg(long)]
    pub quality_gate: Option<f64>,

    /// Colorize the console table (`--colors=false` to turn off).
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub colors: Option<bool>,

    /// Include per-file details in table reporters (`--details=false` to turn off).
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub details: Option<bool>,

    /// Exit with status 2 when the quality gate fails.
    #[arg(long)]
    pub fail_on_gate: bool,
}

impl DiffCoverageArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            base: self.base.clone(),
            head: self.head.clone(),
            changed_files: self.changed_files.clone(),
            coverage_file: self.coverage_file.clone(),
            reporters: self.reporters.clone(),
            quality_gate: self.quality_gate,
            colors: self.colors,
            details: self.details,
            fail_on_gate: self.fail_on_gate,
        }
    }
}

/// How a `diff-coverage` run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Not a git repository: nothing to do.
    Skipped,
    Passed,
    /// The quality gate failed and `--fail-on-gate` was given.
    GateFailed,
}

/// Resolve settings from the config file, CLI flags and CI environment.
pub fn load_settings(
    root: &Path,
    config: &Path,
    args: &DiffCoverageArgs,
    ci: CiEnvironment,
) -> Result<Settings> {
    let file = ConfigFile::load(&root.join(config))?;
    Ok(Settings::resolve(root, file, args.overrides(), ci)?)
}

pub fn cmd_diff_coverage(settings: &Settings) -> Result<RunStatus> {
    let reporters = build_reporters(settings);
    let outcome = Orchestrator::new(settings, &reporters).run()?;

    Ok(match outcome {
        Outcome::NotARepository => RunStatus::Skipped,
        Outcome::Reported(report) => {
            if !report.gate_passed {
                log::warn!(
                    "Diff coverage is below the quality gate of {}%",
                    settings.quality_gate
                );
            }
            if settings.fail_on_gate && !report.gate_passed {
                RunStatus::GateFailed
            } else {
                RunStatus::Passed
            }
        }
    })
}

pub fn cmd_print_config(settings: &Settings) -> Result<String> {
    Ok(settings.to_yaml()?)
}
