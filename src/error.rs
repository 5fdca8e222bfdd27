use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovdiffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not resolve ref '{reference}': {message}")]
    RefResolution { reference: String, message: String },

    #[error("Coverage report not found: {}", .0.display())]
    CoverageReportMissing(PathBuf),

    #[error("Coverage report parse error in {} at line {line}: {message}", path.display())]
    CoverageReportParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Unknown coverage reporter: '{name}'. Available reporters: {available}")]
    UnknownReporter { name: String, available: String },

    #[error("Skipping '{path}': {reason}")]
    Aggregation { path: String, reason: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CovdiffError>;
