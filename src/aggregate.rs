//! Diff-coverage aggregation: intersect each changed file's changed lines with
//! its line/function/branch hit data and fold the per-file results into
//! run-wide totals.
//!
//! Policy per file:
//!   * no coverage entry: `lines.total = total_lines`, nothing covered, zero
//!     functions and branches;
//!   * otherwise `lines.total` is the hunk line count, `lines.covered` the
//!     number of hit line records on changed lines, and functions/branches
//!     only count records anchored on a changed line.
//!
//! Aggregate percentages are computed once from the summed totals, never by
//! averaging per-file percentages.

use std::fmt;

use crate::diff::{changed_lines, ChangedLines};
use crate::error::{CovdiffError, Result};
use crate::model::{
    ChangedFile, CoverageDetail, CoverageReport, CoverageResult, FileCoverage,
    FileCoverageResult,
};

/// A changed file left out of the result because its inputs were malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for SkippedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// The result of a run plus the files that had to be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub result: CoverageResult,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    total: u64,
    covered: u64,
}

impl Tally {
    fn add<T>(&mut self, detail: &CoverageDetail<T>) {
        self.total += detail.total;
        self.covered += detail.covered;
    }

    fn finish<T>(self) -> CoverageDetail<T> {
        CoverageDetail::new(self.total, self.covered)
    }
}

/// Compute diff coverage for every file in `files`, in order.
///
/// Files whose diff or coverage entry is malformed are skipped and reported
/// in [`Aggregation::skipped`]; they contribute nothing to the totals.
pub fn aggregate(
    files: &[ChangedFile],
    report: &CoverageReport,
    head_ref: &str,
    base_ref: &str,
) -> Aggregation {
    let mut lines = Tally::default();
    let mut functions = Tally::default();
    let mut branches = Tally::default();
    let mut results = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();

    for file in files {
        match file_diff_coverage(file, report.get(&file.path)) {
            Ok(result) => {
                log::debug!(
                    "{}: lines {}/{}, functions {}/{}, branches {}/{}",
                    result.path,
                    result.lines.covered,
                    result.lines.total,
                    result.functions.covered,
                    result.functions.total,
                    result.branches.covered,
                    result.branches.total,
                );
                lines.add(&result.lines);
                functions.add(&result.functions);
                branches.add(&result.branches);
                results.push(result);
            }
            Err(e) => {
                log::warn!("{e}");
                let reason = match e {
                    CovdiffError::Aggregation { reason, .. } => reason,
                    other => other.to_string(),
                };
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason,
                });
            }
        }
    }

    Aggregation {
        result: CoverageResult {
            head_ref: head_ref.to_string(),
            base_ref: base_ref.to_string(),
            lines: lines.finish(),
            functions: functions.finish(),
            branches: branches.finish(),
            files: results,
        },
        skipped,
    }
}

/// Diff coverage of one changed file against its coverage entry, if any.
pub fn file_diff_coverage(
    file: &ChangedFile,
    coverage: Option<&FileCoverage>,
) -> Result<FileCoverageResult> {
    let Some(coverage) = coverage else {
        return Ok(FileCoverageResult {
            path: file.path.clone(),
            lines: CoverageDetail::new(u64::from(file.total_lines), 0),
            functions: CoverageDetail::default(),
            branches: CoverageDetail::default(),
        });
    };

    validate(coverage).map_err(|reason| CovdiffError::Aggregation {
        path: file.path.clone(),
        reason,
    })?;
    let changed = changed_lines(&file.diff).map_err(|e| CovdiffError::Aggregation {
        path: file.path.clone(),
        reason: e.to_string(),
    })?;

    Ok(intersect(&file.path, &changed, coverage))
}

fn intersect(path: &str, changed: &ChangedLines, coverage: &FileCoverage) -> FileCoverageResult {
    let lines: Vec<_> = coverage
        .lines
        .details
        .iter()
        .filter(|l| changed.contains(l.line))
        .cloned()
        .collect();
    let covered_lines = lines.iter().filter(|l| l.hit > 0).count() as u64;

    let functions: Vec<_> = coverage
        .functions
        .details
        .iter()
        .filter(|f| changed.contains(f.line))
        .cloned()
        .collect();
    let covered_functions = functions.iter().filter(|f| f.hit > 0).count() as u64;

    let branches: Vec<_> = coverage
        .branches
        .details
        .iter()
        .filter(|b| changed.contains(b.line))
        .cloned()
        .collect();
    let covered_branches = branches.iter().filter(|b| b.taken > 0).count() as u64;

    FileCoverageResult {
        path: path.to_string(),
        lines: CoverageDetail::with_details(changed.count, covered_lines, lines),
        functions: CoverageDetail::with_details(
            functions.len() as u64,
            covered_functions,
            functions,
        ),
        branches: CoverageDetail::with_details(branches.len() as u64, covered_branches, branches),
    }
}

/// Line numbers are 1-based; a record on line 0 means the entry is corrupt.
/// Duplicate line records would let `covered` exceed `total`.
fn validate(coverage: &FileCoverage) -> std::result::Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for l in &coverage.lines.details {
        if l.line == 0 {
            return Err("coverage entry has a line record on line 0".to_string());
        }
        if !seen.insert(l.line) {
            return Err(format!("coverage entry lists line {} twice", l.line));
        }
    }
    if coverage.branches.details.iter().any(|b| b.line == 0) {
        return Err("coverage entry has a branch record on line 0".to_string());
    }
    Ok(())
}
