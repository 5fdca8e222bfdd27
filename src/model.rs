//! In-memory representation of the two inputs of a diff-coverage run (the
//! changed files with their hunks, and the parsed coverage report) and of the
//! result handed to reporters. Data only; the behavior lives in `diff`,
//! `aggregate` and `filter`.

use std::collections::BTreeMap;

use serde::Serialize;

/// Compute a coverage percentage, returning `None` when the total is zero.
#[must_use]
pub fn percent(covered: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(covered as f64 / total as f64 * 100.0)
    }
}

/// Normalize a repository path for comparison: forward slashes, no leading slash.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// Changes
// ---------------------------------------------------------------------------

/// How a file differs between the base and head revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    Unchanged,
}

/// A contiguous run of lines in the head revision. `new_start` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hunk {
    pub new_start: u32,
    pub new_lines: u32,
}

impl Hunk {
    pub fn new(new_start: u32, new_lines: u32) -> Self {
        Self {
            new_start,
            new_lines,
        }
    }
}

/// The hunks of one file, in diff order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub hunks: Vec<Hunk>,
}

impl Diff {
    pub fn new(hunks: Vec<Hunk>) -> Self {
        Self { hunks }
    }

    /// A single hunk spanning the whole file, used when there is no base
    /// revision to diff against.
    pub fn whole_file(total_lines: u32) -> Self {
        Self {
            hunks: vec![Hunk::new(1, total_lines)],
        }
    }
}

/// A file touched by the change under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    pub path: String,
    pub total_lines: u32,
    pub kind: ChangeKind,
    pub diff: Diff,
}

impl ChangedFile {
    /// Build a changed file, normalizing its path.
    pub fn new(path: &str, total_lines: u32, kind: ChangeKind, diff: Diff) -> Self {
        Self {
            path: normalize_path(path),
            total_lines,
            kind,
            diff,
        }
    }

    /// An added file: the whole head content is changed.
    pub fn added(path: &str, total_lines: u32) -> Self {
        Self::new(path, total_lines, ChangeKind::Added, Diff::whole_file(total_lines))
    }
}

// ---------------------------------------------------------------------------
// Coverage report
// ---------------------------------------------------------------------------

/// Execution count of one instrumented line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRecord {
    pub line: u32,
    pub hit: u64,
}

/// A function anchored at its declaration line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionRecord {
    pub line: u32,
    pub hit: u64,
    pub name: String,
}

/// One arm of a branch on a given line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRecord {
    pub line: u32,
    pub block: u32,
    pub branch: u32,
    pub taken: u64,
}

/// Instrumented items of one category for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HitSet<T> {
    /// Total instrumented items, as reported by the coverage tool.
    pub found: u64,
    /// Items executed at least once, as reported by the coverage tool.
    pub hit: u64,
    pub details: Vec<T>,
}

impl<T> Default for HitSet<T> {
    fn default() -> Self {
        Self {
            found: 0,
            hit: 0,
            details: Vec::new(),
        }
    }
}

/// Coverage data for a single source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileCoverage {
    pub path: String,
    pub lines: HitSet<LineRecord>,
    pub functions: HitSet<FunctionRecord>,
    pub branches: HitSet<BranchRecord>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }
}

/// A parsed coverage report, keyed by normalized path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    files: BTreeMap<String, FileCoverage>,
}

impl CoverageReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file entry under its normalized path. The first entry for a path
    /// wins; returns `false` when the path was already present.
    pub fn insert(&mut self, mut file: FileCoverage) -> bool {
        let key = normalize_path(&file.path);
        if self.files.contains_key(&key) {
            return false;
        }
        file.path = key.clone();
        self.files.insert(key, file);
        true
    }

    /// Look up coverage by exact normalized-path equality.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileCoverage> {
        self.files.values()
    }
}

// ---------------------------------------------------------------------------
// Diff-coverage result
// ---------------------------------------------------------------------------

/// Totals for one category (lines, functions or branches).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageDetail<T> {
    pub total: u64,
    pub covered: u64,
    /// `None` when `total` is zero; rendered as "N/A".
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<T>,
}

impl<T> CoverageDetail<T> {
    pub fn new(total: u64, covered: u64) -> Self {
        Self::with_details(total, covered, Vec::new())
    }

    pub fn with_details(total: u64, covered: u64, details: Vec<T>) -> Self {
        Self {
            total,
            covered,
            percent: percent(covered, total),
            details,
        }
    }
}

impl<T> Default for CoverageDetail<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Diff coverage of a single changed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileCoverageResult {
    pub path: String,
    /// Line records that fall on changed lines, covered or not.
    pub lines: CoverageDetail<LineRecord>,
    pub functions: CoverageDetail<FunctionRecord>,
    pub branches: CoverageDetail<BranchRecord>,
}

impl FileCoverageResult {
    /// Line numbers on changed lines that were instrumented but never hit.
    #[must_use]
    pub fn missed_lines(&self) -> Vec<u32> {
        let mut missed: Vec<u32> = self
            .lines
            .details
            .iter()
            .filter(|l| l.hit == 0)
            .map(|l| l.line)
            .collect();
        missed.sort_unstable();
        missed.dedup();
        missed
    }

    /// All instrumented line numbers on changed lines, sorted.
    #[must_use]
    pub fn instrumented_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self.lines.details.iter().map(|l| l.line).collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }
}

/// The outcome of a diff-coverage run, handed to every reporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageResult {
    pub head_ref: String,
    pub base_ref: String,
    pub lines: CoverageDetail<LineRecord>,
    pub functions: CoverageDetail<FunctionRecord>,
    pub branches: CoverageDetail<BranchRecord>,
    pub files: Vec<FileCoverageResult>,
}

impl CoverageResult {
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileCoverageResult> {
        self.files.iter().find(|f| f.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), Some(25.0));
        assert_eq!(percent(0, 0), None);
        assert_eq!(percent(0, 7), Some(0.0));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/src/a.ts"), "src/a.ts");
        assert_eq!(normalize_path("src\\lib\\b.ts"), "src/lib/b.ts");
        assert_eq!(normalize_path("src/c.ts"), "src/c.ts");
    }

    #[test]
    fn test_report_first_entry_wins() {
        let mut report = CoverageReport::new();
        let mut first = FileCoverage::new("/src/a.ts".to_string());
        first.lines.found = 1;
        assert!(report.insert(first));
        assert!(!report.insert(FileCoverage::new("src/a.ts".to_string())));

        let entry = report.get("src/a.ts").unwrap();
        assert_eq!(entry.path, "src/a.ts");
        assert_eq!(entry.lines.found, 1);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_missed_lines() {
        let file = FileCoverageResult {
            path: "src/a.ts".to_string(),
            lines: CoverageDetail::with_details(
                4,
                1,
                vec![
                    LineRecord { line: 7, hit: 0 },
                    LineRecord { line: 3, hit: 2 },
                    LineRecord { line: 5, hit: 0 },
                ],
            ),
            functions: CoverageDetail::default(),
            branches: CoverageDetail::default(),
        };
        assert_eq!(file.missed_lines(), vec![5, 7]);
        assert_eq!(file.instrumented_lines(), vec![3, 5, 7]);
    }
}
