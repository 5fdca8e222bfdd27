//! Rendering of diff coverage results.
//!
//! Every backend implements [`Reporter`]. The set of backends is closed:
//! [`ReporterKind`] names them, and [`build_reporters`] maps requested names
//! to instances.

pub mod annotations;
pub mod cli_table;
pub mod github_comment;
pub mod json;
pub mod markdown_table;

use clap::ValueEnum;
use serde::Serialize;

use crate::config::Settings;
use crate::error::CovdiffError;
use crate::model::CoverageResult;

/// A rendering backend for diff coverage results.
pub trait Reporter {
    /// The registry name of this reporter.
    fn name(&self) -> &'static str;

    /// Render `result`. Reporters never modify the result.
    fn report(&self, result: &CoverageResult) -> anyhow::Result<()>;

    /// Surface a failure or warning that happened before or during
    /// aggregation through this reporter's channel.
    fn error(&self, message: &str, details: &[String]) {
        log::error!("{message}");
        for detail in details {
            log::error!("  {detail}");
        }
    }
}

/// Names of the available reporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReporterKind {
    CliTable,
    MarkdownTable,
    GithubPrComment,
    GithubAnnotations,
    Json,
}

impl ReporterKind {
    pub const ALL: [ReporterKind; 5] = [
        ReporterKind::CliTable,
        ReporterKind::MarkdownTable,
        ReporterKind::GithubPrComment,
        ReporterKind::GithubAnnotations,
        ReporterKind::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReporterKind::CliTable => "cli-table",
            ReporterKind::MarkdownTable => "markdown-table",
            ReporterKind::GithubPrComment => "github-pr-comment",
            ReporterKind::GithubAnnotations => "github-annotations",
            ReporterKind::Json => "json",
        }
    }

    /// Instantiate this reporter from the resolved settings.
    pub fn build(&self, settings: &Settings) -> Box<dyn Reporter> {
        match self {
            ReporterKind::CliTable => Box::new(cli_table::CliTableReporter::new(&settings.cli_table)),
            ReporterKind::MarkdownTable => Box::new(markdown_table::MarkdownTableReporter::new(
                &settings.markdown_table,
            )),
            ReporterKind::GithubPrComment => Box::new(github_comment::GithubCommentReporter::new(
                settings,
            )),
            ReporterKind::GithubAnnotations => Box::new(
                annotations::AnnotationsReporter::new(&settings.github_annotations),
            ),
            ReporterKind::Json => Box::new(json::JsonReporter::new(settings.path(&settings.json.output_path))),
        }
    }
}

impl std::str::FromStr for ReporterKind {
    type Err = CovdiffError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim();
        ReporterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| CovdiffError::UnknownReporter {
                name: name.to_string(),
                available: ReporterKind::ALL
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl std::fmt::Display for ReporterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the configured reporters, in the order they were requested.
pub fn build_reporters(settings: &Settings) -> Vec<Box<dyn Reporter>> {
    settings
        .reporters
        .iter()
        .map(|kind| kind.build(settings))
        .collect()
}

// ---------------------------------------------------------------------------
// Quality gate
// ---------------------------------------------------------------------------

/// Minimum percentage every category must reach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub threshold: f64,
}

impl QualityGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// A category without a percentage (nothing to cover) never fails the gate.
    pub fn passes_percent(&self, percent: Option<f64>) -> bool {
        percent.map_or(true, |p| p >= self.threshold)
    }

    pub fn passes(&self, result: &CoverageResult) -> bool {
        self.passes_percent(result.lines.percent)
            && self.passes_percent(result.functions.percent)
            && self.passes_percent(result.branches.percent)
    }
}

// ---------------------------------------------------------------------------
// Shared formatting
// ---------------------------------------------------------------------------

/// One row of the summary table.
pub struct SummaryRow {
    pub label: &'static str,
    pub total: u64,
    pub covered: u64,
    pub percent: Option<f64>,
}

pub fn summary_rows(result: &CoverageResult) -> [SummaryRow; 3] {
    [
        SummaryRow {
            label: "Lines",
            total: result.lines.total,
            covered: result.lines.covered,
            percent: result.lines.percent,
        },
        SummaryRow {
            label: "Functions",
            total: result.functions.total,
            covered: result.functions.covered,
            percent: result.functions.percent,
        },
        SummaryRow {
            label: "Branches",
            total: result.branches.total,
            covered: result.branches.covered,
            percent: result.branches.percent,
        },
    ]
}

/// "12.34%", or "N/A" when there was nothing to cover.
#[must_use]
pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{p:.2}%"),
        None => "N/A".to_string(),
    }
}

/// "covered/total (percent)".
#[must_use]
pub fn format_ratio(covered: u64, total: u64, percent: Option<f64>) -> String {
    format!("{covered}/{total} ({})", format_percent(percent))
}

/// Maximum number of consecutive non-instrumented lines that can be bridged
/// when coalescing missed ranges.
const MAX_BRIDGE_GAP: u32 = 2;

/// Coalesce sorted line numbers into `(start, end)` ranges, bridging gaps of
/// at most [`MAX_BRIDGE_GAP`] lines where no line in the gap is instrumented.
///
/// Both `lines` and `instrumented` must be sorted and deduplicated.
#[must_use]
pub fn coalesce_ranges(lines: &[u32], instrumented: &[u32]) -> Vec<(u32, u32)> {
    let Some((&first, rest)) = lines.split_first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let (mut start, mut end) = (first, first);

    for &line in rest {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP && (end + 1..line).all(|l| instrumented.binary_search(&l).is_err())
        {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }

    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
#[must_use]
pub fn format_line_ranges(lines: &[u32], instrumented: &[u32]) -> String {
    coalesce_ranges(lines, instrumented)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{CoverageDetail, FileCoverageResult, FunctionRecord, LineRecord};

    /// A small result shared by the reporter tests: one partially covered
    /// file and one file without coverage data.
    pub(crate) fn sample_result() -> CoverageResult {
        CoverageResult {
            head_ref: "1234567890abcdef".to_string(),
            base_ref: "fedcba0987654321".to_string(),
            lines: CoverageDetail::new(10, 4),
            functions: CoverageDetail::new(2, 1),
            branches: CoverageDetail::new(0, 0),
            files: vec![
                FileCoverageResult {
                    path: "src/a.ts".to_string(),
                    lines: CoverageDetail::with_details(
                        6,
                        4,
                        vec![
                            LineRecord { line: 10, hit: 1 },
                            LineRecord { line: 11, hit: 0 },
                            LineRecord { line: 12, hit: 0 },
                            LineRecord { line: 13, hit: 3 },
                            LineRecord { line: 14, hit: 3 },
                            LineRecord { line: 15, hit: 3 },
                        ],
                    ),
                    functions: CoverageDetail::with_details(
                        2,
                        1,
                        vec![
                            FunctionRecord { line: 10, hit: 1, name: "run".to_string() },
                            FunctionRecord { line: 13, hit: 0, name: "helper".to_string() },
                        ],
                    ),
                    branches: CoverageDetail::default(),
                },
                FileCoverageResult {
                    path: "src/b.ts".to_string(),
                    lines: CoverageDetail::new(4, 0),
                    functions: CoverageDetail::default(),
                    branches: CoverageDetail::default(),
                },
            ],
        }
    }

    #[test]
    fn test_reporter_kind_from_str() {
        assert_eq!("cli-table".parse::<ReporterKind>().unwrap(), ReporterKind::CliTable);
        assert_eq!(" json ".parse::<ReporterKind>().unwrap(), ReporterKind::Json);
        let err = "html".parse::<ReporterKind>().unwrap_err();
        assert!(err.to_string().contains("Unknown coverage reporter: 'html'"));
        assert!(err.to_string().contains("github-annotations"));
    }

    #[test]
    fn test_reporter_kind_names_round_trip() {
        for kind in ReporterKind::ALL {
            assert_eq!(kind.as_str().parse::<ReporterKind>().unwrap(), kind);
            let value = kind.to_possible_value().unwrap();
            assert_eq!(value.get_name(), kind.as_str());
        }
    }

    #[test]
    fn test_quality_gate() {
        let result = sample_result();
        // lines 40%, functions 50%, branches N/A
        assert!(QualityGate::new(40.0).passes(&result));
        assert!(!QualityGate::new(45.0).passes(&result));
        assert!(QualityGate::new(100.0).passes_percent(None));
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Some(66.666)), "66.67%");
        assert_eq!(format_percent(None), "N/A");
        assert_eq!(format_ratio(2, 3, Some(66.666)), "2/3 (66.67%)");
    }

    #[test]
    fn test_coalesce_ranges() {
        assert_eq!(coalesce_ranges(&[], &[]), Vec::<(u32, u32)>::new());
        assert_eq!(coalesce_ranges(&[5], &[5]), vec![(5, 5)]);
        assert_eq!(coalesce_ranges(&[1, 2, 3], &[1, 2, 3]), vec![(1, 3)]);
        // Lines 3,4 not instrumented: bridged.
        assert_eq!(coalesce_ranges(&[1, 2, 5, 6], &[1, 2, 5, 6]), vec![(1, 6)]);
        // Three-line gap is too wide.
        assert_eq!(coalesce_ranges(&[1, 2, 6, 7], &[1, 2, 6, 7]), vec![(1, 2), (6, 7)]);
        // Line 3 is instrumented (covered): no bridge.
        assert_eq!(
            coalesce_ranges(&[1, 2, 4, 5], &[1, 2, 3, 4, 5]),
            vec![(1, 2), (4, 5)]
        );
    }

    #[test]
    fn test_format_line_ranges() {
        assert_eq!(format_line_ranges(&[], &[]), "");
        assert_eq!(
            format_line_ranges(&[1, 3, 4, 5, 10], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
            "1, 3-5, 10"
        );
    }
}
