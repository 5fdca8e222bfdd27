//! Markdown tables on stdout, suitable for a CI job summary.

use std::fmt::Write;

use super::{format_line_ranges, format_percent, format_ratio, summary_rows, Reporter};
use crate::config::MarkdownTableSettings;
use crate::model::CoverageResult;

pub struct MarkdownTableReporter {
    details: bool,
}

impl MarkdownTableReporter {
    pub fn new(settings: &MarkdownTableSettings) -> Self {
        Self {
            details: settings.details,
        }
    }

    #[must_use]
    pub fn render(&self, result: &CoverageResult) -> String {
        let mut md = String::new();
        md.push_str("### Diff Coverage\n\n");
        md.push_str(&summary_table(result));
        if self.details && !result.files.is_empty() {
            md.push('\n');
            md.push_str(&files_table(result));
        }
        md
    }
}

impl Reporter for MarkdownTableReporter {
    fn name(&self) -> &'static str {
        "markdown-table"
    }

    fn report(&self, result: &CoverageResult) -> anyhow::Result<()> {
        print!("{}", self.render(result));
        Ok(())
    }
}

/// The three-row summary table.
pub(crate) fn summary_table(result: &CoverageResult) -> String {
    let mut md = String::new();
    md.push_str("| Category | Covered | Total | Percent |\n");
    md.push_str("|:---------|--------:|------:|--------:|\n");
    for row in summary_rows(result) {
        writeln!(
            md,
            "| {} | {} | {} | {} |",
            row.label,
            row.covered,
            row.total,
            format_percent(row.percent)
        )
        .unwrap();
    }
    md
}

/// One row per changed file, with its missed line ranges.
pub(crate) fn files_table(result: &CoverageResult) -> String {
    let mut md = String::new();
    md.push_str("| File | Lines | Functions | Branches | Missed lines |\n");
    md.push_str("|:-----|------:|----------:|---------:|:-------------|\n");
    for file in &result.files {
        let missed = format_line_ranges(&file.missed_lines(), &file.instrumented_lines());
        writeln!(
            md,
            "| `{}` | {} | {} | {} | {} |",
            file.path,
            format_ratio(file.lines.covered, file.lines.total, file.lines.percent),
            format_ratio(
                file.functions.covered,
                file.functions.total,
                file.functions.percent
            ),
            format_ratio(
                file.branches.covered,
                file.branches.total,
                file.branches.percent
            ),
            missed
        )
        .unwrap();
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::sample_result;

    #[test]
    fn test_render_summary_only() {
        let md = MarkdownTableReporter::new(&MarkdownTableSettings { details: false })
            .render(&sample_result());
        assert!(md.starts_with("### Diff Coverage\n\n| Category |"));
        assert!(md.contains("| Lines | 4 | 10 | 40.00% |"));
        assert!(md.contains("| Functions | 1 | 2 | 50.00% |"));
        assert!(md.contains("| Branches | 0 | 0 | N/A |"));
        assert!(!md.contains("| File |"));
    }

    #[test]
    fn test_render_details() {
        let md = MarkdownTableReporter::new(&MarkdownTableSettings { details: true })
            .render(&sample_result());
        assert!(md.contains(
            "| `src/a.ts` | 4/6 (66.67%) | 1/2 (50.00%) | 0/0 (N/A) | 11-12 |"
        ));
        assert!(md.contains("| `src/b.ts` | 0/4 (0.00%) | 0/0 (N/A) | 0/0 (N/A) |  |"));
    }
}
