//! Plain-text tables on stdout.

use std::fmt::Write;

use console::Style;

use super::{format_line_ranges, format_percent, format_ratio, summary_rows, QualityGate, Reporter};
use crate::config::CliTableSettings;
use crate::model::CoverageResult;

pub struct CliTableReporter {
    colors: bool,
    details: bool,
    gate: QualityGate,
}

impl CliTableReporter {
    pub fn new(settings: &CliTableSettings) -> Self {
        Self {
            colors: settings.colors,
            details: settings.details,
            gate: QualityGate::new(settings.quality_gate),
        }
    }

    fn paint(&self, text: String, percent: Option<f64>) -> String {
        if !self.colors {
            return text;
        }
        let style = match percent {
            None => Style::new().dim(),
            Some(p) if p >= 80.0 => Style::new().green(),
            Some(p) if p >= 50.0 => Style::new().yellow(),
            Some(_) => Style::new().red(),
        };
        style.force_styling(true).apply_to(text).to_string()
    }

    #[must_use]
    pub fn render(&self, result: &CoverageResult) -> String {
        let mut out = String::new();

        writeln!(
            out,
            "Diff coverage for {} against {}\n",
            short_sha(&result.head_ref),
            short_sha(&result.base_ref)
        )
        .unwrap();

        writeln!(
            out,
            "{:<12} {:>8} {:>8} {:>9}",
            "Category", "Covered", "Total", "Percent"
        )
        .unwrap();
        for row in summary_rows(result) {
            let pct = self.paint(format!("{:>9}", format_percent(row.percent)), row.percent);
            writeln!(
                out,
                "{:<12} {:>8} {:>8} {pct}",
                row.label, row.covered, row.total
            )
            .unwrap();
        }

        let passed = self.gate.passes(result);
        let verdict = if passed { "passed" } else { "FAILED" };
        let verdict = self.paint(verdict.to_string(), Some(if passed { 100.0 } else { 0.0 }));
        writeln!(
            out,
            "\nQuality gate ({}): {verdict}",
            format_percent(Some(self.gate.threshold))
        )
        .unwrap();

        if self.details && !result.files.is_empty() {
            out.push('\n');
            writeln!(
                out,
                "{:<40} {:>20} {:>20} {:>20}  Missed lines",
                "File", "Lines", "Functions", "Branches"
            )
            .unwrap();
            for file in &result.files {
                let missed = format_line_ranges(&file.missed_lines(), &file.instrumented_lines());
                writeln!(
                    out,
                    "{:<40} {:>20} {:>20} {:>20}  {missed}",
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
                )
                .unwrap();
            }
        }

        out
    }
}

impl Reporter for CliTableReporter {
    fn name(&self) -> &'static str {
        "cli-table"
    }

    fn report(&self, result: &CoverageResult) -> anyhow::Result<()> {
        print!("{}", self.render(result));
        Ok(())
    }
}

/// First seven characters of a commit SHA.
pub(crate) fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::sample_result;

    fn reporter(colors: bool, details: bool, quality_gate: f64) -> CliTableReporter {
        CliTableReporter::new(&CliTableSettings {
            colors,
            details,
            quality_gate,
        })
    }

    #[test]
    fn test_render_summary() {
        let out = reporter(false, false, 80.0).render(&sample_result());
        assert!(out.starts_with("Diff coverage for 1234567 against fedcba0\n"));
        assert!(out.contains("Lines               4       10    40.00%"));
        assert!(out.contains("Functions           1        2    50.00%"));
        assert!(out.contains("Branches            0        0       N/A"));
        assert!(out.contains("Quality gate (80.00%): FAILED"));
        assert!(!out.contains("src/a.ts"));
    }

    #[test]
    fn test_render_details() {
        let out = reporter(false, true, 40.0).render(&sample_result());
        assert!(out.contains("Quality gate (40.00%): passed"));
        let line = out.lines().find(|l| l.starts_with("src/a.ts")).unwrap();
        assert!(line.contains("4/6 (66.67%)"));
        assert!(line.ends_with("11-12"));
        let line = out.lines().find(|l| l.starts_with("src/b.ts")).unwrap();
        assert!(line.contains("0/4 (0.00%)"));
        assert!(line.contains("0/0 (N/A)"));
    }

    #[test]
    fn test_render_colors() {
        let plain = reporter(false, false, 80.0).render(&sample_result());
        assert!(!plain.contains('\u{1b}'));
        let colored = reporter(true, false, 80.0).render(&sample_result());
        assert!(colored.contains('\u{1b}'));
    }

    #[test]
    fn test_short_sha() {
        assert_eq!(short_sha("1234567890"), "1234567");
        assert_eq!(short_sha("HEAD"), "HEAD");
    }
}
