//! GitHub Actions workflow commands (`::warning` / `::error`) that annotate
//! uncovered changed lines in the pull-request diff view.

use super::{coalesce_ranges, format_percent, QualityGate, Reporter};
use crate::config::GithubAnnotationsSettings;
use crate::model::CoverageResult;

pub struct AnnotationsReporter {
    gate: QualityGate,
}

impl AnnotationsReporter {
    pub fn new(settings: &GithubAnnotationsSettings) -> Self {
        Self {
            gate: QualityGate::new(settings.quality_gate),
        }
    }

    /// One workflow command per line of output.
    #[must_use]
    pub fn render(&self, result: &CoverageResult) -> Vec<String> {
        let mut commands = Vec::new();

        for file in &result.files {
            let instrumented = file.instrumented_lines();
            for (start, end) in coalesce_ranges(&file.missed_lines(), &instrumented) {
                let message = if start == end {
                    format!("Line {start} is not covered by tests")
                } else {
                    format!("Lines {start}-{end} are not covered by tests")
                };
                commands.push(command(
                    "warning",
                    &file.path,
                    start,
                    end,
                    "Uncovered change",
                    &message,
                ));
            }
            for function in file.functions.details.iter().filter(|f| f.hit == 0) {
                commands.push(command(
                    "warning",
                    &file.path,
                    function.line,
                    function.line,
                    "Uncovered function",
                    &format!("Function '{}' is never called by tests", function.name),
                ));
            }
        }

        if !self.gate.passes(result) {
            commands.push(format!(
                "::error title={}::{}",
                escape_property("Coverage quality gate failed"),
                escape_data(&format!(
                    "Diff coverage is below {}: lines {}, functions {}, branches {}",
                    format_percent(Some(self.gate.threshold)),
                    format_percent(result.lines.percent),
                    format_percent(result.functions.percent),
                    format_percent(result.branches.percent),
                ))
            ));
        }

        commands
    }
}

impl Reporter for AnnotationsReporter {
    fn name(&self) -> &'static str {
        "github-annotations"
    }

    fn report(&self, result: &CoverageResult) -> anyhow::Result<()> {
        for command in self.render(result) {
            println!("{command}");
        }
        Ok(())
    }

    fn error(&self, message: &str, details: &[String]) {
        log::error!("{message}");
        let mut text = message.to_string();
        for detail in details {
            text.push('\n');
            text.push_str(detail);
        }
        println!("::error::{}", escape_data(&text));
    }
}

fn command(level: &str, path: &str, line: u32, end_line: u32, title: &str, message: &str) -> String {
    format!(
        "::{level} file={},line={line},endLine={end_line},title={}::{}",
        escape_property(path),
        escape_property(title),
        escape_data(message)
    )
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}
