//! A pull-request comment body, written to a file for a later workflow step
//! (or posted directly through the GitHub API).

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use super::markdown_table::files_table;
use super::{format_percent, summary_rows, QualityGate, Reporter};
use crate::config::{CiEnvironment, Settings};
use crate::github;
use crate::model::CoverageResult;

pub struct GithubCommentReporter {
    path: PathBuf,
    comment_name: String,
    gate: QualityGate,
    post: bool,
    ci: CiEnvironment,
}

impl GithubCommentReporter {
    pub fn new(settings: &Settings) -> Self {
        let comment = &settings.github_pr_comment;
        Self {
            path: settings.path(&comment.comment_file_path),
            comment_name: comment.comment_name.clone(),
            gate: QualityGate::new(comment.quality_gate),
            post: comment.post,
            ci: settings.ci.clone(),
        }
    }

    #[must_use]
    pub fn render(&self, result: &CoverageResult) -> String {
        let mut md = String::new();
        writeln!(md, "{}", github::comment_marker(&self.comment_name)).unwrap();
        writeln!(md, "## {}\n", self.comment_name).unwrap();

        md.push_str("### Coverage Summary\n\n");
        md.push_str("| Type | Total | Covered | Percent |\n");
        md.push_str("|:-----|------:|--------:|--------:|\n");
        for row in summary_rows(result) {
            writeln!(
                md,
                "| {} | {} | {} | {} {} |",
                row.label,
                row.total,
                row.covered,
                icon(row.percent),
                format_percent(row.percent)
            )
            .unwrap();
        }
        md.push('\n');

        let threshold = format_percent(Some(self.gate.threshold));
        if self.gate.passes(result) {
            md.push_str("> [!TIP]\n> ### Coverage Quality Gate Passed\n");
        } else {
            md.push_str("> [!CAUTION]\n> ### Coverage Quality Gate Failed\n");
        }
        for row in summary_rows(result) {
            writeln!(
                md,
                "> {} {}: {} (baseline: {threshold})",
                icon(row.percent),
                row.label,
                format_percent(row.percent)
            )
            .unwrap();
        }

        if !result.files.is_empty() {
            md.push_str("\n<details>\n<summary>Coverage Details</summary>\n\n");
            md.push_str(&files_table(result));
            md.push_str("\n</details>\n");
        }

        writeln!(md, "\n{}", self.footer(result)).unwrap();
        md
    }

    fn footer(&self, result: &CoverageResult) -> String {
        let mut info = format!("<sub>Report for commit {}", result.head_ref);
        if !result.base_ref.is_empty() {
            write!(info, " against base commit {}", result.base_ref).unwrap();
        }
        if let Some(run_id) = &self.ci.run_id {
            match (&self.ci.server_url, &self.ci.repository) {
                (Some(server), Some(repo)) => write!(
                    info,
                    " (triggering run: [{run_id}]({server}/{repo}/actions/runs/{run_id}))"
                )
                .unwrap(),
                _ => write!(info, " (triggering run: {run_id})").unwrap(),
            }
        }
        info.push_str("</sub>");
        info
    }

    fn publish(&self, body: &str) -> anyhow::Result<()> {
        write_file(&self.path, body)?;
        log::info!("Wrote PR comment to {}", self.path.display());
        if self.post {
            github::Context::from_env()?.upsert_comment(&self.comment_name, body)?;
        }
        Ok(())
    }
}

impl Reporter for GithubCommentReporter {
    fn name(&self) -> &'static str {
        "github-pr-comment"
    }

    fn report(&self, result: &CoverageResult) -> anyhow::Result<()> {
        if !self.ci.is_github_ci() {
            log::warn!(
                "Not running in GitHub CI environment, skipping GitHub PR comment coverage reporter"
            );
            return Ok(());
        }
        self.publish(&self.render(result))
    }

    fn error(&self, message: &str, details: &[String]) {
        log::error!("{message}");
        if !self.ci.is_github_ci() {
            return;
        }
        let mut md = String::new();
        writeln!(md, "{}", github::comment_marker(&self.comment_name)).unwrap();
        writeln!(md, "## {}\n", self.comment_name).unwrap();
        writeln!(md, "> [!WARNING]\n> {message}").unwrap();
        for detail in details {
            writeln!(md, "> - {detail}").unwrap();
        }
        if let Err(e) = self.publish(&md) {
            log::error!("Failed to write PR comment: {e:#}");
        }
    }
}

fn icon(percent: Option<f64>) -> &'static str {
    match percent {
        None => "⚪",
        Some(p) if p >= 80.0 => "🟢",
        Some(p) if p >= 50.0 => "🟠",
        Some(_) => "🔴",
    }
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, Overrides};
    use crate::reporters::tests::sample_result;

    fn reporter(root: &Path, ci: CiEnvironment) -> GithubCommentReporter {
        let settings =
            Settings::resolve(root, ConfigFile::default(), Overrides::default(), ci).unwrap();
        GithubCommentReporter::new(&settings)
    }

    fn github_ci() -> CiEnvironment {
        CiEnvironment {
            github_actions: true,
            event_name: Some("pull_request".to_string()),
            repository: Some("acme/widgets".to_string()),
            run_id: Some("42".to_string()),
            server_url: Some("https://github.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_icon() {
        assert_eq!(icon(Some(80.0)), "🟢");
        assert_eq!(icon(Some(50.0)), "🟠");
        assert_eq!(icon(Some(49.9)), "🔴");
        assert_eq!(icon(None), "⚪");
    }

    #[test]
    fn test_render() {
        let dir = tempfile::tempdir().unwrap();
        let md = reporter(dir.path(), github_ci()).render(&sample_result());
        assert!(md.starts_with("<!-- covdiff: Diff Coverage -->\n## Diff Coverage\n"));
        assert!(md.contains("| Lines | 10 | 4 | 🔴 40.00% |"));
        assert!(md.contains("| Branches | 0 | 0 | ⚪ N/A |"));
        assert!(md.contains("> [!CAUTION]"));
        assert!(md.contains("> 🟠 Functions: 50.00% (baseline: 80.00%)"));
        assert!(md.contains("<summary>Coverage Details</summary>"));
        assert!(md.contains(
            "Report for commit 1234567890abcdef against base commit fedcba0987654321 \
             (triggering run: [42](https://github.com/acme/widgets/actions/runs/42))"
        ));
    }

    #[test]
    fn test_report_writes_file_in_ci() {
        let dir = tempfile::tempdir().unwrap();
        reporter(dir.path(), github_ci())
            .report(&sample_result())
            .unwrap();
        let written =
            std::fs::read_to_string(dir.path().join("coverage/github.pr.coverage.md")).unwrap();
        assert!(written.contains("### Coverage Summary"));
    }

    #[test]
    fn test_report_skipped_outside_ci() {
        let dir = tempfile::tempdir().unwrap();
        reporter(dir.path(), CiEnvironment::default())
            .report(&sample_result())
            .unwrap();
        assert!(!dir.path().join("coverage").exists());
    }

    #[test]
    fn test_error_writes_warning_comment() {
        let dir = tempfile::tempdir().unwrap();
        reporter(dir.path(), github_ci()).error(
            "Could not compute diff coverage",
            &["src/a.ts: invalid hunk".to_string()],
        );
        let written =
            std::fs::read_to_string(dir.path().join("coverage/github.pr.coverage.md")).unwrap();
        assert!(written.contains("> [!WARNING]\n> Could not compute diff coverage\n"));
        assert!(written.contains("> - src/a.ts: invalid hunk"));
    }
}
