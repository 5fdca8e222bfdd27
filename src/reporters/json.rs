//! Machine-readable JSON output.

use std::path::PathBuf;

use anyhow::Context as _;
use serde::Serialize;

use super::Reporter;
use crate::model::CoverageResult;

#[derive(Serialize)]
struct Document<'a> {
    generated_at: String,
    #[serde(flatten)]
    result: &'a CoverageResult,
}

/// Writes the result as pretty JSON to a file, or to stdout when the path
/// is `-`.
pub struct JsonReporter {
    path: PathBuf,
}

impl JsonReporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn render(&self, result: &CoverageResult) -> anyhow::Result<String> {
        let document = Document {
            generated_at: chrono::Utc::now().to_rfc3339(),
            result,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    fn is_stdout(&self) -> bool {
        self.path.file_name().is_some_and(|name| name == "-")
    }
}

impl Reporter for JsonReporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn report(&self, result: &CoverageResult) -> anyhow::Result<()> {
        let json = self.render(result)?;
        if self.is_stdout() {
            println!("{json}");
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        log::info!("Wrote JSON report to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::sample_result;

    #[test]
    fn test_report_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/diff-coverage.json");
        JsonReporter::new(path.clone())
            .report(&sample_result())
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(value["generated_at"].is_string());
        assert_eq!(value["head_ref"], "1234567890abcdef");
        assert_eq!(value["lines"]["total"], 10);
        assert_eq!(value["lines"]["covered"], 4);
        assert_eq!(value["lines"]["percent"], 40.0);
        assert!(value["branches"]["percent"].is_null());
        assert_eq!(value["files"][0]["path"], "src/a.ts");
        assert_eq!(value["files"][0]["lines"]["details"][1]["line"], 11);
        assert!(value["files"][1]["lines"].get("details").is_none());
    }

    #[test]
    fn test_stdout_path() {
        assert!(JsonReporter::new(PathBuf::from("/repo/-")).is_stdout());
        assert!(!JsonReporter::new(PathBuf::from("/repo/out.json")).is_stdout());
    }
}
