//! Configuration: an optional YAML file, CLI overrides and CI environment
//! defaults, resolved once into an explicit [`Settings`] value.
//!
//! Precedence, highest first: CLI flag, YAML file, CI environment, built-in
//! default. Reporter-specific keys win over the general `reporter.coverage`
//! keys.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect;
use crate::error::{CovdiffError, Result};
use crate::filter::DEFAULT_INCLUDES;
use crate::reporters::ReporterKind;

pub const DEFAULT_CONFIG_FILE: &str = ".covdiff.yml";
pub const DEFAULT_COVERAGE_FILE: &str = "coverage/lcov.info";
pub const DEFAULT_BASE: &str = "origin/main";
pub const DEFAULT_HEAD: &str = "HEAD";
pub const DEFAULT_QUALITY_GATE: f64 = 80.0;
pub const DEFAULT_COMMENT_FILE: &str = "coverage/github.pr.coverage.md";
pub const DEFAULT_COMMENT_NAME: &str = "Diff Coverage";
pub const DEFAULT_JSON_FILE: &str = "coverage/diff-coverage.json";

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

/// The YAML config file, as written by the user. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ConfigFile {
    pub diff_coverage: DiffCoverageSection,
    pub reporter: ReporterSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DiffCoverageSection {
    pub base: Option<String>,
    pub head: Option<String>,
    pub changed_files: Option<String>,
    pub coverage_file: Option<PathBuf>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ReporterSection {
    pub coverage: CoverageReporterSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CoverageReporterSection {
    pub reporters: Option<Vec<String>>,
    pub quality_gate: Option<f64>,
    pub colors: Option<bool>,
    pub details: Option<bool>,
    pub cli_table: CliTableSection,
    pub markdown_table: MarkdownTableSection,
    pub github_pr_comment: GithubCommentSection,
    pub github_annotations: GithubAnnotationsSection,
    pub json: JsonSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CliTableSection {
    pub colors: Option<bool>,
    pub details: Option<bool>,
    pub quality_gate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct MarkdownTableSection {
    pub details: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GithubCommentSection {
    pub comment_file_path: Option<PathBuf>,
    pub comment_name: Option<String>,
    pub quality_gate: Option<f64>,
    pub post: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GithubAnnotationsSection {
    pub quality_gate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct JsonSection {
    pub output_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Load the config file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::parse(&content)?;
                log::debug!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(CovdiffError::Io(e)),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

// ---------------------------------------------------------------------------
// Environment and overrides
// ---------------------------------------------------------------------------

/// CI variables read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CiEnvironment {
    pub github_actions: bool,
    pub event_name: Option<String>,
    pub base_ref: Option<String>,
    pub sha: Option<String>,
    pub repository: Option<String>,
    pub run_id: Option<String>,
    pub server_url: Option<String>,
}

impl CiEnvironment {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            github_actions: var("GITHUB_ACTIONS").is_some(),
            event_name: var("GITHUB_EVENT_NAME"),
            base_ref: var("GITHUB_BASE_REF"),
            sha: var("GITHUB_SHA"),
            repository: var("GITHUB_REPOSITORY"),
            run_id: var("GITHUB_RUN_ID"),
            server_url: var("GITHUB_SERVER_URL"),
        }
    }

    /// Whether this looks like a GitHub Actions run triggered by an event.
    pub fn is_github_ci(&self) -> bool {
        self.github_actions && self.event_name.is_some()
    }
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub base: Option<String>,
    pub head: Option<String>,
    pub changed_files: Option<String>,
    pub coverage_file: Option<PathBuf>,
    pub reporters: Option<Vec<ReporterKind>>,
    pub quality_gate: Option<f64>,
    pub colors: Option<bool>,
    pub details: Option<bool>,
    pub fail_on_gate: bool,
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliTableSettings {
    pub colors: bool,
    pub details: bool,
    pub quality_gate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarkdownTableSettings {
    pub details: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GithubCommentSettings {
    pub comment_file_path: PathBuf,
    pub comment_name: String,
    pub quality_gate: f64,
    pub post: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GithubAnnotationsSettings {
    pub quality_gate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct JsonSettings {
    pub output_path: PathBuf,
}

/// Everything a run needs, resolved once and passed by reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    pub root: PathBuf,
    pub base: String,
    pub head: String,
    pub changed_files: Option<String>,
    pub coverage_file: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub reporters: Vec<ReporterKind>,
    pub quality_gate: f64,
    pub fail_on_gate: bool,
    pub cli_table: CliTableSettings,
    pub markdown_table: MarkdownTableSettings,
    pub github_pr_comment: GithubCommentSettings,
    pub github_annotations: GithubAnnotationsSettings,
    pub json: JsonSettings,
    #[serde(skip)]
    pub ci: CiEnvironment,
}

impl Settings {
    /// Merge the config file, CLI overrides and CI environment. Test-runner
    /// excludes are detected under `root` unless the file sets `exclude`.
    pub fn resolve(
        root: &Path,
        file: ConfigFile,
        overrides: Overrides,
        ci: CiEnvironment,
    ) -> Result<Self> {
        let diff = file.diff_coverage;
        let rep = file.reporter.coverage;

        let base = overrides
            .base
            .or(diff.base)
            .or_else(|| ci.base_ref.clone())
            .unwrap_or_else(|| DEFAULT_BASE.to_string());
        let head = overrides
            .head
            .or(diff.head)
            .or_else(|| ci.sha.clone())
            .unwrap_or_else(|| DEFAULT_HEAD.to_string());
        let changed_files = overrides
            .changed_files
            .or(diff.changed_files)
            .filter(|list| !list.trim().is_empty());

        let include = diff
            .include
            .unwrap_or_else(|| DEFAULT_INCLUDES.iter().map(|s| s.to_string()).collect());
        let exclude = match diff.exclude {
            Some(exclude) => exclude,
            None => detect::detect_runner_coverage(root)
                .map(|found| found.exclude)
                .unwrap_or_default(),
        };

        let reporters = match (overrides.reporters, rep.reporters) {
            (Some(kinds), _) => kinds,
            (None, Some(names)) => names
                .iter()
                .map(|name| name.parse::<ReporterKind>())
                .collect::<Result<Vec<_>>>()?,
            (None, None) => vec![ReporterKind::CliTable],
        };

        let gate = |specific: Option<f64>| -> Result<f64> {
            let value = overrides
                .quality_gate
                .or(specific)
                .or(rep.quality_gate)
                .unwrap_or(DEFAULT_QUALITY_GATE);
            validate_gate(value)?;
            Ok(value)
        };

        Ok(Self {
            root: root.to_path_buf(),
            base,
            head,
            changed_files,
            coverage_file: overrides
                .coverage_file
                .or(diff.coverage_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_COVERAGE_FILE)),
            include,
            exclude,
            reporters,
            quality_gate: gate(None)?,
            fail_on_gate: overrides.fail_on_gate,
            cli_table: CliTableSettings {
                colors: overrides
                    .colors
                    .or(rep.cli_table.colors)
                    .or(rep.colors)
                    .unwrap_or(false),
                details: overrides
                    .details
                    .or(rep.cli_table.details)
                    .or(rep.details)
                    .unwrap_or(false),
                quality_gate: gate(rep.cli_table.quality_gate)?,
            },
            markdown_table: MarkdownTableSettings {
                details: overrides
                    .details
                    .or(rep.markdown_table.details)
                    .or(rep.details)
                    .unwrap_or(false),
            },
            github_pr_comment: GithubCommentSettings {
                comment_file_path: rep
                    .github_pr_comment
                    .comment_file_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_COMMENT_FILE)),
                comment_name: rep
                    .github_pr_comment
                    .comment_name
                    .unwrap_or_else(|| DEFAULT_COMMENT_NAME.to_string()),
                quality_gate: gate(rep.github_pr_comment.quality_gate)?,
                post: rep.github_pr_comment.post.unwrap_or(false),
            },
            github_annotations: GithubAnnotationsSettings {
                quality_gate: gate(rep.github_annotations.quality_gate)?,
            },
            json: JsonSettings {
                output_path: rep
                    .json
                    .output_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_JSON_FILE)),
            },
            ci,
        })
    }

    /// Resolve a configured path against the project root.
    pub fn path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn validate_gate(value: f64) -> Result<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(CovdiffError::Config(format!(
            "quality gate must be between 0 and 100, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(file: ConfigFile, overrides: Overrides, ci: CiEnvironment) -> Settings {
        let dir = tempfile::tempdir().unwrap();
        Settings::resolve(dir.path(), file, overrides, ci).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = resolve(ConfigFile::default(), Overrides::default(), CiEnvironment::default());
        assert_eq!(settings.base, "origin/main");
        assert_eq!(settings.head, "HEAD");
        assert_eq!(settings.coverage_file, PathBuf::from("coverage/lcov.info"));
        assert_eq!(settings.reporters, vec![ReporterKind::CliTable]);
        assert_eq!(settings.include.len(), 6);
        assert!(settings.exclude.is_empty());
        assert_eq!(settings.quality_gate, 80.0);
        assert!(!settings.cli_table.colors);
        assert!(settings.changed_files.is_none());
    }

    #[test]
    fn test_env_defaults_refs() {
        let ci = CiEnvironment {
            base_ref: Some("main".to_string()),
            sha: Some("abc123".to_string()),
            ..Default::default()
        };
        let settings = resolve(ConfigFile::default(), Overrides::default(), ci);
        assert_eq!(settings.base, "main");
        assert_eq!(settings.head, "abc123");
    }

    #[test]
    fn test_precedence() {
        let file = ConfigFile::parse(
            "diff-coverage:\n  base: develop\n  head: feature\nreporter:\n  coverage:\n    quality-gate: 70\n    github-pr-comment:\n      quality-gate: 90\n",
        )
        .unwrap();
        let ci = CiEnvironment {
            base_ref: Some("main".to_string()),
            ..Default::default()
        };
        let overrides = Overrides {
            head: Some("HEAD~1".to_string()),
            ..Default::default()
        };
        let settings = resolve(file, overrides, ci);
        assert_eq!(settings.base, "develop");
        assert_eq!(settings.head, "HEAD~1");
        assert_eq!(settings.quality_gate, 70.0);
        assert_eq!(settings.cli_table.quality_gate, 70.0);
        assert_eq!(settings.github_pr_comment.quality_gate, 90.0);
    }

    #[test]
    fn test_reporter_specific_keys_win() {
        let file = ConfigFile::parse(
            "reporter:\n  coverage:\n    colors: false\n    details: true\n    cli-table:\n      colors: true\n    markdown-table:\n      details: false\n",
        )
        .unwrap();
        let settings = resolve(file, Overrides::default(), CiEnvironment::default());
        assert!(settings.cli_table.colors);
        assert!(settings.cli_table.details);
        assert!(!settings.markdown_table.details);
    }

    #[test]
    fn test_command_line_turns_flags_off() {
        let file = ConfigFile::parse(
            "reporter:\n  coverage:\n    details: true\n    cli-table:\n      colors: true\n",
        )
        .unwrap();
        let overrides = Overrides {
            colors: Some(false),
            details: Some(false),
            ..Default::default()
        };
        let settings = resolve(file, overrides, CiEnvironment::default());
        assert!(!settings.cli_table.colors);
        assert!(!settings.cli_table.details);
        assert!(!settings.markdown_table.details);
    }

    #[test]
    fn test_reporters_from_file() {
        let file = ConfigFile::parse(
            "reporter:\n  coverage:\n    reporters: [markdown-table, json]\n",
        )
        .unwrap();
        let settings = resolve(file, Overrides::default(), CiEnvironment::default());
        assert_eq!(
            settings.reporters,
            vec![ReporterKind::MarkdownTable, ReporterKind::Json]
        );
    }

    #[test]
    fn test_unknown_reporter_in_file() {
        let file = ConfigFile::parse("reporter:\n  coverage:\n    reporters: [html]\n").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::resolve(dir.path(), file, Overrides::default(), CiEnvironment::default())
            .unwrap_err();
        assert!(matches!(err, CovdiffError::UnknownReporter { .. }));
    }

    #[test]
    fn test_invalid_quality_gate() {
        let overrides = Overrides {
            quality_gate: Some(120.0),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::resolve(dir.path(), ConfigFile::default(), overrides, CiEnvironment::default())
            .unwrap_err();
        assert!(matches!(err, CovdiffError::Config(_)));
    }

    #[test]
    fn test_blank_changed_files_is_none() {
        let overrides = Overrides {
            changed_files: Some("  ".to_string()),
            ..Default::default()
        };
        let settings = resolve(ConfigFile::default(), overrides, CiEnvironment::default());
        assert!(settings.changed_files.is_none());
    }

    #[test]
    fn test_detected_excludes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vitest.config.js"),
            "export default { test: { coverage: { exclude: ['**/*.spec.ts'] } } };",
        )
        .unwrap();
        let settings = Settings::resolve(
            dir.path(),
            ConfigFile::default(),
            Overrides::default(),
            CiEnvironment::default(),
        )
        .unwrap();
        assert_eq!(settings.exclude, vec!["**/*.spec.ts".to_string()]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(ConfigFile::parse("diff-coverage:\n  bse: main\n").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load(&dir.path().join(".covdiff.yml")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_to_yaml() {
        let settings = resolve(ConfigFile::default(), Overrides::default(), CiEnvironment::default());
        let yaml = settings.to_yaml().unwrap();
        assert!(yaml.contains("base: origin/main"));
        assert!(yaml.contains("- cli-table"));
    }
}
