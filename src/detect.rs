//! Detection of the project's test-runner coverage configuration.
//!
//! Strategy:
//!   1. For each known runner (vitest, jest, mocha), probe its config files
//!      in the project root
//!   2. The first file containing a `coverage: { ... }` block wins
//!   3. Its `exclude: [ ... ]` array provides the exclude globs
//!
//! The config files are JavaScript, so they are scanned textually rather than
//! evaluated.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

/// Test runners whose config files may carry coverage excludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestRunner {
    Vitest,
    Jest,
    Mocha,
}

impl TestRunner {
    pub const ALL: [TestRunner; 3] = [TestRunner::Vitest, TestRunner::Jest, TestRunner::Mocha];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestRunner::Vitest => "vitest",
            TestRunner::Jest => "jest",
            TestRunner::Mocha => "mocha",
        }
    }

    /// Config file names probed for this runner, in order.
    pub fn config_files(&self) -> [String; 4] {
        let tool = self.as_str();
        [
            "vite.config.js".to_string(),
            "vite.config.mjs".to_string(),
            format!("{tool}.config.js"),
            format!("{tool}.config.mjs"),
        ]
    }
}

impl std::fmt::Display for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coverage settings found in a test-runner config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerCoverage {
    pub runner: TestRunner,
    pub path: PathBuf,
    pub exclude: Vec<String>,
}

/// Find the first test-runner config under `root` that declares coverage
/// settings.
pub fn detect_runner_coverage(root: &Path) -> Option<RunnerCoverage> {
    for runner in TestRunner::ALL {
        for name in runner.config_files() {
            let path = root.join(&name);
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            if let Some(exclude) = parse_coverage_excludes(&content) {
                log::debug!(
                    "Using coverage excludes from {} ({runner}): {:?}",
                    path.display(),
                    exclude
                );
                return Some(RunnerCoverage {
                    runner,
                    path,
                    exclude,
                });
            }
        }
    }
    None
}

/// Extract the `exclude` globs of a `coverage: { ... }` block. Returns `None`
/// when there is no coverage block, and an empty list when the block has no
/// `exclude` array.
pub fn parse_coverage_excludes(content: &str) -> Option<Vec<String>> {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static EXCLUDE: OnceLock<Regex> = OnceLock::new();
    static STRING: OnceLock<Regex> = OnceLock::new();

    let block_re = BLOCK.get_or_init(|| {
        Regex::new(r"coverage\s*:\s*\{([^}]*)\}").expect("coverage block regex is valid")
    });
    let exclude_re = EXCLUDE.get_or_init(|| {
        Regex::new(r#"["']?exclude["']?\s*:\s*\[([^\]]*)\]"#).expect("exclude regex is valid")
    });
    let string_re = STRING.get_or_init(|| {
        Regex::new(r#""([^"]*)"|'([^']*)'|`([^`]*)`"#).expect("string literal regex is valid")
    });

    let content = content.replace("\r\n", "\n");
    let block = block_re.captures(&content)?.get(1)?.as_str().to_string();

    let Some(array) = exclude_re.captures(&block).and_then(|c| c.get(1)) else {
        return Some(Vec::new());
    };
    Some(
        string_re
            .captures_iter(array.as_str())
            .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
            .map(|m| m.as_str().to_string())
            .collect(),
    )
}
