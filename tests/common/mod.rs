#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use covdiff::model::{
    ChangeKind, ChangedFile, CoverageReport, Diff, FileCoverage, FunctionRecord, Hunk, LineRecord,
};

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A modified file with the given `(new_start, new_lines)` hunks.
pub fn changed(path: &str, total_lines: u32, hunks: &[(u32, u32)]) -> ChangedFile {
    ChangedFile::new(
        path,
        total_lines,
        ChangeKind::Modified,
        Diff::new(hunks.iter().map(|&(s, n)| Hunk::new(s, n)).collect()),
    )
}

/// A coverage entry with the given `(line, hit)` line records.
pub fn coverage(path: &str, lines: &[(u32, u64)]) -> FileCoverage {
    let mut file = FileCoverage::new(path.to_string());
    file.lines.details = lines
        .iter()
        .map(|&(line, hit)| LineRecord { line, hit })
        .collect();
    file.lines.found = lines.len() as u64;
    file.lines.hit = lines.iter().filter(|(_, hit)| *hit > 0).count() as u64;
    file
}

pub fn with_function(mut file: FileCoverage, line: u32, hit: u64, name: &str) -> FileCoverage {
    file.functions.details.push(FunctionRecord {
        line,
        hit,
        name: name.to_string(),
    });
    file.functions.found += 1;
    file
}

pub fn report(files: Vec<FileCoverage>) -> CoverageReport {
    let mut report = CoverageReport::new();
    for file in files {
        report.insert(file);
    }
    report
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=covdiff",
            "-c",
            "user.email=covdiff@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn write(dir: &Path, path: &str, content: &str) {
    let path = dir.join(path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}
