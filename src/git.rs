//! Change detection: which files differ between two revisions, and which of
//! their lines changed.
//!
//! A [`ChangeSource`] abstracts over where the changed-file list comes from
//! (a `git` two-revision diff, or an explicit override list).
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::diff;
use crate::error::{CovdiffError, Result};
use crate::model::{ChangeKind, ChangedFile, Diff};

/// A source of changed files with their head-revision hunks.
pub trait ChangeSource {
    /// The fully materialized list of changed files, in a stable order.
    fn changed_files(&self) -> Result<Vec<ChangedFile>>;
}

/// Whether `root` is the top of a git working tree.
pub fn is_repository(root: &Path) -> bool {
    root.join(".git").exists()
}

/// Resolve a branch, tag or revision expression to a commit SHA.
pub fn resolve_ref(root: &Path, reference: &str) -> Result<String> {
    let spec = format!("{reference}^{{commit}}");
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", &spec])
        .current_dir(root)
        .output()
        .map_err(|e| CovdiffError::Git(format!("failed to run git rev-parse: {e}")))?;

    if !output.status.success() {
        return Err(CovdiffError::RefResolution {
            reference: reference.to_string(),
            message: "no such commit".to_string(),
        });
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        return Err(CovdiffError::RefResolution {
            reference: reference.to_string(),
            message: "git rev-parse returned nothing".to_string(),
        });
    }
    Ok(sha)
}

fn run_git(root: &Path, args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .map_err(|e| CovdiffError::Git(format!("failed to run git {}: {e}", args.join(" "))))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CovdiffError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(output.stdout)
}

/// Number of lines in a file's content. Every `\n` starts a new line, so a
/// trailing newline counts as one more (empty) line.
pub fn count_lines(content: &str) -> u32 {
    u32::try_from(content.split('\n').count()).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Two-revision diff
// ---------------------------------------------------------------------------

/// Files changed between two commits of a git repository.
pub struct GitChanges {
    pub root: PathBuf,
    /// Resolved head commit.
    pub head: String,
    /// Resolved base commit.
    pub base: String,
}

impl GitChanges {
    fn head_content(&self, path: &str) -> Result<String> {
        let spec = format!("{}:{}", self.head, path);
        let bytes = run_git(&self.root, &["show", &spec])?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn raw_changes(&self) -> Result<Vec<(ChangeKind, String)>> {
        let out = run_git(
            &self.root,
            &["diff", "--raw", "--no-renames", "-z", &self.base, &self.head],
        )?;
        Ok(parse_raw(&String::from_utf8_lossy(&out)))
    }
}

impl ChangeSource for GitChanges {
    fn changed_files(&self) -> Result<Vec<ChangedFile>> {
        let statuses = self.raw_changes()?;
        let patch = run_git(
            &self.root,
            &[
                "-c",
                "core.quotePath=false",
                "diff",
                "-U0",
                "--no-color",
                "--no-renames",
                "--no-ext-diff",
                &self.base,
                &self.head,
            ],
        )?;
        let mut hunks = diff::parse_hunks(&String::from_utf8_lossy(&patch));

        let mut files = Vec::with_capacity(statuses.len());
        for (kind, path) in statuses {
            match kind {
                ChangeKind::Added => {
                    let total = count_lines(&self.head_content(&path)?);
                    files.push(ChangedFile::added(&path, total));
                }
                ChangeKind::Modified => {
                    let total = count_lines(&self.head_content(&path)?);
                    let file_hunks = hunks.remove(&path).unwrap_or_default();
                    files.push(ChangedFile::new(
                        &path,
                        total,
                        ChangeKind::Modified,
                        Diff::new(file_hunks),
                    ));
                }
                ChangeKind::Removed | ChangeKind::Unchanged => {
                    log::debug!("Ignoring {path} ({kind:?})");
                }
            }
        }
        Ok(files)
    }
}

/// Mode of a gitlink (submodule commit) entry.
const GITLINK_MODE: &str = "160000";

/// Parse `git diff --raw -z` output
/// (`:<old mode> <new mode> <old sha> <new sha> <status>\0<path>\0...`).
/// Gitlinks have no blob content in the head tree and are dropped.
fn parse_raw(out: &str) -> Vec<(ChangeKind, String)> {
    let mut result = Vec::new();
    let mut parts = out.split('\0').filter(|p| !p.is_empty());
    while let (Some(meta), Some(path)) = (parts.next(), parts.next()) {
        let fields: Vec<&str> = meta.trim_start_matches(':').split(' ').collect();
        let [old_mode, new_mode, _, _, status] = fields[..] else {
            log::debug!("Ignoring unrecognized diff entry {meta:?} for {path}");
            continue;
        };
        if old_mode == GITLINK_MODE || new_mode == GITLINK_MODE {
            log::debug!("Ignoring submodule {path}");
            continue;
        }
        let kind = match status.chars().next() {
            Some('A') => ChangeKind::Added,
            Some('D') => ChangeKind::Removed,
            Some('M') | Some('T') => ChangeKind::Modified,
            _ => ChangeKind::Unchanged,
        };
        result.push((kind, path.to_string()));
    }
    result
}

// ---------------------------------------------------------------------------
// Explicit list
// ---------------------------------------------------------------------------

/// A changed-files override: every listed file counts as changed in full.
pub struct ExplicitChanges {
    pub root: PathBuf,
    pub paths: Vec<String>,
}

impl ExplicitChanges {
    /// Build from a comma-separated list; blank entries are dropped.
    pub fn from_list(root: &Path, list: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            paths: list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

impl ChangeSource for ExplicitChanges {
    fn changed_files(&self) -> Result<Vec<ChangedFile>> {
        Ok(self
            .paths
            .iter()
            .map(|path| {
                let on_disk = self.root.join(path.trim_start_matches('/'));
                let total = match std::fs::read(&on_disk) {
                    Ok(bytes) => count_lines(&String::from_utf8_lossy(&bytes)),
                    Err(_) => 0,
                };
                ChangedFile::new(path, total, ChangeKind::Modified, Diff::whole_file(total))
            })
            .collect())
    }
}
