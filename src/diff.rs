//! Turn diff hunks into the concrete set of changed line numbers in the head
//! revision, and parse the hunk headers of a unified diff (`git diff -U0`)
//! into per-file [`Hunk`] lists.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::model::{Diff, Hunk};

/// A hunk that cannot describe a run of head-revision lines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HunkError {
    #[error("hunk +{new_start},{new_lines} starts at line 0")]
    ZeroStart { new_start: u32, new_lines: u32 },

    #[error("hunk +{new_start},{new_lines} runs past the last representable line")]
    Overflow { new_start: u32, new_lines: u32 },
}

/// Changed lines of one file in the head revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedLines {
    /// Every line number covered by at least one hunk.
    pub numbers: BTreeSet<u32>,
    /// Sum of `new_lines` over all hunks. Overlapping hunks are counted once
    /// per hunk, so this can exceed `numbers.len()`.
    pub count: u64,
}

impl ChangedLines {
    pub fn contains(&self, line: u32) -> bool {
        self.numbers.contains(&line)
    }
}

/// Expand the hunks of `diff` into changed line numbers.
///
/// A hunk with `new_lines == 0` (a pure deletion) contributes nothing, whatever
/// its start line.
pub fn changed_lines(diff: &Diff) -> Result<ChangedLines, HunkError> {
    let mut changed = ChangedLines::default();

    for hunk in &diff.hunks {
        if hunk.new_lines == 0 {
            continue;
        }
        if hunk.new_start == 0 {
            return Err(HunkError::ZeroStart {
                new_start: hunk.new_start,
                new_lines: hunk.new_lines,
            });
        }
        let end = hunk
            .new_start
            .checked_add(hunk.new_lines)
            .ok_or(HunkError::Overflow {
                new_start: hunk.new_start,
                new_lines: hunk.new_lines,
            })?;
        changed.numbers.extend(hunk.new_start..end);
        changed.count += u64::from(hunk.new_lines);
    }

    Ok(changed)
}

// ---------------------------------------------------------------------------
// Unified diff parsing
// ---------------------------------------------------------------------------

/// Parse a unified diff and return file path -> hunks (head side only).
/// Deleted files (`+++ /dev/null`) are skipped; files without any hunk
/// (mode changes, binaries) do not appear. C-quoted paths are decoded.
pub fn parse_hunks(diff_text: &str) -> BTreeMap<String, Vec<Hunk>> {
    let mut result: BTreeMap<String, Vec<Hunk>> = BTreeMap::new();
    let mut current_file: Option<String> = None;

    for line in diff_text.lines() {
        if line.starts_with("diff --git ") {
            current_file = None;
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let rest = rest.trim_end_matches('\t');
            let rest = if rest.starts_with('"') {
                unquote_path(rest)
            } else {
                Some(rest.to_string())
            };
            current_file = match rest.as_deref() {
                None | Some("/dev/null") => None,
                Some(rest) => Some(
                    rest.strip_prefix("b/")
                        .or_else(|| rest.strip_prefix("a/"))
                        .unwrap_or(rest)
                        .to_string(),
                ),
            };
        } else if line.starts_with("@@ ") {
            if let (Some(file), Some(hunk)) = (current_file.as_ref(), parse_hunk_header(line)) {
                result.entry(file.clone()).or_default().push(hunk);
            }
        }
    }

    result
}

/// Decode a path git wrote in C-quoted form, e.g. `"b/caf\303\251.ts"`.
/// Octal escapes are raw bytes and are decoded as UTF-8 once the whole path is
/// unescaped. Returns `None` if the quoting is malformed.
fn unquote_path(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();

    while let Some((&b, tail)) = rest.split_first() {
        rest = tail;
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let (&esc, tail) = rest.split_first()?;
        rest = tail;
        let decoded = match esc {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            b'"' | b'\\' => esc,
            b'0'..=b'3' => {
                let digits = rest.get(..2)?;
                rest = &rest[2..];
                let mut value = u32::from(esc - b'0');
                for &d in digits {
                    if !(b'0'..=b'7').contains(&d) {
                        return None;
                    }
                    value = value * 8 + u32::from(d - b'0');
                }
                u8::try_from(value).ok()?
            }
            _ => return None,
        };
        bytes.push(decoded);
    }

    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse the head-side range of a hunk header like "@@ -10,5 +20,8 @@".
/// A missing count means one line.
fn parse_hunk_header(line: &str) -> Option<Hunk> {
    let after_at = line.strip_prefix("@@ ")?;
    let new_part = after_at.split(' ').nth(1)?.strip_prefix('+')?;
    let (start, count) = match new_part.split_once(',') {
        Some((start, count)) => (start.parse::<u32>().ok()?, count.parse::<u32>().ok()?),
        None => (new_part.parse::<u32>().ok()?, 1),
    };
    Some(Hunk::new(start, count))
}
