//! Include/exclude glob policy applied to the changed-file list.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::Result;
use crate::model::{normalize_path, ChangedFile};

/// Source files considered for diff coverage when nothing else is configured.
pub const DEFAULT_INCLUDES: &[&str] = &[
    "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.vue",
];

/// Keeps a path iff it matches at least one include glob and no exclude glob.
///
/// Globs follow shell semantics: `*` stays within one path segment, `**`
/// spans any depth. Matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn new<I, E>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.include.is_match(&path) && !self.exclude.is_match(&path)
    }

    /// Filter `files`, preserving their order.
    pub fn apply(&self, files: Vec<ChangedFile>) -> Vec<ChangedFile> {
        files
            .into_iter()
            .filter(|f| {
                let keep = self.matches(&f.path);
                if !keep {
                    log::debug!("Filtered out {}", f.path);
                }
                keep
            })
            .collect()
    }
}

fn build_set<P>(patterns: P) -> Result<GlobSet>
where
    P: IntoIterator,
    P::Item: AsRef<str>,
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern.as_ref())
            .literal_separator(true)
            .build()?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
