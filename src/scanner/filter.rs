//! Path filter: prunes generated, vendored, and tooling directories.

#![allow(missing_docs)]

use std::collections::HashSet;

/// Directory segments that never hold first-party source.
pub const DEFAULT_IGNORED_SEGMENTS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "coverage",
    "venv",
    ".venv",
    "__pycache__",
    ".pytest_cache",
    ".vscode",
    ".next",
    "target",
    "npm_logs",
    "logs",
    "tmp",
];

/// Exact-match segment filter. A path is ignored when any of its segments is
/// in the set; matching is case-sensitive, as on the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    ignored: HashSet<String>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_SEGMENTS.iter().copied())
    }
}

impl PathFilter {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored: segments.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_ignored_segment(&self, segment: &str) -> bool {
        self.ignored.contains(segment)
    }
}
