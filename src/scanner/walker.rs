//! Source file walker: recursive descent with segment pruning.
//!
//! The walker is the "eyes" of the auditor. It lists candidate source files
//! under one workspace root and nothing else; classification happens in the
//! streaming scanner.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::paths::normalize_relative_path;
use crate::scanner::filter::PathFilter;

/// Walker configuration derived from `ScanConfig`.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub root: PathBuf,
    /// Extensions with leading dot, e.g. `.ts`.
    pub extensions: HashSet<String>,
    pub filter: PathFilter,
}

impl WalkerConfig {
    pub fn new<I, S>(root: impl Into<PathBuf>, extensions: I, filter: PathFilter) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
            filter,
        }
    }
}

/// Recursive source walker.
///
/// - Unlistable directories are skipped, the walk continues elsewhere
/// - Symlinks are not followed (no loop detection is attempted)
/// - Depth is unbounded
/// - Output is sorted so runs are deterministic
pub struct SourceWalker {
    config: WalkerConfig,
}

impl SourceWalker {
    pub fn new(config: WalkerConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Collect absolute paths of every matching file under the root.
    pub fn walk(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        self.descend(&self.config.root, &mut files);
        files.sort();
        files
    }

    /// Relative, `/`-separated form of a walked path.
    pub fn relative(&self, path: &Path) -> String {
        normalize_relative_path(&self.config.root, path)
    }

    fn descend(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            if self.config.filter.is_ignored_segment(&name.to_string_lossy()) {
                continue;
            }

            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                continue;
            }

            let path = entry.path();
            if file_type.is_dir() {
                self.descend(&path, files);
            } else if file_type.is_file() && self.has_recognized_extension(&path) {
                files.push(path);
            }
        }
    }

    fn has_recognized_extension(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            self.config
                .extensions
                .contains(&format!(".{}", ext.to_string_lossy()))
        })
    }
}
