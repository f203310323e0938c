//! Finding model: category taxonomy, suggested actions, and signatures.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed finding taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    LargeModule,
    CommentedOut,
    LegacyPattern,
    Duplicate,
    Manifest,
    MemorySchema,
    Unused,
    TestMock,
    Trace,
    ScanError,
    UnusedCheck,
    /// The auditor could not run one of its own collaborators at all.
    Daemon,
}

impl Category {
    pub const ALL: [Self; 12] = [
        Self::LargeModule,
        Self::CommentedOut,
        Self::LegacyPattern,
        Self::Duplicate,
        Self::Manifest,
        Self::MemorySchema,
        Self::Unused,
        Self::TestMock,
        Self::Trace,
        Self::ScanError,
        Self::UnusedCheck,
        Self::Daemon,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LargeModule => "large-module",
            Self::CommentedOut => "commented-out",
            Self::LegacyPattern => "legacy-pattern",
            Self::Duplicate => "duplicate",
            Self::Manifest => "manifest",
            Self::MemorySchema => "memory-schema",
            Self::Unused => "unused",
            Self::TestMock => "test-mock",
            Self::Trace => "trace",
            Self::ScanError => "scan-error",
            Self::UnusedCheck => "unused-check",
            Self::Daemon => "daemon",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suggested remediation. The engine never applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Refactor,
    Remove,
    Verify,
    Fix,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Refactor => "refactor",
            Self::Remove => "remove",
            Self::Verify => "verify",
            Self::Fix => "fix",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported issue.
///
/// `consecutive_count` and `auto_remove_candidate` are filled in by the state
/// tracker, `merge_touched` by the merge annotation stage. Everything else is
/// fixed when the finding is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub category: Category,
    pub file: String,
    pub line: usize,
    pub message: String,
    pub action: Action,
    #[serde(default)]
    pub consecutive_count: u32,
    #[serde(default)]
    pub auto_remove_candidate: bool,
    #[serde(default)]
    pub merge_touched: bool,
}

impl Finding {
    pub fn new(
        category: Category,
        file: impl Into<String>,
        line: usize,
        message: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            category,
            file: file.into(),
            line,
            message: message.into(),
            action,
            consecutive_count: 0,
            auto_remove_candidate: false,
            merge_touched: false,
        }
    }

    /// Cross-run identity: `category|file|line|message`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.category.as_str(),
            self.file,
            self.line,
            self.message
        )
    }
}
