//! Run result document, gate evaluation, and latest/history persistence.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::finding::{Category, Finding};
use crate::core::errors::{AuditError, Result};
use crate::core::persist::{read_json, write_json_atomic};

/// Consecutive clean unused-symbol runs required by the unused gate.
pub const UNUSED_CLEAN_STREAK_REQUIRED: u32 = 2;

const HISTORY_PREFIX: &str = "continuous-audit-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Clean,
    NeedsAttention,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "CLEAN",
            Self::NeedsAttention => "NEEDS_ATTENTION",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateFlags {
    pub lint_ok: bool,
    pub manifest_ok: bool,
    pub schema_ok: bool,
    pub unused_clean_ok: bool,
}

impl GateFlags {
    #[must_use]
    pub const fn all_pass(&self) -> bool {
        self.lint_ok && self.manifest_ok && self.schema_ok && self.unused_clean_ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_findings: usize,
    pub files_scanned: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub unused_findings: usize,
    pub auto_remove_candidates: usize,
    pub unused_check_blocked: bool,
}

impl Summary {
    #[must_use]
    pub fn from_findings(findings: &[Finding], files_scanned: usize, unused_check_blocked: bool) -> Self {
        let mut by_category = BTreeMap::new();
        for finding in findings {
            *by_category.entry(finding.category).or_insert(0) += 1;
        }
        Self {
            total_findings: findings.len(),
            files_scanned,
            unused_findings: by_category.get(&Category::Unused).copied().unwrap_or(0),
            auto_remove_candidates: findings.iter().filter(|f| f.auto_remove_candidate).count(),
            by_category,
            unused_check_blocked,
        }
    }
}

/// Full result of auditing one workspace once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub workspace: String,
    pub timestamp: DateTime<Utc>,
    pub merge_commits: Vec<String>,
    pub summary: Summary,
    pub gate_flags: GateFlags,
    pub status: RunStatus,
    pub findings: Vec<Finding>,
}

impl RunResult {
    /// `CLEAN` only when every gate passes and there is nothing to report.
    #[must_use]
    pub fn status_for(gates: &GateFlags, findings: &[Finding]) -> RunStatus {
        if gates.all_pass() && findings.is_empty() {
            RunStatus::Clean
        } else {
            RunStatus::NeedsAttention
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.status == RunStatus::Clean
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        read_json(path)
    }

    pub fn write_latest(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    /// Write a new history entry and return its path. Never overwrites.
    pub fn write_history(&self, history_dir: &Path) -> Result<PathBuf> {
        let path = next_history_path(history_dir, self.timestamp);
        write_json_atomic(&path, self)?;
        Ok(path)
    }
}

/// `continuous-audit-<YYYYMMDDTHHMMSS.fffZ>[-n].json`, first free name.
#[must_use]
pub fn next_history_path(history_dir: &Path, timestamp: DateTime<Utc>) -> PathBuf {
    let slug = timestamp.format("%Y%m%dT%H%M%S%.3fZ").to_string();
    let base = history_dir.join(format!("{HISTORY_PREFIX}{slug}.json"));
    if !base.exists() {
        return base;
    }
    (1u32..)
        .map(|n| history_dir.join(format!("{HISTORY_PREFIX}{slug}-{n}.json")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// History entries, newest first.
pub fn list_history(history_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(history_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(AuditError::io(history_dir, source)),
    };
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(HISTORY_PREFIX) && n.ends_with(".json"))
        })
        .collect();
    // The slug sorts chronologically; a `-n` suffix sorts after its base.
    paths.sort_by_key(|path| history_sort_key(path));
    paths.reverse();
    Ok(paths)
}

fn history_sort_key(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .trim_start_matches(HISTORY_PREFIX);
    match stem.split_once("Z-") {
        Some((slug, n)) => (slug.to_string(), n.parse().unwrap_or(0)),
        None => (stem.trim_end_matches('Z').to_string(), 0),
    }
}
