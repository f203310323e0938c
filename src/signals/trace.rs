//! Runtime-trace reference check.
//!
//! The trace log is free-form text; any token that looks like a source path is
//! taken as evidence the module was loaded at runtime. Scanned modules with no
//! such evidence are flagged for review.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::audit::finding::{Action, Category, Finding};
use crate::core::config::TraceConfig;
use crate::core::errors::{AuditError, Result};
use crate::core::paths::{normalize_relative_path, normalize_slash_path};
use crate::signals::mocks::is_test_module;

const SOURCE_REFERENCE: &str = r"[A-Za-z0-9_@$.\\/-]+\.(?:tsx?|jsx?|mjs|cjs|py)\b";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceReport {
    pub present: bool,
    /// Distinct path references found in the log.
    pub references: usize,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone)]
pub struct TraceAdapter {
    config: TraceConfig,
    reference: Regex,
}

impl TraceAdapter {
    pub fn new(config: TraceConfig) -> Result<Self> {
        let reference = Regex::new(SOURCE_REFERENCE).map_err(|err| AuditError::InvalidConfig {
            details: format!("trace reference pattern: {err}"),
        })?;
        Ok(Self { config, reference })
    }

    /// Flag every scanned, non-test module absent from the trace log.
    pub fn check<'a, I>(&self, workspace: &Path, trace_log: &Path, scanned: I) -> TraceReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Ok(raw) = fs::read(trace_log) else {
            return TraceReport {
                present: false,
                references: 0,
                findings: vec![Finding::new(
                    Category::Trace,
                    normalize_relative_path(workspace, trace_log),
                    1,
                    "Runtime trace log is missing; module usage cannot be verified.",
                    Action::Verify,
                )],
            };
        };
        let text = String::from_utf8_lossy(&raw);

        let references = self.references(&text);
        let known = suffix_set(&references);
        let findings = scanned
            .into_iter()
            .filter(|path| !self.is_exempt(path))
            .filter(|path| !known.contains(*path))
            .map(|path| {
                Finding::new(
                    Category::Trace,
                    path,
                    1,
                    "Module never appears in the runtime trace.",
                    Action::Verify,
                )
            })
            .collect();

        TraceReport {
            present: true,
            references: references.len(),
            findings,
        }
    }

    /// Normalized path references in `text`.
    #[must_use]
    pub fn references(&self, text: &str) -> HashSet<String> {
        self.reference
            .find_iter(text)
            .map(|m| normalize_slash_path(m.as_str()))
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Test modules are never expected in a runtime trace.
    #[must_use]
    pub fn is_exempt(&self, relative: &str) -> bool {
        is_test_module(relative, &self.config.exempt_segments)
    }
}

/// Every `/`-aligned suffix of every reference, so an absolute path in the log
/// matches the workspace-relative scan path.
fn suffix_set(references: &HashSet<String>) -> HashSet<&str> {
    let mut out = HashSet::new();
    for reference in references {
        let trimmed = reference.trim_start_matches('/');
        out.insert(trimmed);
        for (index, _) in trimmed.match_indices('/') {
            out.insert(&trimmed[index + 1..]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn adapter() -> TraceAdapter {
        TraceAdapter::new(TraceConfig::default()).unwrap()
    }

    #[test]
    fn extracts_and_normalizes_references() {
        let refs = adapter().references(
            "2026-01-01 load ./src/a.ts\nrequire C:\\app\\src\\b.js ok\n[py] worker/c.py:12\n",
        );
        assert!(refs.contains("src/a.ts"));
        assert!(refs.contains("worker/c.py"));
        assert!(refs.iter().any(|r| r.ends_with("src/b.js")));
    }

    #[test]
    fn flags_unreferenced_modules_only() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("runtime-trace.log");
        fs::write(&log, "boot /srv/app/src/a.ts\nimport src/b.ts\n").unwrap();

        let scanned = ["src/a.ts", "src/b.ts", "src/c.ts", "tests/a.ts", "src/x.test.ts"];
        let report = adapter().check(tmp.path(), &log, scanned);
        assert!(report.present);
        let files: Vec<_> = report.findings.iter().map(|f| f.file.as_str()).collect();
        assert_eq!(files, vec!["src/c.ts"]);
    }

    #[test]
    fn missing_log_is_one_blocking_finding() {
        let tmp = TempDir::new().unwrap();
        let report = adapter().check(
            tmp.path(),
            &tmp.path().join("logs/runtime-trace.log"),
            ["src/a.ts"],
        );
        assert!(!report.present);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].file, "logs/runtime-trace.log");
    }

    #[test]
    fn exemptions_cover_test_dirs_and_names() {
        let a = adapter();
        assert!(a.is_exempt("src/__tests__/a.ts"));
        assert!(a.is_exempt("tests/unit/b.py"));
        assert!(a.is_exempt("src/c.spec.js"));
        assert!(!a.is_exempt("src/testsuite.ts"));
        assert!(!a.is_exempt("src/tests.ts"));
    }
}
