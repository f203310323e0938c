//! Test mock-target resolution.
//!
//! `jest.mock('./x')` and friends name a module relative to the test file. A
//! reference that resolves to nothing means the mock silently stopped
//! covering anything.

#![allow(missing_docs)]

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::audit::finding::{Action, Category, Finding};
use crate::core::errors::{AuditError, Result};

const MOCK_REFERENCE: &str = r#"\b(?:jest|vi)\.(?:mock|doMock|unmock|requireActual|importActual)\s*(?:<[^>]*>)?\s*\(\s*['"`]([^'"`]+)['"`]"#;

/// Suffixes tried, in order, after the reference as written.
const CANDIDATE_SUFFIXES: &[&str] = &[
    "", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py", "/index.ts", "/index.js",
];

/// True for files under a test segment or named `*.test.*` / `*.spec.*`.
#[must_use]
pub fn is_test_module(relative: &str, test_segments: &[String]) -> bool {
    let mut segments = relative.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            return segment.contains(".test.") || segment.contains(".spec.");
        }
        if test_segments.iter().any(|s| s == segment) {
            return true;
        }
    }
    false
}

/// One `.`-relative mock reference found in a test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockReference {
    pub line: usize,
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct MockTargetChecker {
    reference: Regex,
    test_segments: Vec<String>,
}

impl MockTargetChecker {
    pub fn new(test_segments: Vec<String>) -> Result<Self> {
        let reference = Regex::new(MOCK_REFERENCE).map_err(|err| AuditError::InvalidConfig {
            details: format!("mock reference pattern: {err}"),
        })?;
        Ok(Self {
            reference,
            test_segments,
        })
    }

    /// Check every test module among `files` (`(absolute, relative)` pairs).
    pub fn check<'a, I>(&self, files: I) -> Vec<Finding>
    where
        I: IntoIterator<Item = (&'a Path, &'a str)>,
    {
        let mut findings = Vec::new();
        for (absolute, relative) in files {
            if !is_test_module(relative, &self.test_segments) {
                continue;
            }
            // Unreadable test files already surface as scan errors.
            let Ok(references) = self.references_in(absolute) else {
                continue;
            };
            let dir = absolute.parent().unwrap_or(absolute);
            for reference in references {
                if resolve(dir, &reference.target).is_none() {
                    findings.push(Finding::new(
                        Category::TestMock,
                        relative,
                        reference.line,
                        format!("Mock target {} does not resolve.", reference.target),
                        Action::Fix,
                    ));
                }
            }
        }
        findings
    }

    pub fn references_in(&self, path: &Path) -> std::io::Result<Vec<MockReference>> {
        let reader = BufReader::new(File::open(path)?);
        let mut out = Vec::new();
        for (index, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            let text = String::from_utf8_lossy(&line);
            out.extend(self.parse_line(&text, index + 1));
        }
        Ok(out)
    }

    /// Relative (`.`-prefixed) references on one line; package names are skipped.
    #[must_use]
    pub fn parse_line(&self, text: &str, line: usize) -> Vec<MockReference> {
        self.reference
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|target| target.starts_with('.'))
            .map(|target| MockReference {
                line,
                target: target.to_string(),
            })
            .collect()
    }
}

/// First existing candidate for `target` relative to `dir`.
#[must_use]
pub fn resolve(dir: &Path, target: &str) -> Option<PathBuf> {
    let base = dir.join(target);
    CANDIDATE_SUFFIXES.iter().find_map(|suffix| {
        let mut candidate = base.clone().into_os_string();
        candidate.push(suffix);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn checker() -> MockTargetChecker {
        MockTargetChecker::new(vec!["tests".to_string(), "__tests__".to_string()]).unwrap()
    }

    fn write(root: &Path, rel: &str, body: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn parses_mock_call_forms() {
        let c = checker();
        assert_eq!(c.parse_line("jest.mock('../src/db');", 4)[0].target, "../src/db");
        assert_eq!(c.parse_line("vi.mock(\"./util\", () => ({}))", 1)[0].target, "./util");
        assert_eq!(
            c.parse_line("const real = jest.requireActual<typeof import('x')>('./real');", 2)[0].target,
            "./real"
        );
        assert!(c.parse_line("jest.mock('axios');", 1).is_empty());
    }

    #[test]
    fn resolves_candidate_suffixes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/db.ts", "");
        write(tmp.path(), "src/util/index.js", "");
        write(tmp.path(), "src/exact.json", "");

        let dir = tmp.path().join("src");
        assert!(resolve(&dir, "./db").is_some());
        assert!(resolve(&dir, "./util").is_some());
        assert!(resolve(&dir, "./exact.json").is_some());
        assert!(resolve(&dir, "./nope").is_none());
    }

    #[test]
    fn unresolved_reference_becomes_finding_at_its_line() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/db.ts", "export const db = 1;\n");
        let test = write(
            tmp.path(),
            "tests/db.test.ts",
            "import x from 'y';\njest.mock('../src/db');\njest.mock('../src/gone');\n",
        );
        let plain = write(tmp.path(), "src/app.ts", "jest.mock('./missing');\n");

        let findings = checker().check([
            (test.as_path(), "tests/db.test.ts"),
            (plain.as_path(), "src/app.ts"),
        ]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "tests/db.test.ts");
        assert_eq!(findings[0].line, 3);
        assert_eq!(findings[0].category, Category::TestMock);
        assert_eq!(findings[0].action, Action::Fix);
    }

    #[test]
    fn test_module_detection() {
        let segments = vec!["tests".to_string(), "__tests__".to_string()];
        assert!(is_test_module("src/__tests__/a.ts", &segments));
        assert!(is_test_module("src/a.spec.ts", &segments));
        assert!(!is_test_module("src/tests.ts", &segments));
    }
}
