//! Duplicate file detection.
//!
//! Three grouping phases, each narrowing the previous one:
//!
//! 1. exact content hash
//! 2. exact size within a hash group
//! 3. fingerprint signature (size + head/tail samples) within a size group
//!
//! Only files that share all three are reported. A hash match alone is never
//! trusted, so an engineered collision between files of different sizes or
//! different edges cannot produce a finding.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use crate::audit::finding::{Action, Category, Finding};
use crate::scanner::stream::ScanResult;

/// Characters of the content hash shown in messages.
const SHORT_HASH_LEN: usize = 12;

/// A set of files verified as byte-identical by hash, size, and fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub hash: String,
    pub size_bytes: u64,
    pub signature: String,
    /// Sorted relative paths, at least two.
    pub files: Vec<String>,
}

/// Result of one detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    /// Files in a shared hash bucket whose fingerprint is unavailable.
    pub missing_fingerprint: Vec<String>,
}

impl DuplicateReport {
    /// One `duplicate` finding per file per verified group, plus one per file
    /// that could not be verified.
    #[must_use]
    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        for group in &self.groups {
            let short_hash: String = group.hash.chars().take(SHORT_HASH_LEN).collect();
            let message = format!(
                "Duplicate content in [{}] (sha256 {short_hash}, fingerprint {}).",
                group.files.join(", "),
                group.signature
            );
            for file in &group.files {
                findings.push(Finding::new(
                    Category::Duplicate,
                    file.clone(),
                    1,
                    message.clone(),
                    Action::Verify,
                ));
            }
        }
        for file in &self.missing_fingerprint {
            findings.push(Finding::new(
                Category::Duplicate,
                file.clone(),
                1,
                "Duplicate hash match with missing fingerprint.",
                Action::Verify,
            ));
        }
        findings
    }
}

/// Groups scan results into verified duplicates.
#[derive(Debug, Default)]
pub struct DuplicateDetector;

impl DuplicateDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn detect<'a, I>(&self, results: I) -> DuplicateReport
    where
        I: IntoIterator<Item = &'a ScanResult>,
    {
        let mut by_hash: BTreeMap<&str, Vec<&ScanResult>> = BTreeMap::new();
        for result in results {
            by_hash.entry(result.hash.as_str()).or_default().push(result);
        }

        let mut report = DuplicateReport::default();
        for (hash, bucket) in by_hash {
            if bucket.len() < 2 {
                continue;
            }

            let mut by_size: BTreeMap<u64, Vec<(&ScanResult, String)>> = BTreeMap::new();
            for result in bucket {
                match &result.fingerprint {
                    Some(fingerprint) => by_size
                        .entry(fingerprint.size_bytes)
                        .or_default()
                        .push((result, fingerprint.signature())),
                    None => report
                        .missing_fingerprint
                        .push(result.relative_path.clone()),
                }
            }

            for (size_bytes, sized) in by_size {
                if sized.len() < 2 {
                    continue;
                }
                let mut by_signature: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for (result, signature) in sized {
                    by_signature
                        .entry(signature)
                        .or_default()
                        .push(result.relative_path.clone());
                }
                for (signature, mut files) in by_signature {
                    if files.len() < 2 {
                        continue;
                    }
                    files.sort();
                    report.groups.push(DuplicateGroup {
                        hash: hash.to_string(),
                        size_bytes,
                        signature,
                        files,
                    });
                }
            }
        }

        report.missing_fingerprint.sort();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::stream::Fingerprint;

    fn result(path: &str, hash: &str, content: &[u8]) -> ScanResult {
        ScanResult {
            relative_path: path.to_string(),
            line_count: 1,
            commented_lines: Vec::new(),
            legacy_matches: Vec::new(),
            export_matches: Vec::new(),
            hash: hash.to_string(),
            fingerprint: Some(Fingerprint {
                size_bytes: content.len() as u64,
                head_sample: content.iter().copied().take(128).collect(),
                tail_sample: content[content.len().saturating_sub(128)..].to_vec(),
            }),
        }
    }

    #[test]
    fn identical_files_form_one_group() {
        let a = result("src/a.ts", "abc123", b"same body\n");
        let b = result("lib/b.ts", "abc123", b"same body\n");
        let c = result("src/c.ts", "ffff00", b"other\n");

        let report = DuplicateDetector::new().detect([&a, &b, &c]);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].files, vec!["lib/b.ts", "src/a.ts"]);

        let findings = report.findings();
        assert_eq!(findings.len(), 2);
        for finding in &findings {
            assert_eq!(finding.category, Category::Duplicate);
            assert_eq!(finding.action, Action::Verify);
            assert_eq!(finding.line, 1);
            assert!(finding.message.contains("lib/b.ts"));
            assert!(finding.message.contains("src/a.ts"));
            assert!(finding.message.contains("abc123"));
        }
    }

    #[test]
    fn hash_collision_with_different_sizes_is_not_a_duplicate() {
        let a = result("a.ts", "collide", b"short\n");
        let b = result("b.ts", "collide", b"a rather longer body\n");
        let report = DuplicateDetector::new().detect([&a, &b]);
        assert!(report.groups.is_empty());
        assert!(report.findings().is_empty());
    }

    #[test]
    fn hash_collision_with_same_size_but_different_edges_is_not_a_duplicate() {
        let a = result("a.ts", "collide", b"aaaa\n");
        let b = result("b.ts", "collide", b"bbbb\n");
        let report = DuplicateDetector::new().detect([&a, &b]);
        assert!(report.groups.is_empty());
    }

    #[test]
    fn missing_fingerprint_yields_standalone_finding() {
        let a = result("a.ts", "h", b"x\n");
        let mut b = result("b.ts", "h", b"x\n");
        b.fingerprint = None;

        let report = DuplicateDetector::new().detect([&a, &b]);
        assert!(report.groups.is_empty());
        assert_eq!(report.missing_fingerprint, vec!["b.ts"]);

        let findings = report.findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "b.ts");
        assert!(findings[0].message.contains("missing fingerprint"));
    }

    #[test]
    fn three_way_group_reports_every_member() {
        let files: Vec<_> = ["x.py", "y.py", "z.py"]
            .iter()
            .map(|p| result(p, "h", b"print('hi')\n"))
            .collect();
        let report = DuplicateDetector::new().detect(&files);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.findings().len(), 3);
    }
}
