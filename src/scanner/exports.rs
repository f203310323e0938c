//! Cross-file index of exported symbol names.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use crate::audit::finding::{Action, Category, Finding};
use crate::scanner::stream::ScanResult;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SymbolLocation {
    pub file: String,
    pub line: usize,
}

/// `symbol → locations`, accumulated across every scanned file.
///
/// Matching is by name only; two unrelated modules that both export `config`
/// are reported. Findings are therefore `verify`, never `remove`.
#[derive(Debug, Default)]
pub struct ExportIndex {
    symbols: BTreeMap<String, Vec<SymbolLocation>>,
}

impl ExportIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: &ScanResult) {
        for export in &result.export_matches {
            self.symbols
                .entry(export.symbol.clone())
                .or_default()
                .push(SymbolLocation {
                    file: result.relative_path.clone(),
                    line: export.line,
                });
        }
    }

    /// One `duplicate` finding per location of every multiply-declared symbol.
    #[must_use]
    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (symbol, locations) in &self.symbols {
            if locations.len() < 2 {
                continue;
            }
            let mut sorted = locations.clone();
            sorted.sort();
            for (index, location) in sorted.iter().enumerate() {
                let others: Vec<String> = sorted
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .map(|(_, other)| format!("{}:{}", other.file, other.line))
                    .collect();
                findings.push(Finding::new(
                    Category::Duplicate,
                    location.file.clone(),
                    location.line,
                    format!(
                        "Export `{symbol}` is also declared at {}.",
                        others.join(", ")
                    ),
                    Action::Verify,
                ));
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::stream::ExportMatch;

    fn result(path: &str, exports: &[(usize, &str)]) -> ScanResult {
        ScanResult {
            relative_path: path.to_string(),
            line_count: 10,
            commented_lines: Vec::new(),
            legacy_matches: Vec::new(),
            export_matches: exports
                .iter()
                .map(|(line, symbol)| ExportMatch {
                    line: *line,
                    symbol: (*symbol).to_string(),
                })
                .collect(),
            hash: String::new(),
            fingerprint: None,
        }
    }

    #[test]
    fn unique_exports_produce_nothing() {
        let mut index = ExportIndex::new();
        index.add(&result("a.ts", &[(1, "alpha")]));
        index.add(&result("b.ts", &[(1, "beta")]));
        assert!(index.findings().is_empty());
    }

    #[test]
    fn shared_symbol_is_reported_at_every_location() {
        let mut index = ExportIndex::new();
        index.add(&result("src/a.ts", &[(3, "loadState")]));
        index.add(&result("src/b.ts", &[(9, "loadState"), (12, "other")]));

        let findings = index.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].file, "src/a.ts");
        assert_eq!(findings[0].line, 3);
        assert!(findings[0].message.contains("src/b.ts:9"));
        assert_eq!(findings[1].file, "src/b.ts");
        assert!(findings[1].message.contains("src/a.ts:3"));
        assert!(findings.iter().all(|f| f.action == Action::Verify));
    }

    #[test]
    fn same_file_redeclaration_counts() {
        let mut index = ExportIndex::new();
        index.add(&result("a.ts", &[(1, "x"), (5, "x")]));
        let findings = index.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!((findings[0].line, findings[1].line), (1, 5));
    }
}
