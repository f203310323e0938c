//! Persisted state-document schema check: required top-level keys.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;

use crate::audit::finding::{Action, Category, Finding};
use crate::core::paths::normalize_relative_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReport {
    pub present: bool,
    pub findings: Vec<Finding>,
}

impl SchemaReport {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.present && self.findings.is_empty()
    }
}

pub fn check_schema(workspace: &Path, document: &Path, required_keys: &[String]) -> SchemaReport {
    let label = normalize_relative_path(workspace, document);
    let finding = |message: String| {
        Finding::new(Category::MemorySchema, label.clone(), 1, message, Action::Fix)
    };

    let raw = match fs::read_to_string(document) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return SchemaReport {
                present: false,
                findings: vec![finding("State document is missing.".to_string())],
            };
        }
        Err(err) => {
            return SchemaReport {
                present: true,
                findings: vec![finding(format!("State document is unreadable: {err}."))],
            };
        }
    };

    let object = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            return SchemaReport {
                present: true,
                findings: vec![finding("State document is not a JSON object.".to_string())],
            };
        }
        Err(err) => {
            return SchemaReport {
                present: true,
                findings: vec![finding(format!("State document is malformed: {err}."))],
            };
        }
    };

    let findings = required_keys
        .iter()
        .filter(|key| !object.contains_key(key.as_str()))
        .map(|key| finding(format!("State document is missing required key `{key}`.")))
        .collect();

    SchemaReport {
        present: true,
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SchemaConfig;
    use tempfile::TempDir;

    fn run(body: Option<&str>) -> SchemaReport {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("memory/state.json");
        if let Some(body) = body {
            fs::create_dir_all(doc.parent().unwrap()).unwrap();
            fs::write(&doc, body).unwrap();
        }
        check_schema(tmp.path(), &doc, &SchemaConfig::default().required_keys)
    }

    #[test]
    fn complete_document_passes() {
        let report = run(Some(r#"{"schemaVersion": 2, "entries": [], "updatedAt": "now"}"#));
        assert!(report.ok());
    }

    #[test]
    fn each_missing_key_is_a_finding() {
        let report = run(Some(r#"{"entries": []}"#));
        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[0].file, "memory/state.json");
        assert!(report.findings[0].message.contains("schemaVersion"));
        assert!(report.findings[1].message.contains("updatedAt"));
    }

    #[test]
    fn absent_malformed_and_non_object_are_single_findings() {
        let absent = run(None);
        assert!(!absent.present);
        assert_eq!(absent.findings.len(), 1);

        let malformed = run(Some("{"));
        assert!(malformed.present);
        assert_eq!(malformed.findings.len(), 1);

        let array = run(Some("[1, 2]"));
        assert_eq!(array.findings.len(), 1);
        assert!(array.findings[0].message.contains("not a JSON object"));
    }
}
