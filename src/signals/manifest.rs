//! Module manifest check.
//!
//! The manifest is a JSON document `{"modules": [...]}` whose entries are
//! either a workspace-relative path string or an object with a `path` field.
//! Every listed module must exist on disk.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;

use crate::audit::finding::{Action, Category, Finding};
use crate::core::paths::normalize_relative_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReport {
    /// The manifest file exists (it may still be malformed).
    pub present: bool,
    pub modules_checked: usize,
    pub findings: Vec<Finding>,
}

impl ManifestReport {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.present && self.findings.is_empty()
    }
}

pub fn check_manifest(workspace: &Path, manifest_path: &Path) -> ManifestReport {
    let label = normalize_relative_path(workspace, manifest_path);
    let finding = |message: String| {
        Finding::new(Category::Manifest, label.clone(), 1, message, Action::Fix)
    };

    let raw = match fs::read_to_string(manifest_path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return ManifestReport {
                present: false,
                modules_checked: 0,
                findings: vec![finding("Module manifest is missing.".to_string())],
            };
        }
        Err(err) => {
            return ManifestReport {
                present: true,
                modules_checked: 0,
                findings: vec![finding(format!("Module manifest is unreadable: {err}."))],
            };
        }
    };

    let entries = match parse_entries(&raw) {
        Ok(entries) => entries,
        Err(details) => {
            return ManifestReport {
                present: true,
                modules_checked: 0,
                findings: vec![finding(format!("Module manifest is malformed: {details}."))],
            };
        }
    };

    let mut findings = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match entry {
            Some(module) if workspace.join(module).exists() => {}
            Some(module) => findings.push(finding(format!(
                "Manifest references missing module {module}."
            ))),
            None => findings.push(finding(format!("Manifest entry {index} has no path."))),
        }
    }

    ManifestReport {
        present: true,
        modules_checked: entries.len(),
        findings,
    }
}

/// Module paths in manifest order; `None` for entries without a usable path.
fn parse_entries(raw: &str) -> Result<Vec<Option<String>>, String> {
    let doc: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    let modules = doc
        .get("modules")
        .and_then(Value::as_array)
        .ok_or_else(|| "expected an object with a `modules` array".to_string())?;

    Ok(modules
        .iter()
        .map(|entry| match entry {
            Value::String(path) => Some(path.clone()),
            Value::Object(map) => map.get("path").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .map(|path| path.filter(|p| !p.trim().is_empty()))
        .collect())
}
