//! Line pattern registry: commented-out code, legacy API usage, and export
//! declarations, matched one line at a time.

#![allow(missing_docs)]

use regex::Regex;

use crate::core::errors::{AuditError, Result};

const COMMENTED_CODE: &str = r"^\s*(?:#|//)\s*(?:if|for|while|return|const|let|var|class|function|def|import|from|export|try|catch|except|switch|case|break|continue|await|async|with)\b";

/// Built-in legacy-API table: (name, pattern).
const LEGACY_PATTERNS: &[(&str, &str)] = &[
    ("print statement", r"^\s*print\s+[^\s=(]"),
    ("old-style class", r"^\s*class\s+\w+\s*:"),
    (
        "deprecated OpenAI pattern",
        r"\bCompletion\.create\b|\.createCompletion\s*\(",
    ),
    ("var declaration", r"^\s*var\s+[A-Za-z_$]"),
    ("CommonJS require", r#"\brequire\s*\(\s*['"]"#),
];

const EXPORT_DECLARATION: &str = r"^\s*export\s+(?:default\s+)?(?:declare\s+)?(?:async\s+)?(?:abstract\s+)?(?:function\s*\*?|class|const|let|var|interface|type|enum|namespace)\s*([A-Za-z_$][\w$]*)";

/// `export { a, b as c };` without a `from` clause.
const EXPORT_LIST: &str = r"^\s*export\s+(?:type\s+)?\{([^}]*)\}\s*;?\s*$";

/// Everything the registry found on one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSignals {
    pub commented_code: bool,
    /// Names of every legacy pattern that matched.
    pub legacy: Vec<&'static str>,
    /// Exported symbol names declared on the line.
    pub exports: Vec<String>,
}

#[derive(Debug, Clone)]
struct LegacyPattern {
    name: &'static str,
    regex: Regex,
}

/// Compiled line classifiers. Build once per run and share by reference.
#[derive(Debug, Clone)]
pub struct LinePatternRegistry {
    commented_code: Regex,
    legacy: Vec<LegacyPattern>,
    export_declaration: Regex,
    export_list: Regex,
}

impl LinePatternRegistry {
    pub fn new() -> Result<Self> {
        let legacy = LEGACY_PATTERNS
            .iter()
            .map(|&(name, pattern)| {
                Ok(LegacyPattern {
                    name,
                    regex: compile(pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            commented_code: compile(COMMENTED_CODE)?,
            legacy,
            export_declaration: compile(EXPORT_DECLARATION)?,
            export_list: compile(EXPORT_LIST)?,
        })
    }

    /// Classify one line (trailing `\r` already stripped).
    ///
    /// Order: commented-out code, then legacy patterns, then exports. A line
    /// can land in several categories.
    #[must_use]
    pub fn classify(&self, line: &str) -> LineSignals {
        let mut signals = LineSignals {
            commented_code: self.commented_code.is_match(line),
            ..LineSignals::default()
        };

        for pattern in &self.legacy {
            if pattern.regex.is_match(line) {
                signals.legacy.push(pattern.name);
            }
        }

        if let Some(caps) = self.export_declaration.captures(line)
            && let Some(name) = caps.get(1)
        {
            signals.exports.push(name.as_str().to_string());
        } else if let Some(caps) = self.export_list.captures(line)
            && let Some(list) = caps.get(1)
        {
            signals.exports.extend(parse_export_list(list.as_str()));
        }

        signals
    }
}

/// `a, b as c, type D` → `a`, `c`, `D`.
fn parse_export_list(list: &str) -> Vec<String> {
    list.split(',')
        .filter_map(|item| {
            let item = item.trim();
            let item = item.strip_prefix("type ").map_or(item, str::trim);
            let exported = item
                .rsplit_once(" as ")
                .map_or(item, |(_, alias)| alias.trim());
            let valid = !exported.is_empty()
                && exported != "default"
                && exported
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
            valid.then(|| exported.to_string())
        })
        .collect()
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| AuditError::InvalidConfig {
        details: format!("invalid line pattern {pattern:?}: {err}"),
    })
}
