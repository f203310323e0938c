//! Type-checker adapter: unused-symbol diagnostics and the lint step.
//!
//! Whether the check ran is decided by exit status, not by scraping output:
//! exit 0 is a clean run, a failing exit with at least one recognizable
//! diagnostic is a completed run with errors, and anything else (failing exit
//! with unparseable output, spawn failure, timeout) means the check is
//! blocked and its silence proves nothing.

#![allow(missing_docs)]

use std::path::Path;
use std::time::Duration;

use regex::Regex;

use crate::audit::finding::{Action, Category, Finding};
use crate::core::config::{LintConfig, TypecheckConfig};
use crate::core::errors::{AuditError, Result};
use crate::core::paths::normalize_slash_path;
use crate::signals::process::{CommandOutcome, run_with_timeout};

const DIAGNOSTIC: &str = r"^(.+?)\((\d+),(\d+)\): error (TS\d+): (.*)$";

/// Where the unused-symbol check ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnusedCheckStatus {
    /// Exit 0.
    Clean,
    /// Failing exit with parseable diagnostics.
    Ran,
    /// No trustworthy result.
    Blocked { reason: String },
}

impl UnusedCheckStatus {
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

#[derive(Debug)]
pub struct UnusedCheckReport {
    pub status: UnusedCheckStatus,
    /// `unused` findings, plus one `unused-check` finding when blocked.
    pub findings: Vec<Finding>,
    /// Exit 0; feeds the lint gate.
    pub success: bool,
    /// Set when blocked.
    pub failure: Option<AuditError>,
}

impl UnusedCheckReport {
    #[must_use]
    pub fn unused_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.category == Category::Unused)
            .count()
    }
}

/// One parsed `path(line,col): error CODE: message` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct TypecheckAdapter {
    config: TypecheckConfig,
    diagnostic: Regex,
}

impl TypecheckAdapter {
    pub fn new(config: TypecheckConfig) -> Result<Self> {
        let diagnostic = Regex::new(DIAGNOSTIC).map_err(|err| AuditError::InvalidConfig {
            details: format!("diagnostic pattern: {err}"),
        })?;
        Ok(Self { config, diagnostic })
    }

    pub fn run(&self, workspace: &Path) -> UnusedCheckReport {
        let outcome = run_with_timeout(
            &self.config.command,
            workspace,
            Duration::from_secs(self.config.timeout_secs),
        );
        self.interpret(&outcome)
    }

    /// Turn a finished (or failed) command into a report.
    #[must_use]
    pub fn interpret(&self, outcome: &CommandOutcome) -> UnusedCheckReport {
        let command = self.config.command.join(" ");
        match outcome {
            CommandOutcome::Completed { success: true, .. } => {
                let findings = self.unused_findings(&self.parse(&outcome.combined_output()));
                UnusedCheckReport {
                    status: UnusedCheckStatus::Clean,
                    findings,
                    success: true,
                    failure: None,
                }
            }
            CommandOutcome::Completed { code, .. } => {
                let diagnostics = self.parse(&outcome.combined_output());
                if diagnostics.is_empty() {
                    let exit = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                    let reason = format!("exited with {exit} and no parseable diagnostics");
                    let failure = AuditError::Collaborator {
                        command: command.clone(),
                        details: reason.clone(),
                    };
                    blocked(&command, reason, Some(failure))
                } else {
                    UnusedCheckReport {
                        status: UnusedCheckStatus::Ran,
                        findings: self.unused_findings(&diagnostics),
                        success: false,
                        failure: None,
                    }
                }
            }
            CommandOutcome::TimedOut | CommandOutcome::SpawnFailed { .. } => blocked(
                &command,
                failure_reason(outcome, self.config.timeout_secs),
                outcome.failure(
                    &self.config.command,
                    Duration::from_secs(self.config.timeout_secs),
                ),
            ),
        }
    }

    /// Every recognizable diagnostic, of any code.
    #[must_use]
    pub fn parse(&self, output: &str) -> Vec<Diagnostic> {
        output
            .lines()
            .filter_map(|line| {
                let caps = self.diagnostic.captures(line.trim_end_matches('\r'))?;
                Some(Diagnostic {
                    file: normalize_slash_path(caps.get(1)?.as_str().trim()),
                    line: caps.get(2)?.as_str().parse().ok()?,
                    column: caps.get(3)?.as_str().parse().ok()?,
                    code: caps.get(4)?.as_str().to_string(),
                    message: caps.get(5)?.as_str().trim().to_string(),
                })
            })
            .collect()
    }

    fn unused_findings(&self, diagnostics: &[Diagnostic]) -> Vec<Finding> {
        diagnostics
            .iter()
            .filter(|d| self.config.unused_codes.contains(&d.code))
            .map(|d| {
                Finding::new(
                    Category::Unused,
                    d.file.clone(),
                    d.line,
                    format!("{}: {}", d.code, d.message),
                    Action::Remove,
                )
            })
            .collect()
    }
}

fn failure_reason(outcome: &CommandOutcome, timeout_secs: u64) -> String {
    match outcome {
        CommandOutcome::SpawnFailed { error } => format!("could not start: {error}"),
        _ => format!("timed out after {timeout_secs}s"),
    }
}

fn blocked(command: &str, reason: String, failure: Option<AuditError>) -> UnusedCheckReport {
    let finding = Finding::new(
        Category::UnusedCheck,
        command,
        1,
        format!("Unused-symbol check blocked: {reason}."),
        Action::Verify,
    );
    UnusedCheckReport {
        status: UnusedCheckStatus::Blocked { reason },
        findings: vec![finding],
        success: false,
        failure,
    }
}

/// Result of the optional lint command.
#[derive(Debug)]
pub struct LintReport {
    /// `None` when no lint command is configured.
    pub success: Option<bool>,
    /// A `daemon` finding when the command could not run at all.
    pub findings: Vec<Finding>,
    pub failure: Option<AuditError>,
}

pub fn run_lint(config: &LintConfig, workspace: &Path) -> LintReport {
    if config.command.is_empty() {
        return LintReport {
            success: None,
            findings: Vec::new(),
            failure: None,
        };
    }
    let outcome = run_with_timeout(
        &config.command,
        workspace,
        Duration::from_secs(config.timeout_secs),
    );
    interpret_lint(config, &outcome)
}

#[must_use]
pub fn interpret_lint(config: &LintConfig, outcome: &CommandOutcome) -> LintReport {
    if let CommandOutcome::Completed { success, .. } = outcome {
        return LintReport {
            success: Some(*success),
            findings: Vec::new(),
            failure: None,
        };
    }
    LintReport {
        success: Some(false),
        findings: vec![Finding::new(
            Category::Daemon,
            config.command.join(" "),
            1,
            format!("Lint command {}.", failure_reason(outcome, config.timeout_secs)),
            Action::Fix,
        )],
        failure: outcome.failure(&config.command, Duration::from_secs(config.timeout_secs)),
    }
}
