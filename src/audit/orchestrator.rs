//! One audit run over one workspace.
//!
//! Stages run in a fixed order and none of them can abort the run: every
//! collaborator failure degrades into a finding, a blocked status, or an
//! activity-log entry, and a [`RunResult`] is always produced.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::audit::finding::{Action, Category, Finding};
use crate::audit::report::{GateFlags, RunResult, Summary, UNUSED_CLEAN_STREAK_REQUIRED};
use crate::audit::state::{AuditState, UnusedCheckSummary, apply_consecutive_counts};
use crate::core::config::{AuditConfig, PathsConfig};
use crate::core::errors::{AuditError, Result};
use crate::core::paths::resolve_absolute_path;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::scanner::duplicates::DuplicateDetector;
use crate::scanner::exports::ExportIndex;
use crate::scanner::filter::PathFilter;
use crate::scanner::patterns::LinePatternRegistry;
use crate::scanner::pool::scan_all;
use crate::scanner::stream::{CommentedLine, ScanOutcome, ScanResult, StreamingScanner};
use crate::scanner::walker::{SourceWalker, WalkerConfig};
use crate::signals::manifest::check_manifest;
use crate::signals::mocks::MockTargetChecker;
use crate::signals::schema::check_schema;
use crate::signals::trace::TraceAdapter;
use crate::signals::typecheck::{TypecheckAdapter, run_lint};
use crate::signals::vcs::GitAdapter;

/// Absolute locations of every document the auditor reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub state_file: PathBuf,
    pub latest_file: PathBuf,
    pub history_dir: PathBuf,
    pub activity_log: PathBuf,
    pub manifest: PathBuf,
    pub schema_document: PathBuf,
    pub trace_log: PathBuf,
}

impl WorkspacePaths {
    #[must_use]
    pub fn new(workspace: &Path, paths: &PathsConfig) -> Self {
        let root = resolve_absolute_path(workspace);
        let at = |configured: &Path| PathsConfig::resolve(&root, configured);
        Self {
            state_file: at(&paths.state_file),
            latest_file: at(&paths.latest_file),
            history_dir: at(&paths.history_dir),
            activity_log: at(&paths.activity_log),
            manifest: at(&paths.manifest),
            schema_document: at(&paths.schema_document),
            trace_log: at(&paths.trace_log),
            root,
        }
    }
}

/// Reusable auditor: compiled patterns and adapters for one configuration.
pub struct Auditor<'c> {
    config: &'c AuditConfig,
    patterns: LinePatternRegistry,
    typecheck: TypecheckAdapter,
    trace: TraceAdapter,
    mocks: MockTargetChecker,
}

/// Per-run mutable context, passed explicitly from stage to stage.
struct RunContext<'r> {
    paths: WorkspacePaths,
    log: &'r mut JsonlWriter,
    now: DateTime<Utc>,
    findings: Vec<Finding>,
}

impl RunContext<'_> {
    fn event(&mut self, entry: LogEntry) {
        self.log.write_entry(&entry.workspace(&self.paths.root));
    }

    fn stage_done(&mut self, stage: &str, count: usize, started: Instant) {
        self.event(
            LogEntry::new(EventType::StageComplete, Severity::Info)
                .stage(stage)
                .count(count)
                .duration(started.elapsed()),
        );
    }

    fn blocked(&mut self, stage: &str, err: &AuditError) {
        self.event(
            LogEntry::new(EventType::CollaboratorBlocked, Severity::Warning)
                .stage(stage)
                .error(err),
        );
    }
}

impl<'c> Auditor<'c> {
    pub fn new(config: &'c AuditConfig) -> Result<Self> {
        Ok(Self {
            config,
            patterns: LinePatternRegistry::new()?,
            typecheck: TypecheckAdapter::new(config.typecheck.clone())?,
            trace: TraceAdapter::new(config.trace.clone())?,
            mocks: MockTargetChecker::new(config.trace.exempt_segments.clone())?,
        })
    }

    #[must_use]
    pub fn paths(&self, workspace: &Path) -> WorkspacePaths {
        WorkspacePaths::new(workspace, &self.config.paths)
    }

    /// Audit `workspace`, logging to its own activity log.
    pub fn run(&self, workspace: &Path) -> RunResult {
        let paths = self.paths(workspace);
        let mut log = JsonlWriter::open(JsonlConfig::for_path(&paths.activity_log));
        self.run_with_log(workspace, &mut log)
    }

    pub fn run_with_log(&self, workspace: &Path, log: &mut JsonlWriter) -> RunResult {
        let started = Instant::now();
        let mut ctx = RunContext {
            paths: self.paths(workspace),
            log,
            now: Utc::now(),
            findings: Vec::new(),
        };
        ctx.event(LogEntry::new(EventType::AuditStart, Severity::Info));

        let previous = self.load_state(&mut ctx);

        let manifest_ok = self.check_manifest(&mut ctx);
        let schema_ok = self.check_schema(&mut ctx);
        let (files, results) = self.scan(&mut ctx);
        self.detect_duplicates(&mut ctx, &results);
        self.aged_comments(&mut ctx, &results);
        let unused = self.unused_check(&mut ctx);
        let lint_ok = self.lint(&mut ctx, unused.success);
        self.mock_targets(&mut ctx, &files);
        self.runtime_trace(&mut ctx, &results);
        let merge_commits = self.annotate_merges(&mut ctx);

        let unused_summary = UnusedCheckSummary {
            blocked: unused.blocked,
            unused_findings: unused.unused_findings,
        };
        let mut findings = std::mem::take(&mut ctx.findings);
        let next = apply_consecutive_counts(&previous, &mut findings, unused_summary);
        if let Err(err) = next.save(&ctx.paths.state_file) {
            ctx.event(
                LogEntry::new(EventType::StatePersistFailed, Severity::Warning)
                    .path(ctx.paths.state_file.display().to_string())
                    .error(&err),
            );
        }

        let gate_flags = GateFlags {
            lint_ok,
            manifest_ok,
            schema_ok,
            unused_clean_ok: next.unused_clean_streak >= UNUSED_CLEAN_STREAK_REQUIRED,
        };
        let result = RunResult {
            workspace: ctx.paths.root.display().to_string(),
            timestamp: ctx.now,
            merge_commits,
            summary: Summary::from_findings(&findings, files.len(), unused.blocked),
            status: RunResult::status_for(&gate_flags, &findings),
            gate_flags,
            findings,
        };

        self.persist(&mut ctx, &result);
        ctx.event(
            LogEntry::new(EventType::AuditComplete, Severity::Info)
                .count(result.summary.total_findings)
                .status(result.status.as_str())
                .duration(started.elapsed()),
        );
        ctx.log.flush();
        result
    }

    fn load_state(&self, ctx: &mut RunContext<'_>) -> AuditState {
        match AuditState::load(&ctx.paths.state_file) {
            Ok(state) => state,
            Err(err) => {
                ctx.event(
                    LogEntry::new(EventType::StatePersistFailed, Severity::Warning)
                        .stage("state_load")
                        .error(&err),
                );
                AuditState::default()
            }
        }
    }

    fn check_manifest(&self, ctx: &mut RunContext<'_>) -> bool {
        let started = Instant::now();
        let report = check_manifest(&ctx.paths.root, &ctx.paths.manifest);
        let ok = report.ok();
        ctx.stage_done("manifest", report.findings.len(), started);
        ctx.findings.extend(report.findings);
        ok
    }

    fn check_schema(&self, ctx: &mut RunContext<'_>) -> bool {
        let started = Instant::now();
        let report = check_schema(
            &ctx.paths.root,
            &ctx.paths.schema_document,
            &self.config.schema.required_keys,
        );
        let ok = report.ok();
        ctx.stage_done("schema", report.findings.len(), started);
        ctx.findings.extend(report.findings);
        ok
    }

    /// Walk and scan. Returns `(absolute, relative)` for every walked file
    /// and the successful scan results, both in walk order.
    fn scan(&self, ctx: &mut RunContext<'_>) -> (Vec<(PathBuf, String)>, Vec<ScanResult>) {
        let started = Instant::now();
        let scan = &self.config.scan;
        let walker = SourceWalker::new(WalkerConfig::new(
            ctx.paths.root.clone(),
            scan.extensions.iter().cloned(),
            PathFilter::new(scan.ignore_dirs.iter().cloned()),
        ));
        let paths = walker.walk();
        let scanner = StreamingScanner::new(&self.patterns, scan.chunk_size);
        let outcomes = scan_all(scanner, walker.root(), &paths, scan.parallelism);

        let mut files = Vec::with_capacity(paths.len());
        let mut results = Vec::with_capacity(outcomes.len());
        for (path, outcome) in paths.into_iter().zip(outcomes) {
            files.push((path, outcome.relative_path().to_string()));
            match outcome {
                ScanOutcome::Failed(failure) => {
                    ctx.event(
                        LogEntry::new(EventType::ScanError, Severity::Warning)
                            .path(failure.relative_path.clone())
                            .details(failure.error.clone()),
                    );
                    ctx.findings.push(Finding::new(
                        Category::ScanError,
                        failure.relative_path,
                        1,
                        format!("Unable to scan file: {}", failure.error),
                        Action::Verify,
                    ));
                }
                ScanOutcome::Scanned(result) => {
                    self.line_findings(ctx, &result);
                    results.push(result);
                }
            }
        }

        ctx.stage_done("scan", files.len(), started);
        (files, results)
    }

    fn line_findings(&self, ctx: &mut RunContext<'_>, result: &ScanResult) {
        let limit = self.config.scan.max_module_lines;
        if result.line_count > limit {
            ctx.findings.push(Finding::new(
                Category::LargeModule,
                result.relative_path.clone(),
                1,
                format!("Module exceeds {limit} lines ({}).", result.line_count),
                Action::Refactor,
            ));
        }
        for hit in &result.legacy_matches {
            ctx.findings.push(Finding::new(
                Category::LegacyPattern,
                result.relative_path.clone(),
                hit.line,
                format!("{} detected.", hit.pattern),
                Action::Refactor,
            ));
        }
    }

    fn detect_duplicates(&self, ctx: &mut RunContext<'_>, results: &[ScanResult]) {
        let started = Instant::now();
        let mut found = DuplicateDetector::new().detect(results).findings();

        let mut exports = ExportIndex::new();
        for result in results {
            exports.add(result);
        }
        found.extend(exports.findings());

        ctx.stage_done("duplicates", found.len(), started);
        ctx.findings.extend(found);
    }

    /// Keep commented-out lines whose last change is older than the threshold.
    /// Lines without a blame age are dropped.
    fn aged_comments(&self, ctx: &mut RunContext<'_>, results: &[ScanResult]) {
        let started = Instant::now();
        let git = GitAdapter::new(ctx.paths.root.clone(), self.config.vcs.clone());
        let threshold = self.config.scan.comment_age_days;

        let mut kept = 0;
        for result in results {
            for CommentedLine { line, text } in &result.commented_lines {
                let Some(age) = git.line_age_days(&result.relative_path, *line, ctx.now) else {
                    continue;
                };
                if exceeds_age(age, threshold) {
                    kept += 1;
                    ctx.findings.push(Finding::new(
                        Category::CommentedOut,
                        result.relative_path.clone(),
                        *line,
                        format!("Commented-out code older than {threshold} days: {text}"),
                        Action::Remove,
                    ));
                }
            }
        }
        ctx.stage_done("comments", kept, started);
    }

    fn unused_check(&self, ctx: &mut RunContext<'_>) -> UnusedOutcome {
        let started = Instant::now();
        let report = self.typecheck.run(&ctx.paths.root);
        if let Some(err) = &report.failure {
            ctx.blocked("typecheck", err);
        }
        let outcome = UnusedOutcome {
            blocked: report.status.is_blocked(),
            unused_findings: report.unused_count(),
            success: report.success,
        };
        ctx.stage_done("typecheck", report.findings.len(), started);
        ctx.findings.extend(report.findings);
        outcome
    }

    fn lint(&self, ctx: &mut RunContext<'_>, typecheck_ok: bool) -> bool {
        let started = Instant::now();
        let report = run_lint(&self.config.lint, &ctx.paths.root);
        if let Some(err) = &report.failure {
            ctx.blocked("lint", err);
        }
        ctx.stage_done("lint", report.findings.len(), started);
        ctx.findings.extend(report.findings);
        typecheck_ok && report.success.unwrap_or(true)
    }

    fn mock_targets(&self, ctx: &mut RunContext<'_>, files: &[(PathBuf, String)]) {
        let started = Instant::now();
        let found = self
            .mocks
            .check(files.iter().map(|(abs, rel)| (abs.as_path(), rel.as_str())));
        ctx.stage_done("mocks", found.len(), started);
        ctx.findings.extend(found);
    }

    fn runtime_trace(&self, ctx: &mut RunContext<'_>, results: &[ScanResult]) {
        let started = Instant::now();
        let report = self.trace.check(
            &ctx.paths.root,
            &ctx.paths.trace_log,
            results.iter().map(|r| r.relative_path.as_str()),
        );
        if !report.present {
            ctx.blocked(
                "trace",
                &AuditError::MalformedDocument {
                    path: ctx.paths.trace_log.clone(),
                    details: "trace log missing".to_string(),
                },
            );
        }
        ctx.stage_done("trace", report.findings.len(), started);
        ctx.findings.extend(report.findings);
    }

    fn annotate_merges(&self, ctx: &mut RunContext<'_>) -> Vec<String> {
        let started = Instant::now();
        let git = GitAdapter::new(ctx.paths.root.clone(), self.config.vcs.clone());
        let merges = git.recent_merges();
        let touched: BTreeSet<String> = git.merge_touched_paths(&merges);
        let mut count = 0;
        for finding in &mut ctx.findings {
            finding.merge_touched = touched.contains(&finding.file);
            count += usize::from(finding.merge_touched);
        }
        ctx.stage_done("merges", count, started);
        merges
    }

    fn persist(&self, ctx: &mut RunContext<'_>, result: &RunResult) {
        let latest = result.write_latest(&ctx.paths.latest_file);
        let history = result.write_history(&ctx.paths.history_dir).map(|_| ());
        for outcome in [latest, history] {
            if let Err(err) = outcome {
                ctx.event(
                    LogEntry::new(EventType::ResultPersistFailed, Severity::Warning).error(&err),
                );
            }
        }
    }
}

/// Strictly older than the threshold; a line exactly at the limit is kept.
#[allow(clippy::cast_precision_loss)]
fn exceeds_age(age_days: f64, threshold_days: u64) -> bool {
    age_days > threshold_days as f64
}

#[derive(Debug, Clone, Copy)]
struct UnusedOutcome {
    blocked: bool,
    unused_findings: usize,
    success: bool,
}
