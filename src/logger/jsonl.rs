//! JSONL activity log: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! concurrent `tail -f` never sees a partial line.
//!
//! Degradation chain, never failing the audit:
//! 1. primary file (`logs/audit-activity.jsonl` in the workspace)
//! 2. fallback file in the system temp dir
//! 3. stderr with a `[HYG-JSONL]` prefix
//! 4. silent discard

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{AuditError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

/// Audit lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ConfigLoaded,
    AuditStart,
    StageComplete,
    ScanError,
    CollaboratorBlocked,
    StatePersistFailed,
    ResultPersistFailed,
    AuditComplete,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp, millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Workspace-relative path of the file or document involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Audit stage name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Stage-specific count (files scanned, findings produced).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Run status on `audit_complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `HYG-xxxx` code when something failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Whether a later run could see a different outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            workspace: None,
            path: None,
            stage: None,
            count: None,
            duration_ms: None,
            status: None,
            error_code: None,
            retryable: None,
            details: None,
        }
    }

    #[must_use]
    pub fn workspace(mut self, workspace: &Path) -> Self {
        self.workspace = Some(workspace.display().to_string());
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn stage(mut self, stage: &str) -> Self {
        self.stage = Some(stage.to_string());
        self
    }

    #[must_use]
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count as u64);
        self
    }

    #[must_use]
    pub fn duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn error(mut self, err: &AuditError) -> Self {
        self.error_code = Some(err.code().to_string());
        self.retryable = Some(err.is_retryable());
        self.details = Some(err.to_string());
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Where lines go right now. Each failure moves one step down the chain.
#[derive(Debug)]
enum Sink {
    Primary(BufWriter<File>),
    Fallback(BufWriter<File>),
    Stderr,
    Discard,
}

impl Sink {
    fn file_backed(file: File, fallback: bool) -> Self {
        let writer = BufWriter::new(file);
        if fallback {
            Self::Fallback(writer)
        } else {
            Self::Primary(writer)
        }
    }

    fn file(&mut self) -> Option<&mut BufWriter<File>> {
        match self {
            Self::Primary(writer) | Self::Fallback(writer) => Some(writer),
            Self::Stderr | Self::Discard => None,
        }
    }
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Used when `path` cannot be opened or written.
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the file would exceed this size. Default: 10 MiB.
    pub max_size_bytes: u64,
    /// Rotated files kept beside the live one. Default: 5.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    /// Defaults for an activity log at `path`, falling back to the temp dir.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_path: Some(std::env::temp_dir().join("hygiene-audit-activity.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 5,
        }
    }
}

/// Append-only activity log for one audit invocation.
#[derive(Debug)]
pub struct JsonlWriter {
    config: JsonlConfig,
    sink: Sink,
    bytes_written: u64,
}

impl JsonlWriter {
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            sink: Sink::Discard,
            bytes_written: 0,
        };
        writer.attach(true);
        writer
    }

    /// A writer that drops everything.
    pub fn discard() -> Self {
        Self {
            config: JsonlConfig {
                path: PathBuf::new(),
                fallback_path: None,
                max_size_bytes: u64::MAX,
                max_rotated_files: 0,
            },
            sink: Sink::Discard,
            bytes_written: 0,
        }
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[HYG-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.sink.file() {
            let _ = writer.flush();
        }
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.sink.file().is_some() && self.bytes_written + len > self.config.max_size_bytes {
            self.rotate();
        }
        loop {
            match &mut self.sink {
                Sink::Primary(writer) | Sink::Fallback(writer) => {
                    if writer.write_all(line.as_bytes()).is_ok() {
                        self.bytes_written += len;
                        return;
                    }
                }
                Sink::Stderr => {
                    let _ = write!(io::stderr(), "[HYG-JSONL] {line}");
                    return;
                }
                Sink::Discard => return,
            }
            self.degrade();
        }
    }

    /// Point the sink at the first log file that opens, else stderr.
    fn attach(&mut self, primary_first: bool) {
        let primary = primary_first.then_some((&self.config.path, false));
        let fallback = self.config.fallback_path.as_ref().map(|path| (path, true));
        for (path, is_fallback) in primary.into_iter().chain(fallback) {
            if let Ok((file, size)) = open_append(path) {
                if is_fallback {
                    let _ = writeln!(
                        io::stderr(),
                        "[HYG-JSONL] activity log unavailable, using fallback: {}",
                        path.display()
                    );
                }
                self.sink = Sink::file_backed(file, is_fallback);
                self.bytes_written = size;
                return;
            }
        }
        let _ = writeln!(io::stderr(), "[HYG-JSONL] no writable log file, using stderr");
        self.sink = Sink::Stderr;
    }

    fn degrade(&mut self) {
        match self.sink {
            Sink::Primary(_) => self.attach(false),
            Sink::Fallback(_) => {
                let _ = writeln!(io::stderr(), "[HYG-JSONL] fallback write failed, using stderr");
                self.sink = Sink::Stderr;
            }
            Sink::Stderr | Sink::Discard => self.sink = Sink::Discard,
        }
    }

    /// `log.jsonl` becomes `log.jsonl.1`; older rotations shift up and the
    /// one past `max_rotated_files` is deleted.
    fn rotate(&mut self) {
        let (base, fallback) = match &self.sink {
            Sink::Primary(_) => (self.config.path.clone(), false),
            Sink::Fallback(_) => match &self.config.fallback_path {
                Some(path) => (path.clone(), true),
                None => return,
            },
            Sink::Stderr | Sink::Discard => return,
        };
        self.flush();
        self.sink = Sink::Discard;

        let keep = self.config.max_rotated_files;
        let _ = fs::remove_file(rotated_name(&base, keep));
        for index in (1..keep).rev() {
            let _ = fs::rename(rotated_name(&base, index), rotated_name(&base, index + 1));
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.sink = Sink::file_backed(file, fallback);
                self.bytes_written = 0;
            }
            Err(_) if fallback => self.sink = Sink::Stderr,
            Err(_) => self.attach(false),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Create parent directories and open `path` for append, with its size.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AuditError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| AuditError::io(path, source))?;
    let size = file.metadata().map_or(0, |m| m.len());
    Ok((file, size))
}

fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// RFC 3339, UTC, millisecond precision.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: PathBuf, max_size_bytes: u64) -> JsonlConfig {
        JsonlConfig {
            path,
            fallback_path: None,
            max_size_bytes,
            max_rotated_files: 3,
        }
    }

    #[test]
    fn write_entry_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone(), 1024 * 1024));

        let entry = LogEntry::new(EventType::AuditStart, Severity::Info)
            .workspace(Path::new("/repo"))
            .count(12);
        writer.write_entry(&entry);
        writer.flush();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "audit_start");
        assert_eq!(parsed["severity"], "info");
        assert_eq!(parsed["workspace"], "/repo");
        assert_eq!(parsed["count"], 12);
    }

    #[test]
    fn error_entries_carry_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("err.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone(), 1024 * 1024));

        let err = AuditError::Timeout {
            command: "npx tsc".to_string(),
            timeout_secs: 5,
        };
        writer.write_entry(
            &LogEntry::new(EventType::CollaboratorBlocked, Severity::Warning)
                .stage("typecheck")
                .error(&err),
        );
        writer.flush();

        let parsed: serde_json::Value =
            serde_json::from_str(fs::read_to_string(&path).unwrap().trim()).unwrap();
        assert_eq!(parsed["event"], "collaborator_blocked");
        assert_eq!(parsed["error_code"], "HYG-3003");
        assert_eq!(parsed["retryable"], true);
        assert_eq!(parsed["stage"], "typecheck");
    }

    #[test]
    fn rotation_shifts_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone(), 100));

        for _ in 0..10 {
            writer.write_entry(&LogEntry::new(EventType::StageComplete, Severity::Info));
        }
        writer.flush();

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        assert!(rotated_name(&path, 3).exists());
        assert!(!rotated_name(&path, 4).exists());
    }

    #[test]
    fn fallback_when_primary_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not dir").unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        let mut cfg = config(blocker.join("primary.jsonl"), 1024 * 1024);
        cfg.fallback_path = Some(fallback.clone());
        let mut writer = JsonlWriter::open(cfg);

        assert!(matches!(writer.sink, Sink::Fallback(_)));
        writer.write_entry(&LogEntry::new(EventType::StatePersistFailed, Severity::Warning));
        writer.flush();

        assert!(!fs::read_to_string(&fallback).unwrap().is_empty());
    }

    #[test]
    fn stderr_when_no_file_opens() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not dir").unwrap();
        let mut cfg = config(blocker.join("primary.jsonl"), 1024 * 1024);
        cfg.fallback_path = Some(blocker.join("fallback.jsonl"));
        let mut writer = JsonlWriter::open(cfg);

        assert!(matches!(writer.sink, Sink::Stderr));
        writer.write_entry(&LogEntry::new(EventType::AuditStart, Severity::Info));
        assert!(matches!(writer.sink, Sink::Stderr));
    }

    #[test]
    fn optional_fields_omitted_when_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone(), 1024 * 1024));
        writer.write_entry(&LogEntry::new(EventType::AuditComplete, Severity::Info));
        writer.flush();

        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"path\""));
        assert!(!line.contains("\"count\""));
    }

    #[test]
    fn discard_writer_is_silent() {
        let mut writer = JsonlWriter::discard();
        writer.write_entry(&LogEntry::new(EventType::AuditStart, Severity::Info));
        assert!(matches!(writer.sink, Sink::Discard));
    }
}
