//! Blocking subprocess execution with a wall-clock timeout.
//!
//! Collaborator commands are run once, never retried. Stdout and stderr are
//! drained on helper threads so a chatty child cannot block on a full pipe
//! while the caller polls for exit.

#![allow(missing_docs)]

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::errors::AuditError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How a collaborator command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The process exited on its own.
    Completed {
        success: bool,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// Killed after exceeding its timeout.
    TimedOut,
    /// The program could not be started.
    SpawnFailed { error: String },
}

impl CommandOutcome {
    /// Stdout followed by stderr, for parsers that do not care which stream.
    #[must_use]
    pub fn combined_output(&self) -> String {
        match self {
            Self::Completed { stdout, stderr, .. } => {
                let mut out = stdout.clone();
                if !stderr.is_empty() {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(stderr);
                }
                out
            }
            Self::TimedOut | Self::SpawnFailed { .. } => String::new(),
        }
    }

    /// The error behind an outcome that never completed.
    #[must_use]
    pub fn failure(&self, argv: &[String], timeout: Duration) -> Option<AuditError> {
        match self {
            Self::TimedOut => Some(AuditError::Timeout {
                command: argv.join(" "),
                timeout_secs: timeout.as_secs(),
            }),
            Self::SpawnFailed { error } => Some(AuditError::Collaborator {
                command: argv.join(" "),
                details: error.clone(),
            }),
            Self::Completed { .. } => None,
        }
    }
}

/// Run `argv` in `cwd`, waiting at most `timeout`.
pub fn run_with_timeout(argv: &[String], cwd: &Path, timeout: Duration) -> CommandOutcome {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutcome::SpawnFailed {
            error: "empty command".to_string(),
        };
    };

    let mut child = match Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            return CommandOutcome::SpawnFailed {
                error: err.to_string(),
            };
        }
    };

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) if Instant::now() >= deadline => break None,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(_) => break None,
        }
    };

    let Some(status) = status else {
        let _ = child.kill();
        let _ = child.wait();
        return CommandOutcome::TimedOut;
    };

    CommandOutcome::Completed {
        success: status.success(),
        code: status.code(),
        stdout: stdout.map(join_output).unwrap_or_default(),
        stderr: stderr.map(join_output).unwrap_or_default(),
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_output(handle: thread::JoinHandle<Vec<u8>>) -> String {
    handle
        .join()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
