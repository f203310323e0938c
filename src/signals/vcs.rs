//! Version-control adapter backed by the `git` CLI.
//!
//! Every query is optional: a workspace that is not a repository, a missing
//! `git` binary, or a timeout all read as "no information".

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::config::VcsConfig;
use crate::core::paths::normalize_slash_path;
use crate::signals::process::{CommandOutcome, run_with_timeout};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone)]
pub struct GitAdapter {
    workspace: PathBuf,
    config: VcsConfig,
}

impl GitAdapter {
    pub fn new(workspace: impl Into<PathBuf>, config: VcsConfig) -> Self {
        Self {
            workspace: workspace.into(),
            config,
        }
    }

    /// Last-change time of one line, from `git blame --porcelain`.
    #[must_use]
    pub fn line_timestamp(&self, relative_file: &str, line: usize) -> Option<DateTime<Utc>> {
        let range = format!("{line},{line}");
        let output = self.git(&["blame", "--porcelain", "-L", &range, "--", relative_file])?;
        parse_author_time(&output)
    }

    /// Age of one line in fractional days, relative to `now`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn line_age_days(&self, relative_file: &str, line: usize, now: DateTime<Utc>) -> Option<f64> {
        let changed = self.line_timestamp(relative_file, line)?;
        let seconds = (now - changed).num_seconds();
        Some(seconds as f64 / SECONDS_PER_DAY)
    }

    /// Up to `merge_commit_limit` most recent merge commit hashes.
    #[must_use]
    pub fn recent_merges(&self) -> Vec<String> {
        let limit = self.config.merge_commit_limit.to_string();
        self.git(&["log", "--merges", "-n", &limit, "--format=%H"])
            .map(|out| parse_lines(&out).collect())
            .unwrap_or_default()
    }

    /// Paths changed between `commit` and `HEAD`, `/`-separated and relative
    /// to the workspace. Changes outside the workspace are not listed.
    #[must_use]
    pub fn changed_since(&self, commit: &str) -> BTreeSet<String> {
        self.git(&["diff", "--name-only", "--relative", commit, "HEAD"])
            .map(|out| parse_lines(&out).map(|p| normalize_slash_path(&p)).collect())
            .unwrap_or_default()
    }

    /// Union of paths touched by the recent merges: everything changed since
    /// each merge's first parent.
    #[must_use]
    pub fn merge_touched_paths(&self, merges: &[String]) -> BTreeSet<String> {
        merges
            .iter()
            .flat_map(|commit| self.changed_since(&format!("{commit}^1")))
            .collect()
    }

    fn git(&self, args: &[&str]) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("git".to_string());
        argv.extend(args.iter().map(ToString::to_string));
        match run_with_timeout(
            &argv,
            &self.workspace,
            Duration::from_secs(self.config.timeout_secs),
        ) {
            CommandOutcome::Completed {
                success: true,
                stdout,
                ..
            } => Some(stdout),
            _ => None,
        }
    }
}

/// `author-time <unix seconds>` from porcelain blame output.
#[must_use]
pub fn parse_author_time(porcelain: &str) -> Option<DateTime<Utc>> {
    porcelain
        .lines()
        .find_map(|line| line.strip_prefix("author-time "))
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn parse_lines(output: &str) -> impl Iterator<Item = String> + '_ {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
}
