//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AuditError, Result};
use crate::scanner::filter::DEFAULT_IGNORED_SEGMENTS;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "hygiene-audit.toml";

/// Env var holding a `;`-separated workspace list.
pub const WORKSPACES_ENV: &str = "HYG_AUDIT_WORKSPACES";

/// Full auditor configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AuditConfig {
    /// Workspace roots audited when none are given on the command line.
    pub workspaces: Vec<PathBuf>,
    pub scan: ScanConfig,
    pub typecheck: TypecheckConfig,
    pub lint: LintConfig,
    pub vcs: VcsConfig,
    pub schema: SchemaConfig,
    pub trace: TraceConfig,
    pub paths: PathsConfig,
    /// Path the config was loaded from (not serialized back).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// File discovery and line-scan knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Recognized source extensions, with leading dot.
    pub extensions: Vec<String>,
    /// Directory names pruned anywhere in the tree.
    pub ignore_dirs: Vec<String>,
    pub max_module_lines: usize,
    pub comment_age_days: u64,
    /// Read size for the streaming scanner.
    pub chunk_size: usize,
    /// Scan worker threads.
    pub parallelism: usize,
}

/// Type-checker invocation used for unused-symbol diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TypecheckConfig {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Diagnostic codes mapped to `unused` findings.
    pub unused_codes: Vec<String>,
    pub timeout_secs: u64,
}

/// Optional lint command folded into the lint gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LintConfig {
    /// Empty means no separate lint step.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

/// Version-control query limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VcsConfig {
    pub enabled: bool,
    pub merge_commit_limit: usize,
    pub timeout_secs: u64,
}

/// Required keys of the persisted state document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchemaConfig {
    pub required_keys: Vec<String>,
}

/// Runtime-trace reference check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TraceConfig {
    /// Path segments whose files are never flagged as unreferenced.
    pub exempt_segments: Vec<String>,
}

/// Workspace-relative document locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub log_dir: PathBuf,
    pub state_file: PathBuf,
    pub latest_file: PathBuf,
    pub history_dir: PathBuf,
    pub activity_log: PathBuf,
    pub manifest: PathBuf,
    pub schema_document: PathBuf,
    pub trace_log: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: [".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            ignore_dirs: DEFAULT_IGNORED_SEGMENTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_module_lines: 300,
            comment_age_days: 14,
            chunk_size: 64 * 1024,
            parallelism: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
                .min(8),
        }
    }
}

impl Default for TypecheckConfig {
    fn default() -> Self {
        Self {
            command: ["npx", "tsc", "--noEmit", "--pretty", "false"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            unused_codes: vec!["TS6133".to_string(), "TS6196".to_string()],
            timeout_secs: 300,
        }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            merge_commit_limit: 5,
            timeout_secs: 30,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            required_keys: vec![
                "schemaVersion".to_string(),
                "entries".to_string(),
                "updatedAt".to_string(),
            ],
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            exempt_segments: vec!["tests".to_string(), "__tests__".to_string()],
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let logs = PathBuf::from("logs");
        Self {
            state_file: logs.join("continuous-audit-state.json"),
            latest_file: logs.join("continuous-audit-latest.json"),
            history_dir: logs.join("audit-history"),
            activity_log: logs.join("audit-activity.jsonl"),
            trace_log: logs.join("runtime-trace.log"),
            log_dir: logs,
            manifest: PathBuf::from("module-manifest.json"),
            schema_document: PathBuf::from("memory").join("state.json"),
        }
    }
}

impl PathsConfig {
    /// Resolve a configured path against a workspace root.
    #[must_use]
    pub fn resolve(workspace: &Path, configured: &Path) -> PathBuf {
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            workspace.join(configured)
        }
    }
}

impl AuditConfig {
    /// Default configuration path: `hygiene-audit.toml` in the current directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |name| env::var(name).ok())
    }

    /// Same as [`AuditConfig::load`] with an injectable env lookup.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| AuditError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let mut parsed: Self = toml::from_str(&raw)?;
            parsed.source = Some(path_buf);
            parsed
        } else if is_explicit_path {
            return Err(AuditError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(lookup)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = get("HYG_MAX_MODULE_LINES") {
            self.scan.max_module_lines = parse_env("HYG_MAX_MODULE_LINES", &raw)?;
        }
        if let Some(raw) = get("HYG_COMMENT_AGE_DAYS") {
            self.scan.comment_age_days = parse_env("HYG_COMMENT_AGE_DAYS", &raw)?;
        }
        if let Some(raw) = get("HYG_CHUNK_SIZE") {
            self.scan.chunk_size = parse_env("HYG_CHUNK_SIZE", &raw)?;
        }
        if let Some(raw) = get("HYG_PARALLELISM") {
            self.scan.parallelism = parse_env("HYG_PARALLELISM", &raw)?;
        }
        if let Some(raw) = get("HYG_TYPECHECK_TIMEOUT_SECS") {
            self.typecheck.timeout_secs = parse_env("HYG_TYPECHECK_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("HYG_VCS_TIMEOUT_SECS") {
            self.vcs.timeout_secs = parse_env("HYG_VCS_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("HYG_VCS_ENABLED") {
            self.vcs.enabled = parse_env("HYG_VCS_ENABLED", &raw)?;
        }
        if let Some(raw) = get(WORKSPACES_ENV) {
            self.workspaces = split_workspace_list(&raw);
        }
        Ok(())
    }

    fn normalize(&mut self) {
        for ext in &mut self.scan.extensions {
            let trimmed = ext.trim();
            *ext = if trimmed.starts_with('.') {
                trimmed.to_string()
            } else {
                format!(".{trimmed}")
            };
        }
        self.scan.extensions.sort();
        self.scan.extensions.dedup();
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.extensions.is_empty() {
            return Err(AuditError::InvalidConfig {
                details: "scan.extensions must not be empty".to_string(),
            });
        }
        for (name, value) in [
            ("scan.max_module_lines", self.scan.max_module_lines),
            ("scan.chunk_size", self.scan.chunk_size),
            ("scan.parallelism", self.scan.parallelism),
        ] {
            if value == 0 {
                return Err(AuditError::InvalidConfig {
                    details: format!("{name} must be > 0"),
                });
            }
        }
        if self.typecheck.command.is_empty() {
            return Err(AuditError::InvalidConfig {
                details: "typecheck.command must name a program".to_string(),
            });
        }
        if self.typecheck.unused_codes.is_empty() {
            return Err(AuditError::InvalidConfig {
                details: "typecheck.unused_codes must not be empty".to_string(),
            });
        }
        for (name, value) in [
            ("typecheck.timeout_secs", self.typecheck.timeout_secs),
            ("lint.timeout_secs", self.lint.timeout_secs),
            ("vcs.timeout_secs", self.vcs.timeout_secs),
        ] {
            if value == 0 {
                return Err(AuditError::InvalidConfig {
                    details: format!("{name} must be > 0"),
                });
            }
        }
        Ok(())
    }
}

/// Split a `;`-separated workspace list, dropping blank entries.
#[must_use]
pub fn split_workspace_list(raw: &str) -> Vec<PathBuf> {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| AuditError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
