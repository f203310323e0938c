#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_hygiene-audit") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "hygiene-audit.exe"
    } else {
        "hygiene-audit"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve hygiene-audit binary path for integration test"),
    }
}

/// Run the binary with a scrubbed environment and keep a transcript on disk.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("hygiene-audit-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env_remove("HYG_AUDIT_WORKSPACES")
        .env_remove("HYG_OUTPUT_FORMAT")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute hygiene-audit command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

pub fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, body).expect("write fixture");
}

/// Workspace whose manifest, state document, and runtime trace all agree with
/// `files`, plus a config pinning the type checker to `true` and disabling git.
pub struct Fixture {
    pub dir: TempDir,
    pub config: PathBuf,
}

/// Type checker that always passes, git disabled.
pub const QUIET_CONFIG: &str = "[typecheck]\ncommand = [\"true\"]\n\n[vcs]\nenabled = false\n";

impl Fixture {
    pub fn healthy(files: &[(&str, &str)]) -> Self {
        Self::with_config(files, QUIET_CONFIG)
    }

    pub fn with_config(files: &[(&str, &str)], config_toml: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let mut trace = String::new();
        let mut modules = Vec::new();
        for (rel, body) in files {
            write(dir.path(), rel, body);
            trace.push_str(&format!("loaded {rel}\n"));
            modules.push(format!("\"{rel}\""));
        }
        write(
            dir.path(),
            "module-manifest.json",
            &format!("{{\"modules\": [{}]}}", modules.join(", ")),
        );
        write(
            dir.path(),
            "memory/state.json",
            r#"{"schemaVersion": 1, "entries": [], "updatedAt": "2026-01-01"}"#,
        );
        write(dir.path(), "logs/runtime-trace.log", &trace);

        let config = dir.path().join("hygiene-audit.toml");
        fs::write(&config, config_toml).expect("write config");
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn audit(&self, case_name: &str) -> CmdResult {
        let config = self.config.to_string_lossy().to_string();
        let workspace = self.root().to_string_lossy().to_string();
        run_cli_case(
            case_name,
            &["--config", &config, "--json", "audit", "--workspace", &workspace],
        )
    }
}
