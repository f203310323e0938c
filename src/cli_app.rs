//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use hygiene_audit::audit::finding::Finding;
use hygiene_audit::audit::orchestrator::Auditor;
use hygiene_audit::audit::report::{RunResult, RunStatus, list_history};
use hygiene_audit::audit::state::AuditState;
use hygiene_audit::core::config::AuditConfig;
use hygiene_audit::core::paths::resolve_absolute_path;
use hygiene_audit::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Code-hygiene auditor with cross-run finding state.
#[derive(Debug, Parser)]
#[command(
    name = "hygiene-audit",
    author,
    version,
    about = "Code-hygiene audit engine",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Audit one or more workspaces.
    Audit(AuditArgs),
    /// Print the persisted finding state of a workspace.
    State(WorkspaceArgs),
    /// List past run results of a workspace, newest first.
    History(HistoryArgs),
    /// Inspect or validate configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct AuditArgs {
    /// Workspace root to audit (repeatable).
    #[arg(long = "workspace", short = 'w', value_name = "PATH")]
    workspaces: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct WorkspaceArgs {
    /// Workspace root (defaults to the first configured workspace).
    #[arg(long, short = 'w', value_name = "PATH")]
    workspace: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct HistoryArgs {
    #[command(flatten)]
    target: WorkspaceArgs,
    /// Maximum entries to list.
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// At least one workspace needs attention.
    #[error("{0}")]
    NeedsAttention(String),
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NeedsAttention(_) => 1,
            Self::User(_) => 2,
            Self::Runtime(_) | Self::Io(_) => 3,
            Self::Json(_) => 4,
        }
    }
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Audit(args) => run_audit(cli, args),
        Command::State(args) => run_state(cli, args),
        Command::History(args) => run_history(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<AuditConfig, CliError> {
    AuditConfig::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))
}

/// Command line, then config (env already folded in), then the current directory.
fn resolve_workspaces(cli_workspaces: &[PathBuf], config: &AuditConfig) -> Vec<PathBuf> {
    let chosen = if !cli_workspaces.is_empty() {
        cli_workspaces.to_vec()
    } else if !config.workspaces.is_empty() {
        config.workspaces.clone()
    } else {
        vec![PathBuf::from(".")]
    };
    chosen.iter().map(|p| resolve_absolute_path(p)).collect()
}

fn single_workspace(arg: Option<&Path>, config: &AuditConfig) -> PathBuf {
    let explicit: Vec<PathBuf> = arg.map(Path::to_path_buf).into_iter().collect();
    resolve_workspaces(&explicit, config)
        .into_iter()
        .next()
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run_audit(cli: &Cli, args: &AuditArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let workspaces = resolve_workspaces(&args.workspaces, &config);
    let auditor = Auditor::new(&config).map_err(|e| CliError::Runtime(e.to_string()))?;
    let config_hash = config
        .stable_hash()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let mode = output_mode(cli);

    let missing: Vec<String> = workspaces
        .iter()
        .filter(|workspace| !workspace.is_dir())
        .map(|workspace| workspace.display().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CliError::User(format!(
            "workspace is not a directory: {}",
            missing.join(", ")
        )));
    }

    let mut results = Vec::with_capacity(workspaces.len());
    for workspace in &workspaces {
        let paths = auditor.paths(workspace);
        let mut log = JsonlWriter::open(JsonlConfig::for_path(&paths.activity_log));
        log.write_entry(
            &LogEntry::new(EventType::ConfigLoaded, Severity::Info)
                .workspace(workspace)
                .path(
                    config
                        .source
                        .as_ref()
                        .map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string()),
                )
                .details(format!("config_hash={config_hash}")),
        );
        let result = auditor.run_with_log(workspace, &mut log);
        if mode == OutputMode::Human {
            print_result_human(&result);
        }
        results.push(result);
    }

    if mode == OutputMode::Json {
        let payload = json!({
            "command": "audit",
            "results": serde_json::to_value(&results)?,
        });
        write_json_line(&payload)?;
    }

    let attention: Vec<&str> = results
        .iter()
        .filter(|r| !r.is_clean())
        .map(|r| r.workspace.as_str())
        .collect();
    if attention.is_empty() {
        Ok(())
    } else {
        Err(CliError::NeedsAttention(format!(
            "{} workspace(s) need attention: {}",
            attention.len(),
            attention.join(", ")
        )))
    }
}

fn print_result_human(result: &RunResult) {
    let status = match result.status {
        RunStatus::Clean => result.status.as_str().green().bold(),
        RunStatus::NeedsAttention => result.status.as_str().yellow().bold(),
    };
    println!("{} {}", "Workspace:".bold(), result.workspace);
    println!("  Status: {status}");
    println!(
        "  Files scanned: {}  Findings: {}  Auto-remove candidates: {}",
        result.summary.files_scanned,
        result.summary.total_findings,
        result.summary.auto_remove_candidates
    );
    let gate = |ok: bool| if ok { "ok".green() } else { "FAIL".red() };
    println!(
        "  Gates: lint {}  manifest {}  schema {}  unused-clean {}",
        gate(result.gate_flags.lint_ok),
        gate(result.gate_flags.manifest_ok),
        gate(result.gate_flags.schema_ok),
        gate(result.gate_flags.unused_clean_ok)
    );
    if result.summary.unused_check_blocked {
        println!("  {}", "Unused-symbol check was blocked.".yellow());
    }
    for finding in &result.findings {
        println!("  {}", format_finding(finding));
    }
}

fn format_finding(finding: &Finding) -> String {
    let mut line = format!(
        "[{}] {}:{} {} ({})",
        finding.category, finding.file, finding.line, finding.message, finding.action
    );
    if finding.consecutive_count > 1 {
        line.push_str(&format!(" x{}", finding.consecutive_count));
    }
    if finding.auto_remove_candidate {
        line.push_str(" auto-remove");
    }
    if finding.merge_touched {
        line.push_str(" merge-touched");
    }
    line
}

fn run_state(cli: &Cli, args: &WorkspaceArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let workspace = single_workspace(args.workspace.as_deref(), &config);
    let auditor = Auditor::new(&config).map_err(|e| CliError::Runtime(e.to_string()))?;
    let state_file = auditor.paths(&workspace).state_file;
    let state = AuditState::load(&state_file).map_err(|e| CliError::Runtime(e.to_string()))?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{} {}", "State:".bold(), state_file.display());
            println!("  Unused clean streak: {}", state.unused_clean_streak);
            println!("  Tracked signatures: {}", state.last_signatures.len());
            for signature in &state.last_signatures {
                let count = state.counts.get(signature).copied().unwrap_or(0);
                println!("  x{count} {signature}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "state",
                "path": state_file.to_string_lossy(),
                "state": serde_json::to_value(&state)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_history(cli: &Cli, args: &HistoryArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let workspace = single_workspace(args.target.workspace.as_deref(), &config);
    let auditor = Auditor::new(&config).map_err(|e| CliError::Runtime(e.to_string()))?;
    let history_dir = auditor.paths(&workspace).history_dir;
    let entries = list_history(&history_dir).map_err(|e| CliError::Runtime(e.to_string()))?;

    let mut rows = Vec::new();
    for path in entries.into_iter().take(args.limit) {
        let summary = match RunResult::load(&path) {
            Ok(Some(result)) => json!({
                "path": path.to_string_lossy(),
                "timestamp": result.timestamp.to_rfc3339(),
                "status": result.status.as_str(),
                "totalFindings": result.summary.total_findings,
            }),
            Ok(None) => continue,
            Err(e) => json!({
                "path": path.to_string_lossy(),
                "error": e.to_string(),
            }),
        };
        rows.push(summary);
    }

    match output_mode(cli) {
        OutputMode::Human => {
            if rows.is_empty() {
                println!("No audit history under {}", history_dir.display());
            }
            for row in &rows {
                if let Some(error) = row.get("error").and_then(Value::as_str) {
                    println!("  {} {}", "unreadable".red(), error);
                    continue;
                }
                println!(
                    "  {}  {:<16} {} findings",
                    row["timestamp"].as_str().unwrap_or_default(),
                    row["status"].as_str().unwrap_or_default(),
                    row["totalFindings"]
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "history",
                "workspace": workspace.to_string_lossy(),
                "entries": rows,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(AuditConfig::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match AuditConfig::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;
                let source = config
                    .source
                    .as_ref()
                    .map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string());

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {source}");
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": source,
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                            "code": e.code(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("HYG_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "hygiene-audit",
            "--config",
            "/tmp/hyg.toml",
            "--json",
            "--no-color",
            "audit",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["hygiene-audit", "audit", "--json", "--no-color"]);
        assert!(after.is_ok());
    }

    #[test]
    fn parses_every_subcommand() {
        let cases = [
            vec!["hygiene-audit", "audit", "--workspace", "a", "-w", "b"],
            vec!["hygiene-audit", "state", "--workspace", "a"],
            vec!["hygiene-audit", "history", "--limit", "3"],
            vec!["hygiene-audit", "config", "show"],
            vec!["hygiene-audit", "config", "validate"],
            vec!["hygiene-audit", "config", "path"],
            vec!["hygiene-audit", "completions", "bash"],
        ];
        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse case: {case:?}");
        }
    }

    #[test]
    fn repeated_workspace_flags_accumulate() {
        let cli = Cli::try_parse_from(["hygiene-audit", "audit", "-w", "one", "-w", "two"]).unwrap();
        let Command::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert_eq!(args.workspaces, vec![PathBuf::from("one"), PathBuf::from("two")]);
    }

    #[test]
    fn workspace_priority_is_cli_then_config_then_cwd() {
        let mut config = AuditConfig::default();
        config.workspaces = vec![PathBuf::from("/from/config")];

        let cli = resolve_workspaces(&[PathBuf::from("/from/cli")], &config);
        assert_eq!(cli, vec![PathBuf::from("/from/cli")]);

        let cfg = resolve_workspaces(&[], &config);
        assert_eq!(cfg, vec![PathBuf::from("/from/config")]);

        let cwd = resolve_workspaces(&[], &AuditConfig::default());
        assert_eq!(cwd.len(), 1);
        assert!(cwd[0].is_absolute());
    }

    #[test]
    fn exit_codes_separate_findings_from_failures() {
        assert_eq!(CliError::NeedsAttention(String::new()).exit_code(), 1);
        assert_eq!(CliError::User(String::new()).exit_code(), 2);
        assert_eq!(CliError::Runtime(String::new()).exit_code(), 3);
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(resolve_output_mode(true, Some("human"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("json"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("human"), false), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, Some("auto"), true), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }
}
