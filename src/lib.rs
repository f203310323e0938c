#![forbid(unsafe_code)]

//! Hygiene Audit: a code-hygiene audit engine for polyglot workspaces.
//!
//! Each run walks a workspace, streams every source file through the line
//! classifiers, folds in the results of external collaborators (type checker,
//! linter, git), and produces a [`audit::report::RunResult`]. Findings carry a
//! consecutive-run count persisted between runs, so a workspace only turns
//! `CLEAN` once it has stayed clean.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use hygiene_audit::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use hygiene_audit::core::config::AuditConfig;
//! use hygiene_audit::audit::orchestrator::Auditor;
//! ```

pub mod prelude;

pub mod audit;
pub mod core;
pub mod logger;
pub mod scanner;
pub mod signals;
