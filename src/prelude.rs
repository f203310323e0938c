//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use hygiene_audit::prelude::*;
//! ```

// Core
pub use crate::core::config::AuditConfig;
pub use crate::core::errors::{AuditError, Result};

// Scanner
pub use crate::scanner::duplicates::DuplicateDetector;
pub use crate::scanner::exports::ExportIndex;
pub use crate::scanner::patterns::LinePatternRegistry;
pub use crate::scanner::stream::{ScanOutcome, ScanResult, StreamingScanner};
pub use crate::scanner::walker::{SourceWalker, WalkerConfig};

// Signals
pub use crate::signals::typecheck::TypecheckAdapter;
pub use crate::signals::vcs::GitAdapter;

// Audit
pub use crate::audit::finding::{Action, Category, Finding};
pub use crate::audit::orchestrator::Auditor;
pub use crate::audit::report::{GateFlags, RunResult, RunStatus};
pub use crate::audit::state::AuditState;
