//! Adapters over external signals: type checker, lint, version control, and
//! the workspace documents the auditor validates. Each adapter reports
//! findings or a blocked status; none of them return errors to the run.

#[cfg(test)]
pub(crate) mod git_fixture;
pub mod manifest;
pub mod mocks;
pub mod process;
pub mod schema;
pub mod trace;
pub mod typecheck;
pub mod vcs;
