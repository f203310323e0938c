//! Audit engine: findings, cross-run state, run orchestration, and reports.

pub mod finding;
pub mod orchestrator;
pub mod report;
pub mod state;
