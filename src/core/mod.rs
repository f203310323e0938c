//! Core infrastructure: configuration, errors, paths, persistence.

pub mod config;
pub mod errors;
pub mod paths;
pub mod persist;
