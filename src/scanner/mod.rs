//! Source scanner: path filter, walker, streaming line classification, and
//! cross-file duplicate detection.

pub mod duplicates;
pub mod exports;
pub mod filter;
pub mod patterns;
pub mod pool;
pub mod stream;
pub mod walker;
