//! Command implementations
//!
//! Commands are `impl Repository` blocks, one file per command, split
//! into two groups following the usual porcelain/plumbing divide:
//! user-facing workflow commands and low-level interrogators.

pub mod plumbing;
pub mod porcelain;
