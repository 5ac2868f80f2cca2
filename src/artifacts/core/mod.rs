//! Shared low-level utilities
//!
//! - `lockfile`: scoped lock-and-rename writes for files under `.rvs/`

pub mod lockfile;
