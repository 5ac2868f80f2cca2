//! Data structures and algorithms
//!
//! - `branch`: branch names and revision parsing
//! - `checkout`: migration planning and conflict detection
//! - `core`: shared utilities (lockfiles)
//! - `database`: database entry types
//! - `diff`: line and tree diffing
//! - `index`: staging area data structures
//! - `log`: history traversal
//! - `merge`: merge base, diff3 and tree merging
//! - `objects`: object model (blob, tree, commit)
//! - `stash`: the stash stack codec
//! - `status`: working tree status inspection

pub mod branch;
pub mod checkout;
pub mod core;
pub mod database;
pub mod diff;
pub mod index;
pub mod log;
pub mod merge;
pub mod objects;
pub mod stash;
pub mod status;
