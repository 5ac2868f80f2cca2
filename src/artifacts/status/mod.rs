//! Working tree status inspection
//!
//! - `file_change`: change classifications for the two comparisons
//! - `inspector`: stat-first change detection with content fallback
//! - `report`: the assembled three-set status of a worktree

pub mod file_change;
pub mod inspector;
pub mod report;
