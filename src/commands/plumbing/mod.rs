//! Low-level interrogators

pub mod ls_files;
pub mod ls_tree;
