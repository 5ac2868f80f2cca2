//! Database entry types
//!
//! A database entry is the `(mode, oid)` pair a tree records for each of
//! its children.

pub mod database_entry;
