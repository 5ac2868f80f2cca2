//! History traversal
//!
//! - `rev_list`: commit-date ordered walk from a set of tips

pub mod rev_list;
