//! Checkout planning and execution
//!
//! Switching snapshots is planned before anything is touched: the tree
//! diff becomes a set of file actions, local modifications that would
//! be lost turn into conflicts, and only a conflict-free plan is
//! applied to the working tree and index.

pub mod conflict;
pub mod migration;
