//! Branch names and revision parsing
//!
//! - `branch_name`: validated branch names
//! - `revision`: the revision grammar (`HEAD`, branches, oids, `^`, `~N`)

pub mod branch_name;
pub mod revision;

/// First-parent notation, e.g. `HEAD^`.
pub const PARENT_REGEX: &str = r"^(.+)\^$";

/// Ancestor notation, e.g. `HEAD~3`.
pub const ANCESTOR_REGEX: &str = r"^(.+)~(\d+)$";

/// Expand a revision alias to its canonical spelling.
pub fn expand_alias(revision: &str) -> &str {
    match revision {
        "@" => "HEAD",
        other => other,
    }
}
