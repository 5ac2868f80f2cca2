//! Checkout conflict classification
//!
//! The four ways a checkout can clash with local state, with the
//! message blocks shown for each group.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConflictType {
    /// Local modifications to a tracked file would be overwritten.
    StaleFile,
    /// A directory with untracked content stands where changes land.
    StaleDirectory,
    /// An untracked file would be overwritten.
    UntrackedOverwritten,
    /// An untracked file would be removed.
    UntrackedRemoved,
}

pub struct ConflictMessage {
    pub header: &'static str,
    pub footer: &'static str,
}

impl ConflictType {
    /// Classify a conflicting path by what occupies it locally and what
    /// the checkout wants to do there.
    pub fn classify(
        stat: Option<&EntryMetadata>,
        entry: Option<&IndexEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> ConflictType {
        if entry.is_some() {
            ConflictType::StaleFile
        } else if stat.is_some_and(|s| s.mode.is_tree()) {
            ConflictType::StaleDirectory
        } else if new_entry.is_some() {
            ConflictType::UntrackedOverwritten
        } else {
            ConflictType::UntrackedRemoved
        }
    }
}

impl From<&ConflictType> for ConflictMessage {
    fn from(conflict_type: &ConflictType) -> Self {
        match conflict_type {
            ConflictType::StaleFile => ConflictMessage {
                header: "Your local changes to the following files would be overwritten by checkout:",
                footer: "Please commit your changes or stash them before you switch branches.",
            },
            ConflictType::StaleDirectory => ConflictMessage {
                header: "Updating the following directories would lose untracked files in them:",
                footer: "",
            },
            ConflictType::UntrackedOverwritten => ConflictMessage {
                header: "The following untracked working tree files would be overwritten by checkout:",
                footer: "Please move or remove them before you switch branches.",
            },
            ConflictType::UntrackedRemoved => ConflictMessage {
                header: "The following untracked working tree files would be removed by checkout:",
                footer: "Please move or remove them before you switch branches.",
            },
        }
    }
}
