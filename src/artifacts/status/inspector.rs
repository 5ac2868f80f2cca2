//! Change detection between the three views
//!
//! Working-file checks compare stat metadata first and fall back to
//! hashing content only when size and mode match but timestamps moved,
//! mirroring the fast path a real status needs. Index-vs-tree checks
//! compare recorded oids and modes directly.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use derive_new::new;
use std::path::Path;

#[derive(new)]
pub struct Inspector<'r> {
    repository: &'r Repository,
}

impl Inspector<'_> {
    /// A path is indirectly tracked when it, or anything under it, is
    /// in the index.
    pub fn is_indirectly_tracked(&self, path: &Path, index: &Index) -> anyhow::Result<bool> {
        if self.repository.workspace().file_exists(path) {
            return Ok(index.is_directly_tracked(path));
        }

        let children = self.repository.workspace().list_dir(Some(path))?;
        if children.is_empty() {
            return Ok(true);
        }

        for child in children {
            if self.is_indirectly_tracked(&child, index)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub fn check_index_against_workspace(
        &self,
        entry: Option<&IndexEntry>,
        stat: Option<&EntryMetadata>,
    ) -> anyhow::Result<WorkspaceChangeType> {
        match (entry, stat) {
            (None, _) => Ok(WorkspaceChangeType::Untracked),
            (Some(_), None) => Ok(WorkspaceChangeType::Deleted),
            (Some(entry), Some(stat)) if !entry.stat_match(stat) => {
                Ok(WorkspaceChangeType::Modified)
            }
            (Some(entry), Some(stat)) if entry.times_match(stat) => Ok(WorkspaceChangeType::None),
            (Some(entry), Some(_)) if self.is_content_changed(entry)? => {
                Ok(WorkspaceChangeType::Modified)
            }
            _ => Ok(WorkspaceChangeType::None),
        }
    }

    pub fn check_index_against_head_tree(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&DatabaseEntry>,
    ) -> IndexChangeType {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if head_entry.mode != index_entry.metadata.mode
                    || head_entry.oid != index_entry.oid =>
            {
                IndexChangeType::Modified
            }
            (Some(_), None) => IndexChangeType::Added,
            (None, Some(_)) => IndexChangeType::Deleted,
            _ => IndexChangeType::None,
        }
    }

    fn is_content_changed(&self, entry: &IndexEntry) -> anyhow::Result<bool> {
        let oid = self.repository.workspace().hash_file(&entry.path)?;
        Ok(oid != entry.oid)
    }
}
