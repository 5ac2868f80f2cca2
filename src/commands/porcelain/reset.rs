use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Move HEAD only.
    Soft,
    /// Move HEAD and rewrite the index to the target tree.
    Mixed,
    /// Move HEAD, rewrite the index and materialize the target tree.
    Hard,
}

impl Repository {
    pub fn reset(&self, mode: ResetMode, rev: &str) -> anyhow::Result<()> {
        let target = Revision::resolve_str(rev, self)?;

        match mode {
            ResetMode::Soft => {}
            ResetMode::Mixed => self.rebuild_index_from(&target)?,
            ResetMode::Hard => self.materialize_tree_hard(&target)?,
        }

        self.refs().update_head(&target)?;
        self.clear_pending_merge()?;

        if mode == ResetMode::Hard {
            let commit = self.database().load_commit(&target)?;
            writeln!(
                self.writer(),
                "HEAD is now at {} {}",
                target.to_short_oid(),
                commit.short_message()
            )?;
        }

        Ok(())
    }

    /// Rewrite the index to the target's tree without touching the
    /// working tree.
    pub(crate) fn rebuild_index_from(&self, target: &ObjectId) -> anyhow::Result<()> {
        let target_tree = self.database().read_flat_tree(Some(target))?;

        let mut index = self.index_mut();
        index.rehydrate()?;
        index.clear_in_memory();

        for (path, entry) in &target_tree {
            let stat = self
                .workspace()
                .stat_file(path)
                .unwrap_or_else(|_| EntryMetadata {
                    mode: entry.mode,
                    ..Default::default()
                });
            index.add(IndexEntry::new(path.clone(), entry.oid.clone(), 0, stat))?;
        }

        index.write_updates()
    }

    /// Force working tree and index to the target's tree: tracked files
    /// absent from the target vanish, target files overwrite whatever is
    /// in the way. The index is rewritten only after the tree is fully
    /// on disk.
    pub(crate) fn materialize_tree_hard(&self, target: &ObjectId) -> anyhow::Result<()> {
        let target_tree = self.database().read_flat_tree(Some(target))?;

        {
            let mut index = self.index_mut();
            index.rehydrate()?;

            for path in index.tracked_paths() {
                if !target_tree.contains_key(&path) {
                    self.workspace().remove_file(&path)?;
                }
            }
        }

        for (path, entry) in &target_tree {
            let blob = self
                .database()
                .parse_object_as_blob(&entry.oid)?
                .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;
            self.workspace().write_file(path, blob.content(), entry.mode)?;
        }

        self.rebuild_index_from(target)
    }
}
