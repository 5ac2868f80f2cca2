use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeChangeType};
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::merge::merge_base::MergeBaseFinder;
use crate::artifacts::merge::tree_merge::{self, MergedTree};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RvsError;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

impl Repository {
    /// Join the target revision's history into HEAD: fast-forward when
    /// HEAD is the merge base, a two-parent merge commit otherwise.
    /// Conflicts leave markers in the working tree and stages 1/2/3 in
    /// the index, and the command exits unsuccessfully.
    pub fn merge(&self, target: &str) -> anyhow::Result<()> {
        let head_oid = self.refs().read_head()?.ok_or_else(|| {
            RvsError::Usage("merging is not possible because you have an unborn head".to_string())
        })?;

        let merge_oid = Revision::resolve_str(target, self).map_err(|_| {
            RvsError::Usage(format!("merge: {} - not something we can merge", target))
        })?;

        if merge_oid == head_oid {
            writeln!(self.writer(), "Already up to date.")?;
            return Ok(());
        }

        let database = self.database();
        let base = {
            let mut finder = MergeBaseFinder::new(|oid| database.load_slim_commit(oid));
            finder.find(&head_oid, &merge_oid)?
        };

        if base.as_ref() == Some(&merge_oid) {
            writeln!(self.writer(), "Already up to date.")?;
            return Ok(());
        }

        if base.as_ref() == Some(&head_oid) {
            return self.fast_forward(&head_oid, &merge_oid);
        }

        self.three_way_merge(&head_oid, &merge_oid, base.as_ref(), target)
    }

    fn fast_forward(&self, head_oid: &ObjectId, merge_oid: &ObjectId) -> anyhow::Result<()> {
        writeln!(
            self.writer(),
            "Updating {}..{}",
            head_oid.to_short_oid(),
            merge_oid.to_short_oid()
        )?;
        writeln!(self.writer(), "Fast-forward")?;

        self.migrate_worktree(Some(head_oid), Some(merge_oid), "merge")?;
        self.refs().update_head(merge_oid)
    }

    fn three_way_merge(
        &self,
        head_oid: &ObjectId,
        merge_oid: &ObjectId,
        base: Option<&ObjectId>,
        target: &str,
    ) -> anyhow::Result<()> {
        let base_tree = self.database().read_flat_tree(base)?;
        let ours_tree = self.database().read_flat_tree(Some(head_oid))?;
        let theirs_tree = self.database().read_flat_tree(Some(merge_oid))?;

        let merged = tree_merge::merge_trees(
            self.database(),
            &base_tree,
            &ours_tree,
            &theirs_tree,
        )?;

        // apply the clean part of the result like a checkout, so dirty
        // local files abort before anything is touched
        let changes = snapshot_changes(&ours_tree, &merged.entries);
        {
            let mut index = self.index_mut();
            index.rehydrate()?;

            let mut migration = Migration::new(self, &mut index, changes, "merge");
            migration.apply_changes()?;

            self.record_conflicts(&mut index, &merged)?;
            index.write_updates()?;
        }

        for message in &merged.messages {
            writeln!(self.writer(), "{}", message)?;
        }

        let message = merge_message(target);
        if !merged.is_clean() {
            std::fs::write(self.merge_head_path(), format!("{}\n", merge_oid))?;
            std::fs::write(self.merge_msg_path(), format!("{}\n", message))?;

            writeln!(
                self.writer(),
                "Automatic merge failed; fix conflicts and then commit the result."
            )?;
            anyhow::bail!(RvsError::MergeConflict);
        }

        let tree_oid = self.write_tree_from_entries(&merged.entries)?;
        let commit_oid = self.write_commit_over_tree(
            vec![head_oid.clone(), merge_oid.clone()],
            tree_oid,
            message,
        )?;
        self.refs().update_head(&commit_oid)?;

        writeln!(self.writer(), "Merge made by the 'recursive' strategy.")?;

        Ok(())
    }

    pub(crate) fn record_conflicts(
        &self,
        index: &mut crate::areas::index::Index,
        merged: &MergedTree,
    ) -> anyhow::Result<()> {
        for (path, content) in &merged.conflicted_files {
            let mode = merged.conflicts[path]
                .ours
                .as_ref()
                .or(merged.conflicts[path].theirs.as_ref())
                .map(|entry| entry.mode)
                .unwrap_or_default();
            self.workspace().write_file(path, content, mode)?;
        }

        for (path, conflict) in &merged.conflicts {
            let stage_entry = |entry: &Option<DatabaseEntry>| {
                entry.as_ref().map(|entry| {
                    IndexEntry::new(
                        path.clone(),
                        entry.oid.clone(),
                        0,
                        EntryMetadata {
                            mode: entry.mode,
                            ..Default::default()
                        },
                    )
                })
            };

            index.set_conflict(
                path,
                [
                    stage_entry(&conflict.base),
                    stage_entry(&conflict.ours),
                    stage_entry(&conflict.theirs),
                ],
            );
        }

        Ok(())
    }
}

/// Classify the transition between two flat snapshots as a change set.
pub(crate) fn snapshot_changes(
    old: &BTreeMap<PathBuf, DatabaseEntry>,
    new: &BTreeMap<PathBuf, DatabaseEntry>,
) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (path, old_entry) in old {
        match new.get(path) {
            None => {
                changes.insert(path.clone(), TreeChangeType::Deleted(old_entry.clone()));
            }
            Some(new_entry) if new_entry != old_entry => {
                changes.insert(
                    path.clone(),
                    TreeChangeType::Modified {
                        old: old_entry.clone(),
                        new: new_entry.clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }

    for (path, new_entry) in new {
        if !old.contains_key(path) {
            changes.insert(path.clone(), TreeChangeType::Added(new_entry.clone()));
        }
    }

    changes
}

fn merge_message(target: &str) -> String {
    format!("Merge branch '{}'", target)
}
