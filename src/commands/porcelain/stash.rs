use crate::areas::repository::Repository;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::merge::tree_merge::{self, MergedTree};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::stash::StashStack;
use crate::artifacts::status::report::StatusReport;
use crate::errors::RvsError;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

impl Repository {
    /// Capture index and working tree as a pair of commits parented on
    /// HEAD, push them onto the stash stack and restore the worktree to
    /// HEAD's state.
    pub fn stash_push(&self, message: Option<&str>) -> anyhow::Result<()> {
        let (head_oid, head_commit) = self.head_commit()?.ok_or_else(|| {
            RvsError::Usage("you do not have the initial commit yet".to_string())
        })?;
        let head_tree = self
            .database()
            .read_flat_tree(Some(&head_oid))?;

        let (index_entries, worktree_entries) = {
            let mut index = self.index_mut();
            index.rehydrate()?;

            if index.has_conflicts() {
                anyhow::bail!(RvsError::Usage(
                    "cannot stash with unmerged files".to_string()
                ));
            }

            let index_entries: BTreeMap<PathBuf, DatabaseEntry> = index
                .staged_entries()
                .map(|entry| {
                    (
                        entry.path.clone(),
                        DatabaseEntry::new(entry.oid.clone(), entry.metadata.mode),
                    )
                })
                .collect();

            // current content of every tracked file still on disk
            let mut worktree_entries = BTreeMap::new();
            for entry in index.staged_entries() {
                if !self.workspace().file_exists(&entry.path) {
                    continue;
                }
                let content = self.workspace().read_file(&entry.path)?;
                let oid = self.database().store_blob(content)?;
                let stat = self.workspace().stat_file(&entry.path)?;
                worktree_entries.insert(
                    entry.path.clone(),
                    DatabaseEntry::new(oid, stat.mode),
                );
            }

            (index_entries, worktree_entries)
        };

        if index_entries == head_tree && worktree_entries == head_tree {
            writeln!(self.writer(), "No local changes to save")?;
            return Ok(());
        }

        let location = match self.refs().current_branch()? {
            Some(branch) => branch.to_string(),
            None => format!("(no branch) {}", head_oid.to_short_oid()),
        };
        let head_label = format!(
            "{} {}",
            head_oid.to_short_oid(),
            head_commit.short_message()
        );

        let index_tree = self.write_tree_from_entries(&index_entries)?;
        let index_commit = self.write_commit_over_tree(
            vec![head_oid.clone()],
            index_tree,
            format!("index on {}: {}", location, head_label),
        )?;

        let stash_message = match message {
            Some(message) => format!("On {}: {}", location, message),
            None => format!("WIP on {}: {}", location, head_label),
        };
        let worktree_tree = self.write_tree_from_entries(&worktree_entries)?;
        let stash_commit = self.write_commit_over_tree(
            vec![head_oid.clone(), index_commit],
            worktree_tree,
            stash_message.clone(),
        )?;

        let mut stack = StashStack::load(self.commondir())?;
        stack.push(stash_commit, stash_message.clone());
        stack.save()?;

        // back to a clean checkout of HEAD
        self.materialize_tree_hard(&head_oid)?;

        writeln!(
            self.writer(),
            "Saved working directory and index state {}",
            stash_message
        )?;

        Ok(())
    }

    pub fn stash_list(&self) -> anyhow::Result<()> {
        let stack = StashStack::load(self.commondir())?;
        let mut writer = self.writer();

        for (position, entry) in stack.entries().iter().enumerate() {
            writeln!(writer, "stash@{{{}}}: {}", position, entry.message)?;
        }

        Ok(())
    }

    /// Replay a stash onto the current HEAD as a three-way merge,
    /// leaving the reinstated changes unstaged.
    pub fn stash_apply(&self, position: usize) -> anyhow::Result<()> {
        let stack = StashStack::load(self.commondir())?;
        let entry = stack.get(position).ok_or_else(|| {
            RvsError::Usage(format!("stash@{{{}}} does not exist", position))
        })?;

        let merged = self.replay_stash(&entry.oid)?;

        if !merged.is_clean() {
            for message in &merged.messages {
                writeln!(self.writer(), "{}", message)?;
            }
            anyhow::bail!(RvsError::MergeConflict);
        }

        let mut index = self.index_mut();
        index.rehydrate()?;
        let report = StatusReport::gather(self, &index)?;
        drop(index);
        report.print_long(&mut *self.writer())?;

        Ok(())
    }

    pub fn stash_pop(&self, position: usize) -> anyhow::Result<()> {
        self.stash_apply(position)?;

        let mut stack = StashStack::load(self.commondir())?;
        let dropped = stack
            .drop_entry(position)
            .ok_or_else(|| RvsError::Usage(format!("stash@{{{}}} does not exist", position)))?;
        stack.save()?;

        writeln!(
            self.writer(),
            "Dropped refs/stash@{{{}}} ({})",
            position,
            dropped.oid
        )?;

        Ok(())
    }

    pub fn stash_drop(&self, position: usize) -> anyhow::Result<()> {
        let mut stack = StashStack::load(self.commondir())?;
        let dropped = stack
            .drop_entry(position)
            .ok_or_else(|| RvsError::Usage(format!("stash@{{{}}} does not exist", position)))?;
        stack.save()?;

        writeln!(
            self.writer(),
            "Dropped stash@{{{}}} ({})",
            position,
            dropped.oid
        )?;

        Ok(())
    }

    fn replay_stash(&self, stash_oid: &ObjectId) -> anyhow::Result<MergedTree> {
        let stash_commit = self.database().load_commit(stash_oid)?;
        let stash_base = stash_commit
            .parent()
            .ok_or_else(|| RvsError::RepositoryCorrupt("stash commit has no parent".to_string()))?
            .clone();

        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| RvsError::UnknownRev("HEAD".to_string()))?;

        let base_tree = self.database().read_flat_tree(Some(&stash_base))?;
        let ours_tree = self.database().read_flat_tree(Some(&head_oid))?;
        let theirs_tree = self.database().read_flat_tree(Some(stash_oid))?;

        let merged =
            tree_merge::merge_trees(self.database(), &base_tree, &ours_tree, &theirs_tree)?;

        let changes = super::merge::snapshot_changes(&ours_tree, &merged.entries);
        let touched: Vec<PathBuf> = changes.keys().cloned().collect();

        {
            let mut index = self.index_mut();
            index.rehydrate()?;

            let mut migration = Migration::new(self, &mut index, changes, "stash apply");
            migration.apply_changes()?;

            // the reinstated changes stay unstaged: index entries of the
            // touched paths return to HEAD's snapshot
            for path in &touched {
                match ours_tree.get(path) {
                    Some(entry) => {
                        index.add(IndexEntry::new(
                            path.clone(),
                            entry.oid.clone(),
                            0,
                            EntryMetadata {
                                mode: entry.mode,
                                ..Default::default()
                            },
                        ))?;
                    }
                    None => index.remove(path),
                }
            }

            if !merged.is_clean() {
                self.record_conflicts(&mut index, &merged)?;
            }

            index.write_updates()?;
        }

        Ok(merged)
    }
}
