use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::diff::diff_target::PatchFormatter;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeDiff};
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

/// Presentation of a tree-diff stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffFormat {
    Patch,
    NameOnly,
    NameStatus,
    Stat,
}

impl Repository {
    /// Show a commit: header plus its diff against the first parent
    /// (the empty tree for a root commit).
    pub fn show(&self, rev: &str, format: DiffFormat) -> anyhow::Result<()> {
        let oid = Revision::resolve_str(rev, self)?;
        let commit = self.database().load_commit(&oid)?;

        {
            let mut writer = self.writer();
            writeln!(writer, "commit {}", oid)?;
            if commit.is_merge() {
                let parents = commit
                    .parents()
                    .iter()
                    .map(|p| p.to_short_oid())
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(writer, "Merge: {}", parents)?;
            }
            writeln!(writer, "Author: {}", commit.author().display_name())?;
            writeln!(writer, "Date:   {}", commit.author().readable_timestamp())?;
            writeln!(writer)?;
            for line in commit.message().lines() {
                writeln!(writer, "    {}", line)?;
            }
            writeln!(writer)?;
        }

        let changes = self.diff_against_first_parent(&oid)?;
        self.print_change_set(&changes, format)
    }

    pub(crate) fn diff_against_first_parent(&self, oid: &ObjectId) -> anyhow::Result<ChangeSet> {
        let commit = self.database().load_commit(oid)?;
        let parent_tree = match commit.parent() {
            Some(parent) => Some(self.database().load_commit(parent)?.tree_oid().clone()),
            None => None,
        };

        let mut diff = TreeDiff::new(self.database());
        diff.compare_oids(parent_tree.as_ref(), Some(commit.tree_oid()))?;

        Ok(diff.into_changes())
    }

    pub(crate) fn print_change_set(
        &self,
        changes: &ChangeSet,
        format: DiffFormat,
    ) -> anyhow::Result<()> {
        let formatter = PatchFormatter::new(self.database());
        let mut writer = self.writer();

        match format {
            DiffFormat::Patch => formatter.print_changes(&mut *writer, changes),
            DiffFormat::NameOnly => PatchFormatter::print_name_only(&mut *writer, changes),
            DiffFormat::NameStatus => PatchFormatter::print_name_status(&mut *writer, changes),
            DiffFormat::Stat => formatter.print_stat(&mut *writer, changes),
        }
    }
}
