use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::status::report::StatusReport;
use crate::errors::RvsError;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

impl Repository {
    /// Record the staged snapshot as a new commit and advance HEAD.
    ///
    /// Refused while conflicted index stages exist; a pending merge
    /// (`MERGE_HEAD`) contributes the second parent and is cleared on
    /// success.
    pub fn commit(&self, message: &str, allow_empty: bool) -> anyhow::Result<()> {
        let mut index = self.index_mut();
        index.rehydrate()?;

        if index.has_conflicts() {
            for path in index.conflict_paths() {
                eprintln!("U\t{}", path.display());
            }
            anyhow::bail!(RvsError::Usage(
                "Committing is not possible because you have unmerged files.".to_string()
            ));
        }

        let head = self.head_commit()?;
        let head_oid = head.as_ref().map(|(oid, _)| oid.clone());
        let pending_merge = self.pending_merge_head()?;

        let tree = Tree::build(index.staged_entries())?;
        let tree_oid = tree.object_id()?;

        let unchanged = head
            .as_ref()
            .is_some_and(|(_, commit)| commit.tree_oid() == &tree_oid)
            || (head.is_none() && index.is_empty());
        if unchanged && !allow_empty && pending_merge.is_none() {
            let report = StatusReport::gather(self, &index)?;
            report.print_long(&mut *self.writer())?;
            anyhow::bail!(RvsError::NothingToCommit);
        }

        self.database().store_tree(&tree)?;

        let mut parents = Vec::new();
        if let Some(oid) = &head_oid {
            parents.push(oid.clone());
        }
        if let Some(merge_oid) = &pending_merge {
            parents.push(merge_oid.clone());
        }

        let message = if message.is_empty() {
            std::fs::read_to_string(self.merge_msg_path()).unwrap_or_default()
        } else {
            message.to_string()
        };
        if message.trim().is_empty() {
            anyhow::bail!(RvsError::Usage("empty commit message".to_string()));
        }

        let commit = Commit::new(
            parents,
            tree_oid,
            Author::load_author_from_env(),
            Author::load_committer_from_env(),
            message.trim().to_string(),
        );
        let commit_oid = self.database().store(&commit)?;

        self.refs().update_head(&commit_oid)?;
        self.clear_pending_merge()?;

        let location = match self.refs().current_branch()? {
            Some(branch) => branch.to_string(),
            None => "detached HEAD".to_string(),
        };
        let root_marker = if head_oid.is_none() {
            " (root-commit)"
        } else {
            ""
        };
        writeln!(
            self.writer(),
            "[{}{} {}] {}",
            location,
            root_marker,
            commit_oid.to_short_oid(),
            commit.short_message()
        )?;

        Ok(())
    }

    /// Build and store a tree from flat snapshot entries.
    pub(crate) fn write_tree_from_entries(
        &self,
        entries: &BTreeMap<PathBuf, DatabaseEntry>,
    ) -> anyhow::Result<ObjectId> {
        let index_entries: Vec<IndexEntry> = entries
            .iter()
            .map(|(path, entry)| {
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
            .collect();

        let tree = Tree::build(index_entries.iter())?;
        self.database().store_tree(&tree)
    }

    /// Store a commit over an already-stored tree.
    pub(crate) fn write_commit_over_tree(
        &self,
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        message: String,
    ) -> anyhow::Result<ObjectId> {
        let commit = Commit::new(
            parents,
            tree_oid,
            Author::load_author_from_env(),
            Author::load_committer_from_env(),
            message,
        );
        self.database().store(&commit)
    }
}
