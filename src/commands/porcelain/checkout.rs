use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RvsError;
use std::io::Write;
use std::path::Path;

const DETACHMENT_NOTICE: &str = r#"You are in 'detached HEAD' state. You can look around, make experimental
changes and commit them, and you can discard any commits you make in this
state without impacting any branches by switching back to a branch.

If you want to create a new branch to retain commits you create, you may
do so (now or later) by using the branch command:

    rvs branch <new-branch-name>
"#;

impl Repository {
    /// Switch to a branch or revision: a branch name moves HEAD
    /// symbolically, anything else detaches. Refuses to lose local
    /// changes and refuses branches checked out in another worktree.
    pub fn checkout(&self, target: &str) -> anyhow::Result<()> {
        if let Ok(branch) = BranchName::try_parse(target.to_string())
            && self.refs().branch_exists(&branch)
        {
            return self.checkout_branch(&branch, false);
        }

        let oid = Revision::resolve_str(target, self)?;
        self.checkout_detached(&oid, target)
    }

    /// `-b`/`-B`: create a branch (optionally from a start point) and
    /// switch to it.
    pub fn checkout_new_branch(
        &self,
        name: &str,
        start_point: Option<&str>,
        force: bool,
    ) -> anyhow::Result<()> {
        let branch = BranchName::try_parse(name.to_string())?;
        let start_oid = match start_point {
            Some(rev) => Some(Revision::resolve_str(rev, self)?),
            None => self.refs().read_head()?,
        };

        match &start_oid {
            Some(oid) => self.refs().create_branch(&branch, oid, force)?,
            None => anyhow::bail!(RvsError::UnknownRev("HEAD".to_string())),
        }

        self.switch_to_branch(&branch)?;
        writeln!(self.writer(), "Switched to a new branch '{}'", branch)?;

        Ok(())
    }

    /// `--detach <rev>`.
    pub fn checkout_detach(&self, rev: &str) -> anyhow::Result<()> {
        let oid = Revision::resolve_str(rev, self)?;
        self.checkout_detached(&oid, rev)
    }

    /// `checkout <rev> -- <paths>`: restore paths from the revision's
    /// tree into working tree and index without moving HEAD.
    pub fn checkout_paths(&self, rev: Option<&str>, paths: &[String]) -> anyhow::Result<()> {
        if paths.is_empty() {
            anyhow::bail!(RvsError::Usage("no paths specified".to_string()));
        }

        let source = match rev {
            Some(rev) => Revision::resolve_str(rev, self)?,
            None => Revision::resolve_str("HEAD", self)?,
        };
        let source_tree = self.database().read_flat_tree(Some(&source))?;

        let mut index = self.index_mut();
        index.rehydrate()?;

        for spec in paths {
            let path = self.workspace().normalize_path(Path::new(spec))?;
            let matched: Vec<_> = source_tree
                .iter()
                .filter(|(tree_path, _)| *tree_path == &path || tree_path.starts_with(&path))
                .collect();

            if matched.is_empty() {
                anyhow::bail!(RvsError::Usage(format!(
                    "pathspec '{}' did not match any file(s) known to rvs",
                    spec
                )));
            }

            for (tree_path, entry) in matched {
                let blob = self
                    .database()
                    .parse_object_as_blob(&entry.oid)?
                    .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;
                self.workspace()
                    .write_file(tree_path, blob.content(), entry.mode)?;

                let stat = self.workspace().stat_file(tree_path)?;
                index.add(IndexEntry::new(
                    tree_path.clone(),
                    entry.oid.clone(),
                    0,
                    stat,
                ))?;
            }
        }

        index.write_updates()
    }

    pub(crate) fn checkout_branch(&self, branch: &BranchName, quiet: bool) -> anyhow::Result<()> {
        if self.refs().current_branch()?.as_ref() == Some(branch) {
            if !quiet {
                writeln!(self.writer(), "Already on '{}'", branch)?;
            }
            return Ok(());
        }

        // one worktree per branch
        if let Some(holder) = self.worktrees().branch_in_use(branch, self.gitdir())? {
            anyhow::bail!(RvsError::Usage(format!(
                "'{}' is already checked out at '{}'",
                branch,
                holder.display()
            )));
        }

        self.switch_to_branch(branch)?;
        if !quiet {
            writeln!(self.writer(), "Switched to branch '{}'", branch)?;
        }

        Ok(())
    }

    fn switch_to_branch(&self, branch: &BranchName) -> anyhow::Result<()> {
        let current_oid = self.refs().read_head()?;
        let target_oid = self.refs().read_branch(branch)?;

        self.migrate_worktree(current_oid.as_ref(), target_oid.as_ref(), "checkout")?;
        self.refs().set_head_to_branch(branch)?;

        Ok(())
    }

    fn checkout_detached(&self, oid: &ObjectId, target: &str) -> anyhow::Result<()> {
        // only commits may be checked out
        self.database().load_commit(oid)?;

        let was_detached = self.refs().is_detached()?;
        let current_oid = self.refs().read_head()?;

        self.migrate_worktree(current_oid.as_ref(), Some(oid), "checkout")?;
        self.refs().set_head_detached(oid)?;

        if !was_detached {
            eprintln!("Note: switching to '{}'.\n\n{}", target, DETACHMENT_NOTICE);
        }

        let commit = self.database().load_commit(oid)?;
        writeln!(
            self.writer(),
            "HEAD is now at {} {}",
            oid.to_short_oid(),
            commit.short_message()
        )?;

        Ok(())
    }

    /// Apply the tree transition `current → target` to working tree and
    /// index, refusing when local changes would be lost.
    pub(crate) fn migrate_worktree(
        &self,
        current: Option<&ObjectId>,
        target: Option<&ObjectId>,
        operation: &'static str,
    ) -> anyhow::Result<()> {
        let mut index = self.index_mut();
        index.rehydrate()?;

        let mut diff = TreeDiff::new(self.database());
        diff.compare_oids(current, target)?;

        let mut migration = Migration::new(self, &mut index, diff.into_changes(), operation);
        migration.apply_changes()?;

        index.write_updates()
    }
}
