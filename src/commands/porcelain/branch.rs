use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::merge::merge_base::MergeBaseFinder;
use crate::errors::RvsError;
use std::io::Write;

impl Repository {
    /// List branches, marking the one HEAD points at.
    pub fn branch_list(&self) -> anyhow::Result<()> {
        let current = self.refs().current_branch()?;
        let mut writer = self.writer();

        for (branch, _) in self.refs().list_branches()? {
            let marker = if current.as_ref() == Some(&branch) {
                "* "
            } else {
                "  "
            };
            writeln!(writer, "{}{}", marker, branch)?;
        }

        Ok(())
    }

    /// Create a branch at HEAD or the given start point.
    pub fn branch_create(&self, name: &str, start_point: Option<&str>) -> anyhow::Result<()> {
        let branch = BranchName::try_parse(name.to_string())?;

        let oid = match start_point {
            Some(rev) => Revision::resolve_str(rev, self)?,
            None => self
                .refs()
                .read_head()?
                .ok_or_else(|| RvsError::Usage("not a valid object name: 'HEAD'".to_string()))?,
        };

        // branches may only point at commits
        self.database().load_commit(&oid)?;
        self.refs().create_branch(&branch, &oid, false)
    }

    /// Delete a branch; without `force`, refuse when its commits are
    /// not reachable from HEAD.
    pub fn branch_delete(&self, name: &str, force: bool) -> anyhow::Result<()> {
        let branch = BranchName::try_parse(name.to_string())?;

        if self.refs().current_branch()?.as_ref() == Some(&branch) {
            anyhow::bail!(RvsError::Usage(format!(
                "cannot delete branch '{}' checked out in this worktree",
                branch
            )));
        }

        if let Some(holder) = self.worktrees().branch_in_use(&branch, self.gitdir())? {
            anyhow::bail!(RvsError::Usage(format!(
                "cannot delete branch '{}' checked out at '{}'",
                branch,
                holder.display()
            )));
        }

        if !force {
            let branch_oid = self
                .refs()
                .read_branch(&branch)?
                .ok_or_else(|| anyhow::anyhow!("branch '{}' not found", branch))?;

            if let Some(head_oid) = self.refs().read_head()? {
                let database = self.database();
                let mut finder = MergeBaseFinder::new(|oid| database.load_slim_commit(oid));
                if !finder.is_ancestor(&branch_oid, &head_oid)? {
                    anyhow::bail!(RvsError::BranchNotFullyMerged(branch.to_string()));
                }
            }
        }

        let deleted = self.refs().delete_branch(&branch)?;
        writeln!(
            self.writer(),
            "Deleted branch {} (was {}).",
            branch,
            deleted.to_short_oid()
        )?;

        Ok(())
    }
}
