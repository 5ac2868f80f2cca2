use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::merge::merge_base::MergeBaseFinder;
use crate::artifacts::merge::tree_merge;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RvsError;
use std::io::Write;

impl Repository {
    /// Reapply the commits between the merge base and HEAD on top of
    /// the upstream tip, then move the current branch there. History is
    /// linearized along first parents; a conflicting replay aborts
    /// before any ref or file is touched.
    pub fn rebase(&self, upstream: &str) -> anyhow::Result<()> {
        let head_oid = self
            .refs()
            .read_head()?
            .ok_or_else(|| RvsError::UnknownRev("HEAD".to_string()))?;
        let upstream_oid = Revision::resolve_str(upstream, self)?;

        let database = self.database();
        let base = {
            let mut finder = MergeBaseFinder::new(|oid| database.load_slim_commit(oid));
            finder.find(&head_oid, &upstream_oid)?
        };

        if base.as_ref() == Some(&upstream_oid) || head_oid == upstream_oid {
            writeln!(self.writer(), "Current branch is up to date.")?;
            return Ok(());
        }

        if base.as_ref() == Some(&head_oid) {
            // nothing of ours to replay, the branch just moves forward
            self.migrate_worktree(Some(&head_oid), Some(&upstream_oid), "rebase")?;
            self.refs().update_head(&upstream_oid)?;
            self.report_success(upstream)?;
            return Ok(());
        }

        let Some(base_oid) = base else {
            anyhow::bail!(RvsError::Usage(format!(
                "cannot rebase onto unrelated history '{}'",
                upstream
            )));
        };

        let to_replay = self.first_parent_chain(&head_oid, &base_oid)?;

        let mut new_tip = upstream_oid.clone();
        for (oid, commit) in to_replay.into_iter().rev() {
            new_tip = self.replay_commit(&oid, &commit, &new_tip)?;
        }

        self.migrate_worktree(Some(&head_oid), Some(&new_tip), "rebase")?;
        self.refs().update_head(&new_tip)?;
        self.report_success(upstream)?;

        Ok(())
    }

    /// Commits from HEAD down to (excluding) `base`, newest first,
    /// following first parents only.
    fn first_parent_chain(
        &self,
        head: &ObjectId,
        base: &ObjectId,
    ) -> anyhow::Result<Vec<(ObjectId, Commit)>> {
        let mut chain = Vec::new();
        let mut cursor = head.clone();

        while &cursor != base {
            let commit = self.database().load_commit(&cursor)?;
            let parent = commit.parent().cloned();
            chain.push((cursor, commit));

            match parent {
                Some(parent) => cursor = parent,
                None => anyhow::bail!(RvsError::Usage(
                    "cannot rebase: merge base is not on the first-parent chain".to_string()
                )),
            }
        }

        Ok(chain)
    }

    /// Replay one commit onto `onto`, keeping its author and message.
    fn replay_commit(
        &self,
        oid: &ObjectId,
        commit: &Commit,
        onto: &ObjectId,
    ) -> anyhow::Result<ObjectId> {
        let parent_tree = self.database().read_flat_tree(commit.parent())?;
        let onto_tree = self.database().read_flat_tree(Some(onto))?;
        let commit_tree = self.database().read_flat_tree(Some(oid))?;

        let merged =
            tree_merge::merge_trees(self.database(), &parent_tree, &onto_tree, &commit_tree)?;

        if !merged.is_clean() {
            for message in &merged.messages {
                eprintln!("{}", message);
            }
            anyhow::bail!(RvsError::Usage(format!(
                "could not apply {} ({}); rebase aborted",
                oid.to_short_oid(),
                commit.short_message()
            )));
        }

        let tree_oid = self.write_tree_from_entries(&merged.entries)?;
        let replayed = Commit::new(
            vec![onto.clone()],
            tree_oid,
            commit.author().clone(),
            commit.committer().clone(),
            commit.message().to_string(),
        );

        self.database().store(&replayed)
    }

    fn report_success(&self, upstream: &str) -> anyhow::Result<()> {
        match self.refs().current_branch()? {
            Some(branch) => writeln!(
                self.writer(),
                "Successfully rebased and updated refs/heads/{}.",
                branch
            )?,
            None => writeln!(self.writer(), "Successfully rebased onto {}.", upstream)?,
        }

        Ok(())
    }
}
