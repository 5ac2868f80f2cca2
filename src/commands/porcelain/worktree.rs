use crate::areas::refs::RefValue;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::RvsError;
use std::io::Write;
use std::path::{Path, PathBuf};

impl Repository {
    /// Create a linked worktree at `path`, checked out at the given
    /// start point (HEAD by default). A branch start point not held by
    /// another worktree is checked out symbolically, anything else
    /// detaches.
    pub fn worktree_add(&self, path: &str, start_point: Option<&str>) -> anyhow::Result<()> {
        let worktree_root = self.absolute_worktree_path(path);

        if worktree_root.exists()
            && worktree_root
                .read_dir()
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(true)
        {
            anyhow::bail!(RvsError::WorktreeExists(worktree_root));
        }

        // pick the HEAD shape for the new worktree
        let branch = match start_point {
            Some(name) => BranchName::try_parse(name.to_string())
                .ok()
                .filter(|branch| self.refs().branch_exists(branch)),
            None => self.refs().current_branch()?,
        };

        let (head_value, start_oid, label) = match branch {
            Some(branch) if self.worktrees().branch_in_use(&branch, Path::new(""))?.is_none() => {
                let oid = self
                    .refs()
                    .read_branch(&branch)?
                    .ok_or_else(|| RvsError::UnknownRev(branch.to_string()))?;
                (
                    RefValue::Symbolic(format!("refs/heads/{}", branch)),
                    oid,
                    format!("(branch '{}')", branch),
                )
            }
            _ => {
                let rev = start_point.unwrap_or("HEAD");
                let oid = Revision::resolve_str(rev, self)?;
                self.database().load_commit(&oid)?;
                (
                    RefValue::Direct(oid.clone()),
                    oid.clone(),
                    format!("(detached HEAD {})", oid.to_short_oid()),
                )
            }
        };

        std::fs::create_dir_all(&worktree_root)?;
        let metadata_dir = self.worktrees().register(&worktree_root, head_value)?;

        // materialize the start point and give the worktree a matching
        // index
        let tree = self.database().read_flat_tree(Some(&start_oid))?;
        let mut index = crate::areas::index::Index::new(
            metadata_dir.join("index").into_boxed_path(),
        );
        let workspace =
            crate::areas::workspace::Workspace::new(worktree_root.clone().into_boxed_path());

        for (tree_path, entry) in &tree {
            let blob = self
                .database()
                .parse_object_as_blob(&entry.oid)?
                .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;
            workspace.write_file(tree_path, blob.content(), entry.mode)?;

            let stat = workspace.stat_file(tree_path)?;
            index.add(IndexEntry::new(
                tree_path.clone(),
                entry.oid.clone(),
                0,
                stat,
            ))?;
        }
        index.write_updates()?;

        writeln!(
            self.writer(),
            "Preparing worktree {}",
            label
        )?;
        writeln!(
            self.writer(),
            "HEAD is now at {} {}",
            start_oid.to_short_oid(),
            self.database().load_commit(&start_oid)?.short_message()
        )?;

        Ok(())
    }

    pub fn worktree_list(&self) -> anyhow::Result<()> {
        let mut writer = self.writer();

        // the main worktree first
        let main_root = self
            .commondir()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let main_refs = crate::areas::refs::Refs::new(
            self.commondir().to_path_buf().into_boxed_path(),
            self.commondir().to_path_buf().into_boxed_path(),
        );
        let (main_branch, main_oid) = main_refs.head()?;
        writeln!(
            writer,
            "{}  {} {}",
            main_root.display(),
            main_oid
                .as_ref()
                .map(|oid| oid.to_short_oid())
                .unwrap_or_else(|| "0000000".to_string()),
            main_branch
                .map(|branch| format!("[{}]", branch))
                .unwrap_or_else(|| "(detached HEAD)".to_string()),
        )?;

        for info in self.worktrees().list()? {
            let mut line = format!(
                "{}  {} {}",
                info.path.display(),
                info.head_oid
                    .as_ref()
                    .map(|oid| oid.to_short_oid())
                    .unwrap_or_else(|| "0000000".to_string()),
                info.branch
                    .map(|branch| format!("[{}]", branch))
                    .unwrap_or_else(|| "(detached HEAD)".to_string()),
            );
            if info.locked {
                line.push_str(" locked");
            }
            writeln!(writer, "{}", line)?;
        }

        Ok(())
    }

    pub fn worktree_remove(&self, path: &str, force: bool) -> anyhow::Result<()> {
        let worktree_root = self.absolute_worktree_path(path);
        self.worktrees().remove(&worktree_root, force)
    }

    pub fn worktree_lock(&self, path: &str, reason: Option<&str>) -> anyhow::Result<()> {
        let worktree_root = self.absolute_worktree_path(path);
        self.worktrees().lock(&worktree_root, reason)
    }

    pub fn worktree_unlock(&self, path: &str) -> anyhow::Result<()> {
        let worktree_root = self.absolute_worktree_path(path);

        if !self.worktrees().unlock(&worktree_root)? {
            writeln!(
                self.writer(),
                "Worktree '{}' is not locked",
                worktree_root.display()
            )?;
        }

        Ok(())
    }

    pub fn worktree_prune(&self) -> anyhow::Result<()> {
        let pruned = self.worktrees().prune()?;
        let mut writer = self.writer();

        for path in pruned {
            writeln!(writer, "Pruning worktree {}", path.display())?;
        }

        Ok(())
    }

    fn absolute_worktree_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| self.path().to_path_buf())
                .join(path)
        }
    }
}
