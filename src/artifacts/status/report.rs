//! Status assembly and rendering
//!
//! Builds the three sets a status shows: staged (index vs HEAD tree),
//! unstaged (working tree vs index) and untracked, plus unmerged paths
//! while a conflicted merge is in progress. Untracked directories are
//! reported as a whole (`dir/`) rather than file by file, and only when
//! they contain something.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::inspector::Inspector;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct StatusReport {
    pub branch: Option<BranchName>,
    pub head_oid: Option<ObjectId>,
    pub detached: bool,
    pub in_linked_worktree: bool,
    pub staged: BTreeMap<PathBuf, IndexChangeType>,
    pub unstaged: BTreeMap<PathBuf, WorkspaceChangeType>,
    /// Untracked entries in display form, directories with a trailing
    /// slash.
    pub untracked: BTreeSet<String>,
    pub conflicted: BTreeSet<PathBuf>,
}

impl StatusReport {
    pub fn gather(repository: &Repository, index: &Index) -> anyhow::Result<Self> {
        let inspector = Inspector::new(repository);
        let (branch, head_oid) = repository.refs().head()?;
        let detached = repository.refs().is_detached()?;

        let head_tree = repository.database().read_flat_tree(head_oid.as_ref())?;

        // index vs HEAD tree
        let mut staged = BTreeMap::new();
        let index_paths: BTreeSet<PathBuf> = index
            .staged_entries()
            .map(|entry| entry.path.clone())
            .collect();
        for path in index_paths.iter().chain(head_tree.keys()) {
            let change = inspector
                .check_index_against_head_tree(index.entry_by_path(path), head_tree.get(path));
            if change != IndexChangeType::None && !staged.contains_key(path) {
                staged.insert(path.clone(), change);
            }
        }

        // working tree vs index
        let mut unstaged = BTreeMap::new();
        for entry in index.staged_entries() {
            let stat = repository.workspace().stat_file(&entry.path).ok();
            let change =
                inspector.check_index_against_workspace(Some(entry), stat.as_ref())?;
            if change != WorkspaceChangeType::None {
                unstaged.insert(entry.path.clone(), change);
            }
        }

        // a conflicted path shows up as unmerged only, never in the
        // staged or unstaged sets
        let conflicted: BTreeSet<PathBuf> = index.conflict_paths().into_iter().collect();
        for path in &conflicted {
            staged.remove(path);
            unstaged.remove(path);
        }

        let mut untracked = BTreeSet::new();
        Self::scan_untracked(repository, index, None, &mut untracked)?;

        Ok(StatusReport {
            branch,
            head_oid,
            detached,
            in_linked_worktree: repository.is_linked_worktree(),
            staged,
            unstaged,
            untracked,
            conflicted,
        })
    }

    fn scan_untracked(
        repository: &Repository,
        index: &Index,
        prefix: Option<&Path>,
        untracked: &mut BTreeSet<String>,
    ) -> anyhow::Result<()> {
        for path in repository.workspace().list_dir(prefix)? {
            let is_dir = repository.workspace().root().join(&path).is_dir();

            if index.is_directly_tracked(&path) {
                if is_dir {
                    Self::scan_untracked(repository, index, Some(&path), untracked)?;
                }
                continue;
            }

            if is_dir {
                // a whole untracked directory is one entry, and only
                // when something is inside it
                if !repository.workspace().list_files(Some(&path))?.is_empty() {
                    untracked.insert(format!("{}/", path.display()));
                }
            } else {
                untracked.insert(path.display().to_string());
            }
        }

        Ok(())
    }

    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.unstaged.is_empty()
            && self.conflicted.is_empty()
            && self.untracked.is_empty()
    }

    pub fn has_changes_to_commit(&self) -> bool {
        !self.staged.is_empty()
    }

    fn headline(&self) -> String {
        if let Some(branch) = &self.branch {
            format!("On branch {}", branch)
        } else if self.detached && self.in_linked_worktree {
            "Not currently on any branch.".to_string()
        } else if let Some(oid) = &self.head_oid {
            format!("HEAD detached at {}", oid.to_short_oid())
        } else {
            "On branch main".to_string()
        }
    }

    pub fn print_long(&self, writer: &mut dyn Write) -> anyhow::Result<()> {
        writeln!(writer, "{}", self.headline())?;

        if self.head_oid.is_none() {
            writeln!(writer, "\nNo commits yet")?;
        }

        if !self.staged.is_empty() {
            writeln!(writer, "\nChanges to be committed:")?;
            writeln!(writer, "  (use \"rvs restore --staged <file>...\" to unstage)")?;
            for (path, change) in &self.staged {
                if let Some(label) = change.long_label() {
                    writeln!(writer, "\t{}   {}", label, path.display())?;
                }
            }
        }

        if !self.conflicted.is_empty() {
            writeln!(writer, "\nUnmerged paths:")?;
            writeln!(writer, "  (use \"rvs add <file>...\" to mark resolution)")?;
            for path in &self.conflicted {
                writeln!(writer, "\tboth modified:   {}", path.display())?;
            }
        }

        if !self.unstaged.is_empty() {
            writeln!(writer, "\nChanges not staged for commit:")?;
            writeln!(
                writer,
                "  (use \"rvs add <file>...\" to update what will be committed)"
            )?;
            writeln!(
                writer,
                "  (use \"rvs restore <file>...\" to discard changes in working directory)"
            )?;
            for (path, change) in &self.unstaged {
                if let Some(label) = change.long_label() {
                    writeln!(writer, "\t{}   {}", label, path.display())?;
                }
            }
        }

        if !self.untracked.is_empty() {
            writeln!(writer, "\nUntracked files:")?;
            writeln!(
                writer,
                "  (use \"rvs add <file>...\" to include in what will be committed)"
            )?;
            for entry in &self.untracked {
                writeln!(writer, "\t{}", entry)?;
            }
        }

        if self.staged.is_empty() && self.unstaged.is_empty() && self.conflicted.is_empty() {
            if !self.untracked.is_empty() {
                writeln!(
                    writer,
                    "\nnothing added to commit but untracked files present (use \"rvs add\" to track)"
                )?;
            } else if self.head_oid.is_some() {
                writeln!(writer, "\nnothing to commit, working tree clean")?;
            } else {
                writeln!(
                    writer,
                    "\nnothing to commit (create/copy files and use \"rvs add\" to track)"
                )?;
            }
        }

        Ok(())
    }

    pub fn print_short(&self, writer: &mut dyn Write) -> anyhow::Result<()> {
        let mut paths: BTreeSet<&PathBuf> =
            self.staged.keys().chain(self.unstaged.keys()).collect();
        for path in &self.conflicted {
            paths.remove(path);
        }

        for path in &self.conflicted {
            writeln!(writer, "UU {}", path.display())?;
        }

        for path in paths {
            let staged = self
                .staged
                .get(path)
                .map(|c| c.status_char())
                .unwrap_or(' ');
            let unstaged = self
                .unstaged
                .get(path)
                .map(|c| c.status_char())
                .unwrap_or(' ');
            writeln!(writer, "{}{} {}", staged, unstaged, path.display())?;
        }

        for entry in &self.untracked {
            writeln!(writer, "?? {}", entry)?;
        }

        Ok(())
    }
}
