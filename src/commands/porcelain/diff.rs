use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::diff::diff_target::{DiffTarget, PatchFormatter};
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::status::file_change::WorkspaceChangeType;
use crate::artifacts::status::inspector::Inspector;
use std::path::{Path, PathBuf};

impl Repository {
    /// Show changes between views:
    /// - no arguments: working tree vs index
    /// - `--cached`: index vs HEAD tree
    /// - `<rev>`: working tree vs that revision's tree
    pub fn diff(
        &self,
        cached: bool,
        rev: Option<&str>,
        paths: &[String],
    ) -> anyhow::Result<()> {
        let mut index = self.index_mut();
        index.rehydrate()?;

        let filters = paths
            .iter()
            .map(|p| self.workspace().normalize_path(Path::new(p)))
            .collect::<anyhow::Result<Vec<PathBuf>>>()?;

        let formatter = PatchFormatter::new(self.database());

        if cached {
            // index vs HEAD tree
            let head_tree = self.database().read_flat_tree(self.head_tree_oid()?.as_ref())?;

            let mut paths: Vec<PathBuf> = index
                .staged_entries()
                .map(|e| e.path.clone())
                .chain(head_tree.keys().cloned())
                .collect();
            paths.sort();
            paths.dedup();

            for path in paths.iter().filter(|p| matches_filters(p, &filters)) {
                let a = match head_tree.get(path) {
                    Some(entry) => {
                        DiffTarget::from_database_entry(self.database(), path, entry)?
                    }
                    None => DiffTarget::absent(path),
                };
                let b = match index.entry_by_path(path) {
                    Some(entry) => DiffTarget::from_index_entry(self.database(), entry)?,
                    None => DiffTarget::absent(path),
                };
                formatter.print_file_diff(&mut *self.writer(), &a, &b)?;
            }

            return Ok(());
        }

        if let Some(rev) = rev {
            // revision tree vs working tree
            let oid = Revision::resolve_str(rev, self)?;
            let rev_tree = self.database().read_flat_tree(Some(&oid))?;

            let mut paths: Vec<PathBuf> = rev_tree
                .keys()
                .cloned()
                .chain(index.staged_entries().map(|e| e.path.clone()))
                .collect();
            paths.sort();
            paths.dedup();

            for path in paths.iter().filter(|p| matches_filters(p, &filters)) {
                let a = match rev_tree.get(path) {
                    Some(entry) => {
                        DiffTarget::from_database_entry(self.database(), path, entry)?
                    }
                    None => DiffTarget::absent(path),
                };
                let b = if self.workspace().file_exists(path) {
                    DiffTarget::from_working_file(self.workspace(), path)?
                } else {
                    DiffTarget::absent(path)
                };
                formatter.print_file_diff(&mut *self.writer(), &a, &b)?;
            }

            return Ok(());
        }

        // index vs working tree
        let inspector = Inspector::new(self);
        for entry in index.staged_entries() {
            if !matches_filters(&entry.path, &filters) {
                continue;
            }

            let stat = self.workspace().stat_file(&entry.path).ok();
            let change = inspector.check_index_against_workspace(Some(entry), stat.as_ref())?;
            if change == WorkspaceChangeType::None {
                continue;
            }

            let a = DiffTarget::from_index_entry(self.database(), entry)?;
            let b = match change {
                WorkspaceChangeType::Deleted => DiffTarget::absent(&entry.path),
                _ => DiffTarget::from_working_file(self.workspace(), &entry.path)?,
            };
            formatter.print_file_diff(&mut *self.writer(), &a, &b)?;
        }

        Ok(())
    }

    /// Emit the tree-diff stream of a commit against its first parent.
    pub fn diff_tree(
        &self,
        rev: &str,
        recursive: bool,
        name_status: bool,
        no_commit_id: bool,
    ) -> anyhow::Result<()> {
        use std::io::Write;

        let oid = Revision::resolve_str(rev, self)?;
        let commit = self.database().load_commit(&oid)?;

        if !no_commit_id {
            writeln!(self.writer(), "{}", oid)?;
        }

        let parent_tree = match commit.parent() {
            Some(parent) => Some(self.database().load_commit(parent)?.tree_oid().clone()),
            None => None,
        };

        let mut diff = TreeDiff::new(self.database());
        diff.compare_oids(parent_tree.as_ref(), Some(commit.tree_oid()))?;
        let changes = diff.into_changes();

        // without -r only the top level is listed, subtree changes
        // collapsing onto their directory
        let changes = if recursive {
            changes
        } else {
            let mut collapsed = std::collections::BTreeMap::new();
            for (path, change) in changes {
                match path.components().count() {
                    1 => {
                        collapsed.insert(path, change);
                    }
                    _ => {
                        let top: PathBuf = path.components().take(1).collect();
                        collapsed
                            .entry(top)
                            .or_insert(crate::artifacts::diff::tree_diff::TreeChangeType::Modified {
                                old: change.old_entry().cloned().unwrap_or_else(|| {
                                    change.new_entry().cloned().expect("change has a side")
                                }),
                                new: change.new_entry().cloned().unwrap_or_else(|| {
                                    change.old_entry().cloned().expect("change has a side")
                                }),
                            });
                    }
                }
            }
            collapsed
        };

        let mut writer = self.writer();
        if name_status {
            PatchFormatter::print_name_status(&mut *writer, &changes)?;
        } else {
            for (path, change) in &changes {
                let old_mode = change
                    .old_entry()
                    .map(|e| e.mode.as_padded_str().to_string())
                    .unwrap_or_else(|| "000000".to_string());
                let new_mode = change
                    .new_entry()
                    .map(|e| e.mode.as_padded_str().to_string())
                    .unwrap_or_else(|| "000000".to_string());
                let old_oid = change
                    .old_entry()
                    .map(|e| e.oid.to_string())
                    .unwrap_or_else(|| "0".repeat(40));
                let new_oid = change
                    .new_entry()
                    .map(|e| e.oid.to_string())
                    .unwrap_or_else(|| "0".repeat(40));

                writeln!(
                    writer,
                    ":{} {} {} {} {}\t{}",
                    old_mode,
                    new_mode,
                    old_oid,
                    new_oid,
                    change.status_char(),
                    path.display()
                )?;
            }
        }

        Ok(())
    }
}

fn matches_filters(path: &Path, filters: &[PathBuf]) -> bool {
    filters.is_empty()
        || filters
            .iter()
            .any(|filter| path == filter || path.starts_with(filter))
}
