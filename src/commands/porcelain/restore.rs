use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::RvsError;
use std::path::{Path, PathBuf};

impl Repository {
    /// Restore paths without moving HEAD.
    ///
    /// Working-tree restores default their source to the index (HEAD
    /// when the index is empty); `--staged` restores the index from
    /// HEAD. An explicit `--source` overrides either.
    pub fn restore(
        &self,
        source: Option<&str>,
        staged: bool,
        paths: &[String],
    ) -> anyhow::Result<()> {
        if paths.is_empty() {
            anyhow::bail!(RvsError::Usage(
                "you must specify path(s) to restore".to_string()
            ));
        }

        let normalized = paths
            .iter()
            .map(|p| self.workspace().normalize_path(Path::new(p)))
            .collect::<anyhow::Result<Vec<PathBuf>>>()?;

        let mut index = self.index_mut();
        index.rehydrate()?;

        if staged {
            // index entries return to the source tree's state
            let source_oid = match source {
                Some(rev) => Revision::resolve_str(rev, self)?,
                None => Revision::resolve_str("HEAD", self)?,
            };
            let tree = self.database().read_flat_tree(Some(&source_oid))?;

            for path in &normalized {
                // paths under the spec currently staged
                for staged_path in index.entries_under_path(path) {
                    match tree.get(&staged_path) {
                        Some(entry) => {
                            index.add(IndexEntry::new(
                                staged_path.clone(),
                                entry.oid.clone(),
                                0,
                                Default::default(),
                            ))?;
                        }
                        None => index.remove(&staged_path),
                    }
                }
                // paths in the source tree not currently staged
                for (tree_path, entry) in tree.iter() {
                    if (tree_path == path || tree_path.starts_with(path))
                        && index.entry_by_path(tree_path).is_none()
                    {
                        index.add(IndexEntry::new(
                            tree_path.clone(),
                            entry.oid.clone(),
                            0,
                            Default::default(),
                        ))?;
                    }
                }
            }

            return index.write_updates();
        }

        // working tree restore
        let source_tree = match source {
            Some(rev) => {
                let oid = Revision::resolve_str(rev, self)?;
                Some(self.database().read_flat_tree(Some(&oid))?)
            }
            None if index.is_empty() => {
                let oid = Revision::resolve_str("HEAD", self)?;
                Some(self.database().read_flat_tree(Some(&oid))?)
            }
            None => None, // restore from the index itself
        };

        for path in &normalized {
            match &source_tree {
                Some(tree) => {
                    let matched: Vec<_> = tree
                        .iter()
                        .filter(|(p, _)| *p == path || p.starts_with(path))
                        .collect();
                    if matched.is_empty() {
                        anyhow::bail!(RvsError::Usage(format!(
                            "pathspec '{}' did not match any file(s)",
                            path.display()
                        )));
                    }

                    for (tree_path, entry) in matched {
                        let blob = self
                            .database()
                            .parse_object_as_blob(&entry.oid)?
                            .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;
                        self.workspace()
                            .write_file(tree_path, blob.content(), entry.mode)?;
                    }
                }
                None => {
                    let matched = index.entries_under_path(path);
                    if matched.is_empty() {
                        anyhow::bail!(RvsError::Usage(format!(
                            "pathspec '{}' did not match any file(s)",
                            path.display()
                        )));
                    }

                    for staged_path in matched {
                        let entry = index
                            .entry_by_path(&staged_path)
                            .ok_or_else(|| {
                                RvsError::Usage(format!(
                                    "path '{}' is unmerged",
                                    staged_path.display()
                                ))
                            })?
                            .clone();
                        let blob = self
                            .database()
                            .parse_object_as_blob(&entry.oid)?
                            .ok_or_else(|| anyhow::anyhow!("object {} is not a blob", entry.oid))?;
                        self.workspace().write_file(
                            &staged_path,
                            blob.content(),
                            entry.metadata.mode,
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}
