use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::RvsError;
use std::path::{Path, PathBuf};

impl Repository {
    /// Stage the given pathspecs: files are hashed into blobs and
    /// recorded in the index, directories recurse, and tracked paths
    /// missing from the working tree are staged as deletions.
    pub fn add(&self, pathspecs: &[String]) -> anyhow::Result<()> {
        let mut index = self.index_mut();
        index.rehydrate()?;

        for spec in pathspecs {
            if spec == "." {
                self.stage_tree_root(&mut index)?;
                continue;
            }

            let path = self.workspace().normalize_path(Path::new(spec))?;
            let full_path = self.workspace().root().join(&path);

            if full_path.is_file() {
                self.stage_file(&mut index, &path)?;
            } else if full_path.is_dir() {
                for file in self.workspace().list_files(Some(&path))? {
                    self.stage_file(&mut index, &file)?;
                }
            } else if index.is_directly_tracked(&path) {
                // a tracked path gone from the working tree stages its
                // deletion
                index.remove(&path);
            } else {
                anyhow::bail!(RvsError::Usage(format!(
                    "pathspec '{}' did not match any files",
                    spec
                )));
            }
        }

        index.write_updates()
    }

    /// `add .`: stage everything, including deletions of tracked
    /// files that vanished.
    fn stage_tree_root(&self, index: &mut Index) -> anyhow::Result<()> {
        let working_files = self.workspace().list_files(None)?;

        for file in &working_files {
            self.stage_file(index, file)?;
        }

        let working: std::collections::BTreeSet<&PathBuf> = working_files.iter().collect();
        for tracked in index.tracked_paths() {
            if !working.contains(&tracked) {
                index.remove(&tracked);
            }
        }

        Ok(())
    }

    fn stage_file(&self, index: &mut Index, path: &Path) -> anyhow::Result<()> {
        let stat = self.workspace().stat_file(path)?;

        // staging an unchanged file is a no-op
        if let Some(existing) = index.entry_by_path(path)
            && existing.stat_match(&stat)
            && existing.times_match(&stat)
        {
            return Ok(());
        }

        let content = self.workspace().read_file(path)?;
        let oid = self.database().store_blob(content)?;

        index.add(IndexEntry::new(path.to_path_buf(), oid, 0, stat))
    }
}
