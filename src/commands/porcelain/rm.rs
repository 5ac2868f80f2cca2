use crate::areas::repository::Repository;
use crate::errors::RvsError;
use std::io::Write;
use std::path::{Path, PathBuf};

impl Repository {
    /// Remove paths from the index, and from the working tree unless
    /// `--cached`. Without `--force`, a working file whose content
    /// differs from the index is protected.
    pub fn rm(&self, paths: &[String], cached: bool, force: bool) -> anyhow::Result<()> {
        let mut index = self.index_mut();
        index.rehydrate()?;

        let mut to_remove: Vec<PathBuf> = Vec::new();
        for spec in paths {
            let path = self.workspace().normalize_path(Path::new(spec))?;
            let matched = index.entries_under_path(&path);

            if matched.is_empty() {
                anyhow::bail!(RvsError::Usage(format!(
                    "pathspec '{}' did not match any files",
                    spec
                )));
            }
            to_remove.extend(matched);
        }
        to_remove.dedup();

        if !force {
            for path in &to_remove {
                let Some(entry) = index.entry_by_path(path) else {
                    continue;
                };
                if self.workspace().file_exists(path)
                    && self.workspace().hash_file(path)? != entry.oid
                {
                    anyhow::bail!(RvsError::Usage(format!(
                        "'{}' has local modifications\n(use --cached to keep the file, or -f to force removal)",
                        path.display()
                    )));
                }
            }
        }

        for path in &to_remove {
            index.remove(path);
            if !cached {
                self.workspace().remove_file(path)?;
            }
            writeln!(self.writer(), "rm '{}'", path.display())?;
        }

        index.write_updates()
    }
}
