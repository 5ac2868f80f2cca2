use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::RvsError;
use std::path::Path;

impl Repository {
    /// Rename a tracked file in the working tree and the index.
    pub fn mv(&self, source: &str, destination: &str) -> anyhow::Result<()> {
        let source_path = self.workspace().normalize_path(Path::new(source))?;
        let destination_path = self.workspace().normalize_path(Path::new(destination))?;

        let mut index = self.index_mut();
        index.rehydrate()?;

        let entry = index
            .entry_by_path(&source_path)
            .ok_or_else(|| {
                RvsError::Usage(format!("not under version control, source={}", source))
            })?
            .clone();

        if !self.workspace().file_exists(&source_path) {
            anyhow::bail!(RvsError::Usage(format!("bad source, source={}", source)));
        }
        if self.workspace().file_exists(&destination_path)
            || index.is_directly_tracked(&destination_path)
        {
            anyhow::bail!(RvsError::Usage(format!(
                "destination exists, source={}, destination={}",
                source, destination
            )));
        }

        let content = self.workspace().read_file(&source_path)?;
        self.workspace()
            .write_file(&destination_path, &content, entry.metadata.mode)?;
        self.workspace().remove_file(&source_path)?;

        index.remove(&source_path);
        let stat = self.workspace().stat_file(&destination_path)?;
        index.add(IndexEntry::new(
            destination_path,
            entry.oid.clone(),
            0,
            stat,
        ))?;

        index.write_updates()
    }
}
