use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    /// Print the sorted index paths.
    pub fn ls_files(&self) -> anyhow::Result<()> {
        let mut index = self.index_mut();
        index.rehydrate()?;

        let mut writer = self.writer();
        for path in index.tracked_paths() {
            writeln!(writer, "{}", path.display())?;
        }

        Ok(())
    }
}
