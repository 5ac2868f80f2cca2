use crate::areas::repository::Repository;
use std::io::Write;
use std::path::Path;

const DEFAULT_CONFIG: &str = "[core]\n\
\trepositoryformatversion = 0\n\
\tfilemode = true\n\
\tbare = false\n\
\tlogallrefupdates = true\n";

const DEFAULT_DESCRIPTION: &str =
    "Unnamed repository; edit this file 'description' to name the repository.\n";

impl Repository {
    /// Create an empty repository at `root`, or report the existing one.
    pub fn init_at(root: &Path, writer: &mut dyn Write) -> anyhow::Result<()> {
        let rvs_dir = root.join(".rvs");

        if rvs_dir.exists() {
            writeln!(
                writer,
                "Reinitialized existing RVS repository in {}",
                rvs_dir.display()
            )?;
            return Ok(());
        }

        std::fs::create_dir_all(rvs_dir.join("objects").join("info"))?;
        std::fs::create_dir_all(rvs_dir.join("objects").join("pack"))?;
        std::fs::create_dir_all(rvs_dir.join("refs").join("heads"))?;
        std::fs::create_dir_all(rvs_dir.join("refs").join("tags"))?;

        std::fs::write(rvs_dir.join("HEAD"), "ref: refs/heads/main\n")?;
        std::fs::write(rvs_dir.join("config"), DEFAULT_CONFIG)?;
        std::fs::write(rvs_dir.join("description"), DEFAULT_DESCRIPTION)?;

        writeln!(
            writer,
            "Initialized empty RVS repository in {}",
            rvs_dir.display()
        )?;

        Ok(())
    }
}
