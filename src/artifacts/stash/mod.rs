//! Stash stack
//!
//! Stashes are ordinary commits; the stack itself is a text file under
//! the main metadata directory, newest entry first, with a version
//! header so future format changes remain detectable. Each line records
//! the stash commit oid and its message.

use crate::artifacts::core::lockfile::Lockfile;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RvsError;
use std::path::{Path, PathBuf};

/// Version header written as the first line of the stash file.
const STASH_SIGNATURE: &str = "rvs-stash 1";

/// File name under the common metadata directory.
const STASH_FILE: &str = "stash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    pub oid: ObjectId,
    pub message: String,
}

/// The stash stack, index 0 being the newest entry (`stash@{0}`).
#[derive(Debug)]
pub struct StashStack {
    path: PathBuf,
    entries: Vec<StashEntry>,
}

impl StashStack {
    pub fn load(commondir: &Path) -> anyhow::Result<Self> {
        let path = commondir.join(STASH_FILE);
        let mut entries = Vec::new();

        if path.is_file() {
            let content = std::fs::read_to_string(&path)
                .map_err(|source| RvsError::io(path.clone(), source))?;
            let mut lines = content.lines();

            match lines.next() {
                Some(STASH_SIGNATURE) => {}
                Some(other) => {
                    anyhow::bail!(RvsError::RepositoryCorrupt(format!(
                        "unsupported stash format: {}",
                        other
                    )));
                }
                None => {}
            }

            for line in lines {
                if line.trim().is_empty() {
                    continue;
                }
                let (oid, message) = line.split_once(' ').ok_or_else(|| {
                    RvsError::RepositoryCorrupt("malformed stash entry".to_string())
                })?;
                entries.push(StashEntry {
                    oid: ObjectId::try_parse(oid.to_string())?,
                    message: message.to_string(),
                });
            }
        }

        Ok(StashStack { path, entries })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if self.entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        let mut lock = Lockfile::acquire(&self.path)?;
        lock.write(STASH_SIGNATURE.as_bytes())?;
        lock.write(b"\n")?;
        for entry in &self.entries {
            lock.write(format!("{} {}\n", entry.oid, entry.message).as_bytes())?;
        }

        lock.commit()
    }

    /// Push a new entry on top of the stack.
    pub fn push(&mut self, oid: ObjectId, message: String) {
        self.entries.insert(0, StashEntry { oid, message });
    }

    pub fn get(&self, index: usize) -> Option<&StashEntry> {
        self.entries.get(index)
    }

    /// Remove and return the entry at the given position.
    pub fn drop_entry(&mut self, index: usize) -> Option<StashEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn entries(&self) -> &[StashEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    fn oid(seed: u8) -> ObjectId {
        ObjectId::try_parse(format!("{:02x}", seed).repeat(20)).unwrap()
    }

    #[test]
    fn push_save_load_round_trips_in_stack_order() {
        let dir = TempDir::new().unwrap();

        let mut stack = StashStack::load(dir.path()).unwrap();
        assert!(stack.is_empty());

        stack.push(oid(1), "WIP on main: first".to_string());
        stack.push(oid(2), "WIP on main: second".to_string());
        stack.save().unwrap();

        let reloaded = StashStack::load(dir.path()).unwrap();
        assert_eq!(reloaded.entries().len(), 2);
        assert_eq!(reloaded.get(0).unwrap().oid, oid(2));
        assert_eq!(reloaded.get(1).unwrap().oid, oid(1));
        assert_eq!(reloaded.get(0).unwrap().message, "WIP on main: second");
    }

    #[test]
    fn dropping_the_last_entry_removes_the_file() {
        let dir = TempDir::new().unwrap();

        let mut stack = StashStack::load(dir.path()).unwrap();
        stack.push(oid(1), "only".to_string());
        stack.save().unwrap();
        assert!(dir.path().join("stash").exists());

        let mut stack = StashStack::load(dir.path()).unwrap();
        let dropped = stack.drop_entry(0).unwrap();
        assert_eq!(dropped.oid, oid(1));
        stack.save().unwrap();

        assert!(!dir.path().join("stash").exists());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stash"), "rvs-stash 99\n").unwrap();

        assert!(StashStack::load(dir.path()).is_err());
    }
}
