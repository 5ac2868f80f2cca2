//! Lock-and-rename file updates
//!
//! Every mutation of a file under `.rvs/` goes through a `<name>.lock`
//! sibling created with exclusive-open. Content is written to the lock
//! and renamed over the target on commit, so readers never observe a
//! partial write and a second writer fails fast while the lock exists.
//! An uncommitted lock is removed on drop, including on error paths.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("Unable to create '{}': File exists.", .0.display())]
    Held(PathBuf),

    #[error("failed to lock '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct Lockfile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl Lockfile {
    /// Acquire the lock for `target` by exclusively creating
    /// `<target>.lock`.
    pub fn acquire(target: &Path) -> Result<Self, LockfileError> {
        let mut lock_name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = target.with_file_name(lock_name);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockfileError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::AlreadyExists => LockfileError::Held(lock_path.clone()),
                _ => LockfileError::Io {
                    path: lock_path.clone(),
                    source,
                },
            })?;

        Ok(Lockfile {
            target: target.to_path_buf(),
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("lockfile already committed"))?
            .write_all(data)?;

        Ok(())
    }

    /// Borrow the underlying file for writers that stream their own
    /// bytes.
    pub fn file_mut(&mut self) -> anyhow::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("lockfile already committed"))
    }

    /// Atomically replace the target with the lock's content.
    pub fn commit(mut self) -> anyhow::Result<()> {
        let file = self
            .file
            .take()
            .ok_or_else(|| anyhow::anyhow!("lockfile already committed"))?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&self.lock_path, &self.target)?;
        self.committed = true;

        Ok(())
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn commit_replaces_target_and_releases_lock() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("HEAD");
        std::fs::write(&target, "old").unwrap();

        let mut lock = Lockfile::acquire(&target).unwrap();
        lock.write(b"new").unwrap();
        lock.commit().unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
        assert!(!dir.path().join("HEAD.lock").exists());
    }

    #[test]
    fn second_acquisition_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("index");

        let _held = Lockfile::acquire(&target).unwrap();
        match Lockfile::acquire(&target) {
            Err(LockfileError::Held(_)) => {}
            other => panic!("expected held lock, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn dropping_without_commit_removes_lock_and_keeps_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("index");
        std::fs::write(&target, "old").unwrap();

        {
            let mut lock = Lockfile::acquire(&target).unwrap();
            lock.write(b"partial").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
        assert!(!dir.path().join("index.lock").exists());
    }
}
