//! Staging index
//!
//! The index is the staging area between working tree and history: a
//! sorted mapping of normalized path → (mode, oid, stat, stage). It is
//! persisted with a `DIRC` header, entries ordered by (path, stage) and a
//! SHA-1 trailer, so loading a file and saving it unchanged is a byte
//! level no-op.
//!
//! ## Locking
//!
//! Reads take a shared advisory lock; saves go through `index.lock` with
//! an atomic rename, failing fast when another process holds the lock.

use crate::artifacts::core::lockfile::{Lockfile, LockfileError};
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{
    ENTRY_BLOCK, ENTRY_MIN_SIZE, EntryMetadata, IndexEntry,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use crate::errors::RvsError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Index {
    /// Path of the index file for this worktree.
    path: Box<Path>,
    /// Entries keyed by (path, stage).
    entries: BTreeMap<(PathBuf, u8), IndexEntry>,
    header: IndexHeader,
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            header: IndexHeader::empty(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.header = IndexHeader::empty();
        self.changed = false;
    }

    /// Load the index from disk, verifying the trailer checksum.
    ///
    /// A missing or empty file simply yields an empty index.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new().read(true).open(&self.path)?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        if lock.metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(&mut *lock);
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;

        reader
            .verify()
            .map_err(|e| RvsError::RepositoryCorrupt(e.to_string()).into())
    }

    fn parse_header(&mut self, reader: &mut Checksum<impl std::io::Read>) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(&header_bytes)?;

        if header.marker != SIGNATURE {
            anyhow::bail!(RvsError::RepositoryCorrupt(
                "invalid index signature".to_string()
            ));
        }
        if header.version != VERSION {
            anyhow::bail!(RvsError::RepositoryCorrupt(format!(
                "unsupported index version: {}",
                header.version
            )));
        }

        Ok(header.entries_count)
    }

    fn parse_entries(
        &mut self,
        entries_count: u32,
        reader: &mut Checksum<impl std::io::Read>,
    ) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?;

            while entry_bytes[entry_bytes.len() - 1] != 0 {
                entry_bytes.extend(reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(&entry_bytes)?;
            self.entries
                .insert((entry.path.clone(), entry.stage), entry);
        }

        self.header.entries_count = entries_count;

        Ok(())
    }

    /// Persist the index through `index.lock` and an atomic rename.
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        if !self.changed && self.path.exists() {
            return Ok(());
        }

        let mut lock = Lockfile::acquire(&self.path).map_err(|e| match e {
            LockfileError::Held(_) => anyhow::Error::from(RvsError::IndexLocked),
            other => anyhow::Error::from(other),
        })?;

        let mut writer = Checksum::new(lock.file_mut()?);

        self.header = IndexHeader::new(
            SIGNATURE.to_string(),
            VERSION,
            self.entries.len() as u32,
        );
        writer.write(&self.header.serialize()?)?;

        for entry in self.entries.values() {
            writer.write(&entry.serialize()?)?;
        }

        writer.write_checksum()?;
        lock.commit()?;
        self.changed = false;

        Ok(())
    }

    /// Stage-0 entry for a path, if present.
    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_path_buf(), 0))
    }

    pub fn entry_at_stage(&self, path: &Path, stage: u8) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_path_buf(), stage))
    }

    /// The path is tracked at any stage.
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.entries
            .range((path.to_path_buf(), 0)..=(path.to_path_buf(), 3))
            .next()
            .is_some()
    }

    /// The path is tracked directly or is a directory prefix of tracked
    /// entries.
    pub fn is_directly_tracked(&self, path: &Path) -> bool {
        self.is_tracked(path) || self.has_entries_under(path)
    }

    pub fn has_entries_under(&self, path: &Path) -> bool {
        self.entries
            .range((path.to_path_buf(), u8::MAX)..)
            .take_while(|((p, _), _)| p.starts_with(path))
            .any(|((p, _), _)| p != path)
    }

    /// Stage an entry, discarding anything it conflicts with: parent
    /// directories tracked as files, descendants when the path was a
    /// directory, and any conflicted stages of the same path.
    pub fn add(&mut self, entry: IndexEntry) -> anyhow::Result<()> {
        for parent in entry.parent_dirs() {
            let parent = parent.to_path_buf();
            for stage in 0..=3 {
                self.entries.remove(&(parent.clone(), stage));
            }
        }
        self.remove_descendants(&entry.path);

        if entry.stage == 0 {
            for stage in 1..=3 {
                self.entries.remove(&(entry.path.clone(), stage));
            }
        } else {
            self.entries.remove(&(entry.path.clone(), 0));
        }

        self.entries.insert((entry.path.clone(), entry.stage), entry);
        self.changed = true;

        Ok(())
    }

    /// Drop every stage of a path and anything tracked beneath it.
    pub fn remove(&mut self, path: &Path) {
        let mut removed = false;
        for stage in 0..=3 {
            removed |= self.entries.remove(&(path.to_path_buf(), stage)).is_some();
        }
        removed |= self.remove_descendants(path);

        if removed {
            self.changed = true;
        }
    }

    fn remove_descendants(&mut self, path: &Path) -> bool {
        let descendants: Vec<(PathBuf, u8)> = self
            .entries
            .range((path.to_path_buf(), u8::MAX)..)
            .take_while(|((p, _), _)| p.starts_with(path))
            .map(|(key, _)| key.clone())
            .collect();

        let removed = !descendants.is_empty();
        for key in descendants {
            self.entries.remove(&key);
        }

        removed
    }

    /// Drop every entry, keeping the index marked dirty so the wipe is
    /// persisted.
    pub fn clear_in_memory(&mut self) {
        self.entries.clear();
        self.changed = true;
    }

    /// Record a conflicted path with its stage 1/2/3 entries, dropping
    /// the stage-0 entry.
    pub fn set_conflict(&mut self, path: &Path, stages: [Option<IndexEntry>; 3]) {
        self.entries.remove(&(path.to_path_buf(), 0));
        for (i, entry) in stages.into_iter().enumerate() {
            let stage = (i + 1) as u8;
            match entry {
                Some(mut entry) => {
                    entry.stage = stage;
                    entry.path = path.to_path_buf();
                    self.entries.insert((path.to_path_buf(), stage), entry);
                }
                None => {
                    self.entries.remove(&(path.to_path_buf(), stage));
                }
            }
        }
        self.changed = true;
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.keys().any(|(_, stage)| *stage > 0)
    }

    pub fn conflict_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|(_, stage)| *stage > 0)
            .map(|(path, _)| path.clone())
            .collect();
        paths.dedup();

        paths
    }

    /// All entries ordered by (path, stage).
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Stage-0 entries only, the ones a tree can be built from.
    pub fn staged_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries
            .values()
            .filter(|entry| entry.stage == 0)
    }

    /// Distinct tracked paths in sorted order.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.entries.keys().map(|(path, _)| path.clone()).collect();
        paths.dedup();

        paths
    }

    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        self.tracked_paths()
            .into_iter()
            .filter(|entry_path| {
                if path == Path::new(".") || path.as_os_str().is_empty() {
                    return true;
                }
                entry_path.starts_with(path) || entry_path == path
            })
            .collect()
    }

    pub fn update_entry_stat(&mut self, path: &Path, stat: EntryMetadata) {
        if let Some(entry) = self.entries.get_mut(&(path.to_path_buf(), 0)) {
            entry.metadata = stat;
            self.changed = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::index_entry::{STAGE_OURS, STAGE_THEIRS};
    use crate::artifacts::objects::object_id::ObjectId;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn index_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn entry(path: &str) -> IndexEntry {
        IndexEntry::new(
            PathBuf::from(path),
            ObjectId::try_parse("ab".repeat(20)).unwrap(),
            0,
            EntryMetadata::default(),
        )
    }

    #[rstest]
    fn save_then_load_round_trips(index_dir: TempDir) {
        let index_path = index_dir.path().join("index");

        let mut index = Index::new(index_path.clone().into_boxed_path());
        index.add(entry("b.txt")).unwrap();
        index.add(entry("a/nested.txt")).unwrap();
        index.write_updates().unwrap();

        let mut reloaded = Index::new(index_path.into_boxed_path());
        reloaded.rehydrate().unwrap();

        let paths: Vec<PathBuf> = reloaded.entries().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("a/nested.txt"), PathBuf::from("b.txt")]
        );
    }

    #[rstest]
    fn unchanged_index_rewrites_to_identical_bytes(index_dir: TempDir) {
        let index_path = index_dir.path().join("index");

        let mut index = Index::new(index_path.clone().into_boxed_path());
        index.add(entry("one.txt")).unwrap();
        index.add(entry("two.txt")).unwrap();
        index.write_updates().unwrap();
        let before = std::fs::read(&index_path).unwrap();

        let mut reloaded = Index::new(index_path.clone().into_boxed_path());
        reloaded.rehydrate().unwrap();
        reloaded.changed = true; // force a physical rewrite
        reloaded.write_updates().unwrap();
        let after = std::fs::read(&index_path).unwrap();

        assert_eq!(before, after);
    }

    #[rstest]
    fn adding_file_discards_tracked_directory(index_dir: TempDir) {
        let mut index = Index::new(index_dir.path().join("index").into_boxed_path());
        index.add(entry("a/b/c.txt")).unwrap();
        index.add(entry("a/b/d.txt")).unwrap();

        // `a/b` becomes a regular file, its children must go
        index.add(entry("a/b")).unwrap();

        let paths: Vec<PathBuf> = index.entries().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a/b")]);
    }

    #[rstest]
    fn adding_nested_file_discards_file_tracked_as_parent(index_dir: TempDir) {
        let mut index = Index::new(index_dir.path().join("index").into_boxed_path());
        index.add(entry("a")).unwrap();

        index.add(entry("a/b.txt")).unwrap();

        let paths: Vec<PathBuf> = index.entries().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a/b.txt")]);
    }

    #[rstest]
    fn conflict_stages_round_trip(index_dir: TempDir) {
        let index_path = index_dir.path().join("index");

        let mut index = Index::new(index_path.clone().into_boxed_path());
        index
            .set_conflict(
                Path::new("clash.txt"),
                [None, Some(entry("clash.txt")), Some(entry("clash.txt"))],
            );
        index.write_updates().unwrap();

        let mut reloaded = Index::new(index_path.into_boxed_path());
        reloaded.rehydrate().unwrap();

        assert!(reloaded.has_conflicts());
        assert_eq!(reloaded.conflict_paths(), vec![PathBuf::from("clash.txt")]);
        assert!(reloaded.entry_by_path(Path::new("clash.txt")).is_none());
        assert!(
            reloaded
                .entry_at_stage(Path::new("clash.txt"), STAGE_OURS)
                .is_some()
        );
        assert!(
            reloaded
                .entry_at_stage(Path::new("clash.txt"), STAGE_THEIRS)
                .is_some()
        );

        // staging the path again resolves the conflict
        reloaded.add(entry("clash.txt")).unwrap();
        assert!(!reloaded.has_conflicts());
    }

    #[rstest]
    fn prefix_tracking_queries(index_dir: TempDir) {
        let mut index = Index::new(index_dir.path().join("index").into_boxed_path());
        index.add(entry("src/lib.rs")).unwrap();

        assert!(index.is_tracked(Path::new("src/lib.rs")));
        assert!(!index.is_tracked(Path::new("src")));
        assert!(index.is_directly_tracked(Path::new("src")));
        assert!(!index.is_directly_tracked(Path::new("docs")));
    }
}
