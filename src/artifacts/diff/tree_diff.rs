//! Tree-level diffing
//!
//! Walks two trees in parallel sorted order and classifies every path
//! as added, deleted, modified or type-changed. Subtrees recurse into
//! full-path entries; tree-to-tree differences never surface directly,
//! only their contained files do. A blob/tree flip is reported as a
//! type change for the path itself on top of the entries produced by
//! recursion into the tree side.

use crate::areas::database::Database;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Change recorded for one path between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeChangeType {
    Added(DatabaseEntry),
    Deleted(DatabaseEntry),
    Modified {
        old: DatabaseEntry,
        new: DatabaseEntry,
    },
    /// The path flipped between file and directory; only blob sides are
    /// carried, the directory content shows up through recursion.
    TypeChanged {
        old: Option<DatabaseEntry>,
        new: Option<DatabaseEntry>,
    },
}

impl TreeChangeType {
    pub fn status_char(&self) -> char {
        match self {
            TreeChangeType::Added(_) => 'A',
            TreeChangeType::Deleted(_) => 'D',
            TreeChangeType::Modified { .. } => 'M',
            TreeChangeType::TypeChanged { .. } => 'T',
        }
    }

    pub fn old_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            TreeChangeType::Deleted(entry) => Some(entry),
            TreeChangeType::Modified { old, .. } => Some(old),
            TreeChangeType::TypeChanged { old, .. } => old.as_ref(),
            TreeChangeType::Added(_) => None,
        }
    }

    pub fn new_entry(&self) -> Option<&DatabaseEntry> {
        match self {
            TreeChangeType::Added(entry) => Some(entry),
            TreeChangeType::Modified { new, .. } => Some(new),
            TreeChangeType::TypeChanged { new, .. } => new.as_ref(),
            TreeChangeType::Deleted(_) => None,
        }
    }
}

/// Full-path changes between two snapshots, sorted by path.
pub type ChangeSet = BTreeMap<PathBuf, TreeChangeType>;

type TreeEntryMap = BTreeMap<String, DatabaseEntry>;

#[derive(Debug)]
pub struct TreeDiff<'r> {
    database: &'r Database,
    change_set: ChangeSet,
}

impl<'r> TreeDiff<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeDiff {
            database,
            change_set: BTreeMap::new(),
        }
    }

    /// Compute the diff between two tree-ish oids; either side may be
    /// absent to diff against the empty tree.
    pub fn compare_oids(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        if old == new {
            return Ok(());
        }

        let old_entries = self.inflate(old)?;
        let new_entries = self.inflate(new)?;

        self.compare_entries(&old_entries, &new_entries, Path::new(""))
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.change_set
    }

    pub fn into_changes(self) -> ChangeSet {
        self.change_set
    }

    /// Retain only changes touching the given path prefixes.
    pub fn filter_paths(&mut self, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }

        self.change_set.retain(|path, _| {
            paths
                .iter()
                .any(|filter| path == filter || path.starts_with(filter))
        });
    }

    fn inflate(&self, oid: Option<&ObjectId>) -> anyhow::Result<TreeEntryMap> {
        match oid {
            None => Ok(BTreeMap::new()),
            Some(oid) => {
                let tree_oid = self.database.tree_oid_of(oid)?;
                let tree: Tree = self
                    .database
                    .parse_object_as_tree(&tree_oid)?
                    .ok_or_else(|| anyhow::anyhow!("object {} is not a tree", tree_oid))?;
                Ok(tree.into_entries().collect())
            }
        }
    }

    fn compare_entries(
        &mut self,
        old: &TreeEntryMap,
        new: &TreeEntryMap,
        prefix: &Path,
    ) -> anyhow::Result<()> {
        let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

        for name in names {
            let old_entry = old.get(name.as_str());
            let new_entry = new.get(name.as_str());
            if old_entry == new_entry {
                continue;
            }

            let path = prefix.join(name);

            let old_tree = old_entry.filter(|e| e.is_tree());
            let new_tree = new_entry.filter(|e| e.is_tree());
            if old_tree.is_some() || new_tree.is_some() {
                let old_subtrees = self.inflate(old_tree.map(|e| &e.oid))?;
                let new_subtrees = self.inflate(new_tree.map(|e| &e.oid))?;
                self.compare_entries(&old_subtrees, &new_subtrees, &path)?;
            }

            let old_blob = old_entry.filter(|e| !e.is_tree());
            let new_blob = new_entry.filter(|e| !e.is_tree());

            let change = match (old_blob, new_blob) {
                (None, None) => None,
                (Some(old), None) if new_entry.is_some() => Some(TreeChangeType::TypeChanged {
                    old: Some(old.clone()),
                    new: None,
                }),
                (Some(old), None) => Some(TreeChangeType::Deleted(old.clone())),
                (None, Some(new)) if old_entry.is_some() => Some(TreeChangeType::TypeChanged {
                    old: None,
                    new: Some(new.clone()),
                }),
                (None, Some(new)) => Some(TreeChangeType::Added(new.clone())),
                (Some(old), Some(new)) => Some(TreeChangeType::Modified {
                    old: old.clone(),
                    new: new.clone(),
                }),
            };

            if let Some(change) = change {
                self.change_set.insert(path, change);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
    use crate::artifacts::objects::tree::Tree;
    use assert_fs::TempDir;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        (dir, database)
    }

    fn store_snapshot(database: &Database, files: &[(&str, &str)]) -> ObjectId {
        let entries: Vec<IndexEntry> = files
            .iter()
            .map(|(path, content)| {
                let oid = database
                    .store_blob(Bytes::copy_from_slice(content.as_bytes()))
                    .unwrap();
                IndexEntry::new(PathBuf::from(path), oid, 0, EntryMetadata::default())
            })
            .collect();

        let tree = Tree::build(entries.iter()).unwrap();
        database.store_tree(&tree).unwrap()
    }

    #[rstest]
    fn classifies_additions_deletions_and_modifications(database: (TempDir, Database)) {
        let (_dir, database) = database;

        let old = store_snapshot(&database, &[("kept.txt", "same"), ("gone.txt", "bye")]);
        let new = store_snapshot(
            &database,
            &[("kept.txt", "changed"), ("fresh.txt", "hi")],
        );

        let mut diff = TreeDiff::new(&database);
        diff.compare_oids(Some(&old), Some(&new)).unwrap();

        let statuses: Vec<(String, char)> = diff
            .changes()
            .iter()
            .map(|(path, change)| (path.to_string_lossy().into_owned(), change.status_char()))
            .collect();

        assert_eq!(
            statuses,
            vec![
                ("fresh.txt".to_string(), 'A'),
                ("gone.txt".to_string(), 'D'),
                ("kept.txt".to_string(), 'M'),
            ]
        );
    }

    #[rstest]
    fn recursion_emits_full_paths(database: (TempDir, Database)) {
        let (_dir, database) = database;

        let old = store_snapshot(&database, &[("a/b/deep.txt", "v1")]);
        let new = store_snapshot(&database, &[("a/b/deep.txt", "v2"), ("a/new.txt", "n")]);

        let mut diff = TreeDiff::new(&database);
        diff.compare_oids(Some(&old), Some(&new)).unwrap();

        let paths: Vec<PathBuf> = diff.changes().keys().cloned().collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("a/b/deep.txt"), PathBuf::from("a/new.txt")]
        );
    }

    #[rstest]
    fn file_to_directory_flip_reports_type_change(database: (TempDir, Database)) {
        let (_dir, database) = database;

        let old = store_snapshot(&database, &[("thing", "was a file")]);
        let new = store_snapshot(&database, &[("thing/part.txt", "now a dir")]);

        let mut diff = TreeDiff::new(&database);
        diff.compare_oids(Some(&old), Some(&new)).unwrap();

        assert_eq!(
            diff.changes()
                .get(Path::new("thing"))
                .map(TreeChangeType::status_char),
            Some('T')
        );
        assert_eq!(
            diff.changes()
                .get(Path::new("thing/part.txt"))
                .map(TreeChangeType::status_char),
            Some('A')
        );
    }

    #[rstest]
    fn diff_against_empty_tree_adds_everything(database: (TempDir, Database)) {
        let (_dir, database) = database;

        let new = store_snapshot(&database, &[("a.txt", "1"), ("b/c.txt", "2")]);

        let mut diff = TreeDiff::new(&database);
        diff.compare_oids(None, Some(&new)).unwrap();

        assert!(diff
            .changes()
            .values()
            .all(|change| change.status_char() == 'A'));
        assert_eq!(diff.changes().len(), 2);
    }

    #[rstest]
    fn path_filter_retains_matching_prefixes(database: (TempDir, Database)) {
        let (_dir, database) = database;

        let new = store_snapshot(&database, &[("src/a.rs", "a"), ("docs/b.md", "b")]);

        let mut diff = TreeDiff::new(&database);
        diff.compare_oids(None, Some(&new)).unwrap();
        diff.filter_paths(&[PathBuf::from("src")]);

        let paths: Vec<PathBuf> = diff.changes().keys().cloned().collect();
        assert_eq!(paths, vec![PathBuf::from("src/a.rs")]);
    }
}
