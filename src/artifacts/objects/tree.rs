//! Tree object
//!
//! A tree is one directory level of a snapshot: a sorted sequence of
//! `<mode> <name>\0<20-byte-oid>` entries. Nested directories become
//! nested trees.
//!
//! ## Sort order
//!
//! Entries sort by name with the Git quirk that a directory compares as
//! if its name carried a trailing `/`. Trees being built keep directory
//! keys *with* that trailing slash so the ordinary byte-wise `BTreeMap`
//! order is already the serialized order; the slash is stripped when the
//! entry is written out. Two trees with the same logical content
//! therefore always serialize to identical bytes.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

/// Entry of a tree under construction.
#[derive(Debug, Clone)]
enum TreeNode {
    /// File entry carrying the staged blob reference.
    File(IndexEntry),
    /// Nested directory.
    Directory(Tree),
}

impl TreeNode {
    fn mode(&self) -> EntryMode {
        match self {
            TreeNode::File(entry) => entry.metadata.mode,
            TreeNode::Directory(_) => EntryMode::Directory,
        }
    }

    fn oid(&self) -> anyhow::Result<ObjectId> {
        match self {
            TreeNode::File(entry) => Ok(entry.oid.clone()),
            TreeNode::Directory(tree) => tree.object_id(),
        }
    }
}

/// One directory level of a snapshot.
///
/// Trees loaded from the database populate `readable_entries`; trees
/// built from the index populate `writeable_entries`.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    /// Entries loaded from the database, keyed by plain name.
    readable_entries: BTreeMap<String, DatabaseEntry>,
    /// Entries being built, directory keys carrying a trailing `/`.
    writeable_entries: BTreeMap<String, TreeNode>,
}

impl Tree {
    /// Build a tree hierarchy from flat index entries.
    ///
    /// Only stage-0 entries belong in a tree; callers filter conflicted
    /// stages out before building.
    pub fn build<'e>(entries: impl Iterator<Item = &'e IndexEntry>) -> anyhow::Result<Self> {
        let mut root = Self::default();

        for entry in entries {
            let parents = entry.parent_dirs();
            root.add_entry(&parents, entry)?;
        }

        Ok(root)
    }

    /// Visit every subtree bottom-up, children before parents.
    ///
    /// Storing requires this order since a parent entry embeds its
    /// children's oids.
    pub fn traverse<F>(&self, func: &F) -> anyhow::Result<()>
    where
        F: Fn(&Tree) -> anyhow::Result<()>,
    {
        for node in self.writeable_entries.values() {
            if let TreeNode::Directory(tree) = node {
                tree.traverse(func)?;
            }
        }
        func(self)?;

        Ok(())
    }

    fn add_entry(&mut self, parents: &[&Path], entry: &IndexEntry) -> anyhow::Result<()> {
        if parents.is_empty() {
            self.writeable_entries
                .insert(entry.basename()?.to_string(), TreeNode::File(entry.clone()));
        } else {
            let parent = parents[0]
                .file_name()
                .and_then(|s| s.to_str())
                .context("invalid parent directory name")?;
            let parent = format!("{}/", parent);

            let tree = match self
                .writeable_entries
                .entry(parent)
                .or_insert_with(|| TreeNode::Directory(Tree::default()))
            {
                TreeNode::Directory(tree) => tree,
                TreeNode::File(_) => anyhow::bail!(
                    "index entry {} collides with a file of the same name",
                    entry.path.display()
                ),
            };
            tree.add_entry(&parents[1..], entry)?;
        }

        Ok(())
    }

    /// Entries of a tree loaded from the database.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.readable_entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.readable_entries.into_iter()
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseEntry> {
        self.readable_entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.readable_entries.is_empty() && self.writeable_entries.is_empty()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();

        for (name, node) in &self.writeable_entries {
            let name = name.trim_end_matches('/');
            let header = format!("{} {}", node.mode().as_octal_str(), name);
            content_bytes.write_all(header.as_bytes())?;
            content_bytes.push(0);
            node.oid()?.write_raw_to(&mut content_bytes)?;
        }

        let mut tree_bytes = Vec::with_capacity(content_bytes.len() + 16);
        let header = format!("{} {}\0", self.object_type().as_str(), content_bytes.len());
        tree_bytes.write_all(header.as_bytes())?;
        tree_bytes.write_all(&content_bytes)?;

        Ok(Bytes::from(tree_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();
        let mut reader = reader;

        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF, no more entries
            }
            if mode_bytes.last() != Some(&b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in tree entry mode"));
            }
            mode_bytes.pop();

            let mode_str = std::str::from_utf8(&mode_bytes)?;
            let mode = EntryMode::from_octal_str(mode_str)?;

            name_bytes.clear();
            let n = reader.read_until(b'\0', &mut name_bytes)?;
            if n == 0 || name_bytes.last() != Some(&b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in tree entry name"));
            }
            name_bytes.pop();
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid = ObjectId::read_raw_from(&mut reader)
                .context("unexpected EOF in tree entry object id")?;

            entries.insert(name, DatabaseEntry::new(oid, mode));
        }

        Ok(Tree {
            readable_entries: entries,
            writeable_entries: Default::default(),
        })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::FileMode;
    use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn entry(path: &str, oid_seed: u8) -> IndexEntry {
        let oid = ObjectId::try_parse(format!("{:02x}", oid_seed).repeat(20)).unwrap();
        IndexEntry::new(PathBuf::from(path), oid, 0, EntryMetadata::default())
    }

    #[test]
    fn known_single_file_tree_hashes_like_git() {
        // tree with one entry `100644 hello.txt -> sha1("Hello\n" blob)`,
        // hash taken from `git mktree`
        let mut e = entry("hello.txt", 0);
        e.oid = ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a".into()).unwrap();

        let tree = Tree::build([e].iter()).unwrap();
        assert_eq!(
            tree.object_id().unwrap().as_ref(),
            "aaa96ced2d9a1c8e72c56b253a0e2fe78393feb7"
        );
    }

    #[test]
    fn directories_sort_as_if_slash_terminated() {
        // Git orders `foo.txt` before the directory `foo/` and after `fon`
        let tree = Tree::build([entry("foo.txt", 1), entry("foo/bar", 2), entry("fon", 3)].iter())
            .unwrap();

        let bytes = tree.serialize().unwrap();
        let fon = bytes.windows(3).position(|w| w == b"fon").unwrap();
        let foo_txt = bytes.windows(7).position(|w| w == b"foo.txt").unwrap();
        let foo_dir = bytes
            .windows(9)
            .position(|w| w == b"40000 foo")
            .unwrap();

        assert!(fon < foo_txt);
        assert!(foo_txt < foo_dir);
    }

    #[test]
    fn building_twice_yields_identical_bytes() {
        let entries = vec![entry("b.txt", 1), entry("a/x", 2), entry("a/y", 3)];

        let first = Tree::build(entries.iter()).unwrap().serialize().unwrap();
        let second = Tree::build(entries.iter()).unwrap().serialize().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn serialization_round_trips_through_deserialize() {
        let tree = Tree::build([entry("a.txt", 1), entry("sub/b.txt", 2)].iter()).unwrap();
        let bytes = tree.serialize().unwrap();

        // strip the frame header before handing to deserialize
        let payload_start = bytes.iter().position(|&b| b == 0).unwrap() + 1;
        let parsed = Tree::deserialize(Cursor::new(bytes.slice(payload_start..))).unwrap();

        let names: Vec<_> = parsed.entries().map(|(name, _)| name.clone()).collect();
        assert_eq!(names, vec!["a.txt".to_string(), "sub".to_string()]);
        assert!(parsed.get("sub").unwrap().is_tree());
    }
}
