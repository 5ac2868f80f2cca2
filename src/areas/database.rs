//! Object database
//!
//! Content-addressed storage for blobs, trees and commits. Objects are
//! framed as `<type> <length>\0<payload>`, hashed with SHA-1 and stored
//! zlib-compressed under `objects/<first-2-hex>/<remaining-38-hex>`.
//! Writes are idempotent: storing existing content is a no-op that
//! resolves to the same oid, and new objects become visible only through
//! the final rename.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, ObjectBox, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::objects::{MIN_OID_PREFIX, OBJECT_ID_LENGTH};
use crate::errors::RvsError;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonic discriminator for temp object names within this process.
static TEMP_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Debug)]
pub struct Database {
    /// Path to the objects directory of the main repository.
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Store an object, returning its oid. Re-storing existing content
    /// is a no-op.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let oid = object.object_id()?;
        let object_path = self.path.join(oid.to_path());

        if !object_path.exists() {
            self.write_object(&object_path, object.serialize()?)?;
        }

        Ok(oid)
    }

    /// Store a blob built from raw file content.
    pub fn store_blob(&self, content: Bytes) -> anyhow::Result<ObjectId> {
        self.store(&Blob::new(content))
    }

    /// Store a built tree and all its subtrees, children first.
    pub fn store_tree(&self, tree: &Tree) -> anyhow::Result<ObjectId> {
        tree.traverse(&|subtree| {
            self.store(subtree)?;
            Ok(())
        })?;

        tree.object_id()
    }

    pub fn exists(&self, oid: &ObjectId) -> bool {
        self.path.join(oid.to_path()).exists()
    }

    /// Load the decompressed framed bytes of an object.
    pub fn load(&self, oid: &ObjectId) -> anyhow::Result<Bytes> {
        self.read_object(self.path.join(oid.to_path()))
    }

    /// Parse an object into its typed representation.
    pub fn parse_object(&self, oid: &ObjectId) -> anyhow::Result<ObjectBox> {
        let (object_type, reader) = self.parse_object_as_bytes(oid)?;

        match object_type {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(reader)?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(reader)?))),
        }
    }

    pub fn parse_object_as_blob(&self, oid: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let (object_type, reader) = self.parse_object_as_bytes(oid)?;

        match object_type {
            ObjectType::Blob => Ok(Some(Blob::deserialize(reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, oid: &ObjectId) -> anyhow::Result<Option<Tree>> {
        let (object_type, reader) = self.parse_object_as_bytes(oid)?;

        match object_type {
            ObjectType::Tree => Ok(Some(Tree::deserialize(reader)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, oid: &ObjectId) -> anyhow::Result<Option<Commit>> {
        let (object_type, reader) = self.parse_object_as_bytes(oid)?;

        match object_type {
            ObjectType::Commit => Ok(Some(Commit::deserialize(reader)?)),
            _ => Ok(None),
        }
    }

    /// Load a commit, failing when the object is missing or of another
    /// kind.
    pub fn load_commit(&self, oid: &ObjectId) -> anyhow::Result<Commit> {
        self.parse_object_as_commit(oid)?
            .ok_or_else(|| anyhow::anyhow!("object {} is not a commit", oid))
    }

    /// Lightweight commit view for graph walks.
    pub fn load_slim_commit(&self, oid: &ObjectId) -> anyhow::Result<SlimCommit> {
        Ok(self.load_commit(oid)?.to_slim(oid.clone()))
    }

    pub fn get_object_type(&self, oid: &ObjectId) -> anyhow::Result<ObjectType> {
        let (object_type, _) = self.parse_object_as_bytes(oid)?;
        Ok(object_type)
    }

    /// Resolve a commit-ish oid to the tree it snapshots.
    pub fn tree_oid_of(&self, oid: &ObjectId) -> anyhow::Result<ObjectId> {
        match self.get_object_type(oid)? {
            ObjectType::Tree => Ok(oid.clone()),
            ObjectType::Commit => Ok(self.load_commit(oid)?.tree_oid().clone()),
            ObjectType::Blob => Err(anyhow::anyhow!("object {} is not a tree-ish", oid)),
        }
    }

    /// Flatten a tree (or a commit's tree) into full-path entries.
    pub fn read_flat_tree(
        &self,
        oid: Option<&ObjectId>,
    ) -> anyhow::Result<BTreeMap<PathBuf, DatabaseEntry>> {
        let mut entries = BTreeMap::new();

        if let Some(oid) = oid {
            let tree_oid = self.tree_oid_of(oid)?;
            self.flatten_tree(&tree_oid, Path::new(""), &mut entries)?;
        }

        Ok(entries)
    }

    fn flatten_tree(
        &self,
        tree_oid: &ObjectId,
        prefix: &Path,
        into: &mut BTreeMap<PathBuf, DatabaseEntry>,
    ) -> anyhow::Result<()> {
        let tree = self
            .parse_object_as_tree(tree_oid)?
            .ok_or_else(|| anyhow::anyhow!("object {} is not a tree", tree_oid))?;

        for (name, entry) in tree.entries() {
            let path = prefix.join(name);
            if entry.is_tree() {
                self.flatten_tree(&entry.oid, &path, into)?;
            } else {
                into.insert(path, entry.clone());
            }
        }

        Ok(())
    }

    /// Resolve an abbreviated oid of at least four hex characters.
    ///
    /// Fails with `UnknownRev` when nothing matches and `AmbiguousRef`
    /// when several objects share the prefix.
    pub fn resolve_prefix(&self, prefix: &str) -> anyhow::Result<ObjectId> {
        if prefix.len() < MIN_OID_PREFIX
            || prefix.len() > OBJECT_ID_LENGTH
            || !prefix.chars().all(|c| c.is_ascii_hexdigit())
        {
            anyhow::bail!(RvsError::UnknownRev(prefix.to_string()));
        }

        let matches = self.find_objects_by_prefix(prefix)?;
        match matches.len() {
            0 => anyhow::bail!(RvsError::UnknownRev(prefix.to_string())),
            1 => Ok(matches.into_iter().next().unwrap()),
            _ => anyhow::bail!(RvsError::AmbiguousRef(prefix.to_string())),
        }
    }

    /// All objects whose oid starts with the given prefix.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        let mut matches = Vec::new();

        let dir_name = &prefix[..2.min(prefix.len())];
        let scan_dirs: Vec<String> = if prefix.len() >= 2 {
            vec![dir_name.to_string()]
        } else {
            (0..=255).map(|i| format!("{:02x}", i)).collect()
        };

        for dir in scan_dirs {
            let dir_path = self.path.join(&dir);
            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)? {
                let entry = entry?;
                let file_name = entry.file_name();
                let full_oid = format!("{}{}", dir, file_name.to_string_lossy());

                if full_oid.starts_with(&prefix)
                    && let Ok(oid) = ObjectId::try_parse(full_oid)
                {
                    matches.push(oid);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }

    fn parse_object_as_bytes(
        &self,
        oid: &ObjectId,
    ) -> anyhow::Result<(ObjectType, impl std::io::BufRead)> {
        let content = self.load(oid)?;
        let mut reader = Cursor::new(content);

        let object_type = ObjectType::parse_object_type(&mut reader)
            .map_err(|e| RvsError::RepositoryCorrupt(format!("object {}: {}", oid, e)))?;

        Ok((object_type, reader))
    }

    fn read_object(&self, object_path: PathBuf) -> anyhow::Result<Bytes> {
        let compressed = std::fs::read(&object_path)
            .with_context(|| format!("unable to read object file {}", object_path.display()))?;

        Self::decompress(&compressed)
    }

    fn write_object(&self, object_path: &Path, content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .with_context(|| format!("invalid object path {}", object_path.display()))?;
        std::fs::create_dir_all(object_dir)
            .with_context(|| format!("unable to create {}", object_dir.display()))?;

        let temp_path = object_dir.join(Self::generate_temp_name());
        let compressed = Self::compress(&content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("unable to open {}", temp_path.display()))?;
        file.write_all(&compressed)
            .with_context(|| format!("unable to write {}", temp_path.display()))?;
        file.sync_all()?;
        drop(file);

        // the rename publishes the object atomically
        std::fs::rename(&temp_path, object_path)
            .with_context(|| format!("unable to rename into {}", object_path.display()))?;

        Ok(())
    }

    fn compress(data: &[u8]) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(data)
            .context("unable to compress object content")?;

        encoder
            .finish()
            .map(Bytes::from)
            .context("unable to finish compressing object content")
    }

    fn decompress(data: &[u8]) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| RvsError::RepositoryCorrupt(format!("zlib inflate failed: {}", e)))?;

        Ok(Bytes::from(decompressed))
    }

    fn generate_temp_name() -> String {
        let discriminator = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("tmp-obj-{}-{}", std::process::id(), discriminator)
    }
}
