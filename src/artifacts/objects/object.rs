//! Core object traits
//!
//! Every object kind shares one storage contract: the payload is framed as
//! `<type> <length>\0<payload>`, the frame is hashed with SHA-1 to produce
//! the object id, and the framed bytes are what the store compresses onto
//! disk. The traits below capture the two halves of that contract.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::BufRead;
use std::path::PathBuf;

/// Serialization into the framed storage format.
pub trait Packable {
    /// Serialize the object to bytes, frame header included.
    fn serialize(&self) -> Result<Bytes>;
}

/// Deserialization from the framed storage format.
pub trait Unpackable {
    /// Deserialize the object from a reader positioned after the frame
    /// header.
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

/// Operations shared by all object kinds.
pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    /// Compute the object id by hashing the framed bytes.
    fn object_id(&self) -> Result<ObjectId> {
        let content = self.serialize()?;
        let mut hasher = Sha1::new();
        hasher.update(&content);

        ObjectId::from_digest(&hasher.finalize())
    }

    /// Relative storage path under the objects directory.
    fn object_path(&self) -> Result<PathBuf> {
        Ok(self.object_id()?.to_path())
    }
}

/// Type-erased object container for callers that discover the kind at
/// read time.
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
}
