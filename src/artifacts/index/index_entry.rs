//! Index entry representation
//!
//! One tracked path: its blob oid, stat metadata for fast change
//! detection, and a merge stage. Entries serialize in a binary format
//! padded to 8-byte blocks; the two-byte flags word carries the stage in
//! bits 12–13 and the clamped path length below.

use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object_id::ObjectId;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::cmp::min;
use std::fs::Metadata;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum path length representable in the flags word.
const MAX_PATH_SIZE: usize = 0xfff;

/// Serialized entries are padded with NULs to this block size.
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of a serialized entry in bytes.
pub const ENTRY_MIN_SIZE: usize = 64;

/// Stage of the base version in a conflicted merge.
pub const STAGE_BASE: u8 = 1;
/// Stage of our side in a conflicted merge.
pub const STAGE_OURS: u8 = 2;
/// Stage of their side in a conflicted merge.
pub const STAGE_THEIRS: u8 = 3;

#[derive(Debug, Clone, Default, new)]
pub struct IndexEntry {
    /// Path relative to the worktree root, normalized form.
    pub path: PathBuf,
    /// Blob oid of the staged content.
    pub oid: ObjectId,
    /// Merge stage: 0 for a normal entry, 1/2/3 while conflicted.
    pub stage: u8,
    /// Stat metadata captured when the entry was staged.
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn basename(&self) -> anyhow::Result<&str> {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid entry path: {}", self.path.display()))
    }

    /// Ancestor directories from the top down, excluding the root.
    ///
    /// `a/b/c` yields `[a, a/b]`.
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs: Vec<&Path> = self
            .path
            .ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        dirs.reverse();

        dirs
    }

    /// Size and mode still match the given stat.
    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        (self.metadata.size == 0 || self.metadata.size == other.size)
            && self.metadata.mode == other.mode
    }

    /// Timestamps still match the given stat.
    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    fn flags(&self) -> anyhow::Result<u16> {
        let name_length = self
            .path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("invalid entry path: {}", self.path.display()))?
            .len();

        Ok(((self.stage as u16) << 12) | min(name_length, MAX_PATH_SIZE) as u16)
    }

    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let entry_name = self
            .path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("invalid entry path: {}", self.path.display()))?;

        let mut entry_bytes = Vec::new();
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_raw_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(self.flags()?)?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // at least one NUL terminator, then pad to the block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(anyhow::anyhow!("truncated index entry"));
        }

        let ctime = byteorder::NetworkEndian::read_u32(&bytes[0..4]) as i64;
        let ctime_nsec = byteorder::NetworkEndian::read_u32(&bytes[4..8]) as i64;
        let mtime = byteorder::NetworkEndian::read_u32(&bytes[8..12]) as i64;
        let mtime_nsec = byteorder::NetworkEndian::read_u32(&bytes[12..16]) as i64;
        let dev = byteorder::NetworkEndian::read_u32(&bytes[16..20]) as u64;
        let ino = byteorder::NetworkEndian::read_u32(&bytes[20..24]) as u64;
        let mode: EntryMode = byteorder::NetworkEndian::read_u32(&bytes[24..28]).into();
        let uid = byteorder::NetworkEndian::read_u32(&bytes[28..32]);
        let gid = byteorder::NetworkEndian::read_u32(&bytes[32..36]);
        let size = byteorder::NetworkEndian::read_u32(&bytes[36..40]) as u64;
        let mut oid_bytes = std::io::Cursor::new(&bytes[40..60]);
        let oid = ObjectId::read_raw_from(&mut oid_bytes)?;
        let flags = byteorder::NetworkEndian::read_u16(&bytes[60..62]);
        let stage = ((flags >> 12) & 0x3) as u8;

        let name_end = bytes[62..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow::anyhow!("missing NUL terminator in index entry path"))?;
        let name_bytes = &bytes[62..62 + name_end];
        let path = PathBuf::from(
            std::str::from_utf8(name_bytes)
                .map_err(|_| anyhow::anyhow!("invalid UTF-8 in index entry path"))?,
        );

        Ok(IndexEntry {
            path,
            oid,
            stage,
            metadata: EntryMetadata {
                ctime,
                ctime_nsec,
                mtime,
                mtime_nsec,
                dev,
                ino,
                mode,
                uid,
                gid,
                size,
            },
        })
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.stage == other.stage
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path
            .cmp(&other.path)
            .then(self.stage.cmp(&other.stage))
    }
}

/// Stat metadata captured for fast change detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = anyhow::Error;

    fn try_from((file_path, metadata): (&Path, Metadata)) -> Result<Self, Self::Error> {
        let mode = if metadata.is_dir() {
            EntryMode::Directory
        } else if file_path.is_executable() {
            EntryMode::File(FileMode::Executable)
        } else {
            EntryMode::File(FileMode::Regular)
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            Ok(Self {
                ctime: metadata.ctime(),
                ctime_nsec: metadata.ctime_nsec(),
                mtime: metadata.mtime(),
                mtime_nsec: metadata.mtime_nsec(),
                dev: metadata.dev(),
                ino: metadata.ino(),
                mode,
                uid: metadata.uid(),
                gid: metadata.gid(),
                size: metadata.len(),
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {
                mode,
                size: metadata.len(),
                ..Default::default()
            })
        }
    }
}
