//! Object identifier (SHA-1 hash)
//!
//! Object ids are 40-character hexadecimal strings naming objects in the
//! store. On disk an object lives at `objects/<first-2>/<remaining-38>`;
//! inside trees and the index the id is stored as 20 raw bytes.

use crate::artifacts::objects::{OBJECT_ID_LENGTH, SHORT_OID_LENGTH};
use std::io;
use std::path::PathBuf;

/// A validated 40-hex SHA-1 object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse and validate an object id from its hexadecimal form.
    pub fn try_parse(id: String) -> anyhow::Result<Self> {
        if id.len() != OBJECT_ID_LENGTH {
            return Err(anyhow::anyhow!("invalid object id length: {}", id.len()));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow::anyhow!("invalid object id characters: {}", id));
        }
        Ok(Self(id.to_ascii_lowercase()))
    }

    /// Build an object id from a finalized SHA-1 digest.
    pub fn from_digest(digest: &[u8]) -> anyhow::Result<Self> {
        let hex = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Self::try_parse(hex)
    }

    /// Write the id in binary form (20 bytes), as used inside tree
    /// entries and index entries.
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        for i in (0..OBJECT_ID_LENGTH).step_by(2) {
            let byte = u8::from_str_radix(&self.0[i..i + 2], 16)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid hex digit"))?;
            writer.write_all(&[byte])?;
        }

        Ok(())
    }

    /// Read an object id from its binary form (20 bytes).
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut raw = [0u8; OBJECT_ID_LENGTH / 2];
        reader.read_exact(&mut raw)?;

        Self::from_digest(&raw)
    }

    /// Relative path of this object under the objects directory, split
    /// as `xx/yyyy...`.
    pub fn to_path(&self) -> PathBuf {
        let (dir, file) = self.0.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// Abbreviated form used in human-facing output.
    pub fn to_short_oid(&self) -> String {
        self.0.split_at(SHORT_OID_LENGTH).0.to_string()
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_rejects_wrong_length_and_non_hex() {
        assert!(ObjectId::try_parse("abc".to_string()).is_err());
        assert!(ObjectId::try_parse("g".repeat(40)).is_err());
        assert!(ObjectId::try_parse("a".repeat(40)).is_ok());
    }

    #[test]
    fn raw_round_trip_preserves_id() {
        let oid = ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a".into()).unwrap();

        let mut raw = Vec::new();
        oid.write_raw_to(&mut raw).unwrap();
        assert_eq!(raw.len(), 20);

        let parsed = ObjectId::read_raw_from(&mut raw.as_slice()).unwrap();
        assert_eq!(parsed, oid);
    }

    #[test]
    fn path_splits_first_two_characters() {
        let oid = ObjectId::try_parse("ce013625030ba8dba906f756967f9e9ca394464a".into()).unwrap();
        assert_eq!(
            oid.to_path(),
            PathBuf::from("ce").join("013625030ba8dba906f756967f9e9ca394464a")
        );
        assert_eq!(oid.to_short_oid(), "ce01362");
    }
}
