use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::io::Write;

/// Header of the on-disk index: signature, format version, entry count.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub marker: String,
    pub version: u32,
    pub entries_count: u32,
}

impl IndexHeader {
    pub fn empty() -> Self {
        IndexHeader::new(SIGNATURE.to_string(), VERSION, 0)
    }

    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut header_bytes = Vec::with_capacity(HEADER_SIZE);
        header_bytes.write_all(self.marker.as_bytes())?;
        header_bytes.write_u32::<byteorder::NetworkEndian>(self.version)?;
        header_bytes.write_u32::<byteorder::NetworkEndian>(self.entries_count)?;

        Ok(Bytes::from(header_bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(anyhow::anyhow!("truncated index header"));
        }

        let marker = std::str::from_utf8(&bytes[0..4])?.to_string();
        let version = byteorder::NetworkEndian::read_u32(&bytes[4..8]);
        let entries_count = byteorder::NetworkEndian::read_u32(&bytes[8..12]);

        Ok(IndexHeader::new(marker, version, entries_count))
    }
}
