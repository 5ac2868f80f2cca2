//! SHA-1 integrity trailer for the index file
//!
//! The index ends with the SHA-1 of everything before it. Reads and
//! writes go through this wrapper so the running digest always matches
//! the bytes that actually moved.

use sha1::{Digest, Sha1};
use std::io::{Read, Write};

/// Size of the trailing checksum in bytes.
pub const CHECKSUM_SIZE: usize = 20;

pub struct Checksum<T> {
    inner: T,
    hasher: Sha1,
}

impl<T> Checksum<T> {
    pub fn new(inner: T) -> Self {
        Checksum {
            inner,
            hasher: Sha1::new(),
        }
    }
}

impl<T: Read> Checksum<T> {
    /// Read exactly `size` bytes, folding them into the running digest.
    pub fn read(&mut self, size: usize) -> anyhow::Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.inner.read_exact(&mut buffer)?;
        self.hasher.update(&buffer);

        Ok(buffer)
    }

    /// Consume the trailing checksum and compare it against the digest of
    /// everything read so far.
    pub fn verify(mut self) -> anyhow::Result<()> {
        let mut stored = [0u8; CHECKSUM_SIZE];
        self.inner.read_exact(&mut stored)?;

        let computed = self.hasher.finalize();
        if stored != computed.as_slice() {
            return Err(anyhow::anyhow!("index checksum mismatch"));
        }

        Ok(())
    }
}

impl<T: Write> Checksum<T> {
    /// Write bytes, folding them into the running digest.
    pub fn write(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.inner.write_all(data)?;
        self.hasher.update(data);

        Ok(())
    }

    /// Append the digest of everything written so far.
    pub fn write_checksum(mut self) -> anyhow::Result<()> {
        let digest = self.hasher.finalize();
        self.inner.write_all(&digest)?;
        self.inner.flush()?;

        Ok(())
    }
}
