//! Store file header
//!
//! ## Layout
//!
//! ```text
//! [magic: 4 bytes "TNSU"][version: u16][kind: u8][alignment_power: u8][crc32: u32]
//! ```
//!
//! All integers are little-endian. The CRC covers the first 8 bytes. Log
//! entries follow immediately after the header.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher;
use tansu_core::{Error, Result, StoreKind};

/// File magic
pub const MAGIC: &[u8; 4] = b"TNSU";

/// Current format version
pub const FORMAT_VERSION: u16 = 1;

/// Size of the encoded header in bytes
pub const HEADER_SIZE: usize = 12;

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version
    pub version: u16,
    /// Backend shape of the store
    pub kind: StoreKind,
    /// Entries are padded to `2^alignment_power` bytes
    pub alignment_power: u8,
}

impl FileHeader {
    /// Header for a new file in the current format
    pub fn new(kind: StoreKind, alignment_power: u8) -> Self {
        Self {
            version: FORMAT_VERSION,
            kind,
            alignment_power,
        }
    }

    /// Alignment in bytes
    pub fn alignment(&self) -> usize {
        1usize << self.alignment_power
    }

    /// Encode to exactly [`HEADER_SIZE`] bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.push(self.kind.tag());
        buf.push(self.alignment_power);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Write the header to `w`
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.encode())?;
        Ok(())
    }

    /// Decode and validate a header
    ///
    /// Returns `Error::Corruption` for bad magic, checksum, version or kind.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Corruption(format!(
                "header truncated: {} of {} bytes",
                buf.len(),
                HEADER_SIZE
            )));
        }
        if &buf[0..4] != MAGIC {
            return Err(Error::Corruption("bad file magic".to_string()));
        }

        let mut hasher = Hasher::new();
        hasher.update(&buf[0..8]);
        let actual = hasher.finalize();

        let mut rdr = &buf[4..HEADER_SIZE];
        let version = rdr.read_u16::<LittleEndian>()?;
        let tag = rdr.read_u8()?;
        let alignment_power = rdr.read_u8()?;
        let expected = rdr.read_u32::<LittleEndian>()?;

        if actual != expected {
            return Err(Error::Corruption(format!(
                "header CRC mismatch: expected {:08x}, got {:08x}",
                expected, actual
            )));
        }
        if version != FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported format version {}",
                version
            )));
        }
        let kind = StoreKind::from_tag(tag)
            .ok_or_else(|| Error::Corruption(format!("unknown store kind tag {}", tag)))?;

        Ok(Self {
            version,
            kind,
            alignment_power,
        })
    }

    /// Read and validate a header from `r`
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        r.read_exact(&mut buf)?;
        Self::decode(&buf)
    }
}
