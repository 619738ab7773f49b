//! Log entry encoding and decoding
//!
//! ## Entry Format
//!
//! ```text
//! [length: u32][type: u8][payload: bytes][crc32: u32][padding]
//! ```
//!
//! - **length**: size of type + payload + crc (not including length itself)
//! - **type**: entry type tag (1 = Commit)
//! - **payload**: bincode-serialized [`LogEntry`]
//! - **crc32**: CRC32 over \[type\]\[payload\]
//! - **padding**: zero bytes up to the file's record alignment
//!
//! A buffer that ends inside an entry yields `Error::IncompleteEntry`; any
//! other malformation yields `Error::Corruption`. Replay treats the first as
//! a torn tail and the second as a damaged file.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tansu_core::{Error, Mutation, Result};

const TYPE_COMMIT: u8 = 1;

/// Minimum valid entry: type(1) + crc(4)
const MIN_ENTRY_LEN: usize = 5;

/// One durable log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogEntry {
    /// An atomically applied batch
    Commit {
        /// Commit version
        version: u64,
        /// Mutations in application order
        ops: Vec<Mutation>,
    },
}

impl LogEntry {
    fn type_tag(&self) -> u8 {
        match self {
            LogEntry::Commit { .. } => TYPE_COMMIT,
        }
    }
}

/// Round `len` up to a multiple of `alignment` (a power of two)
pub fn aligned_len(len: usize, alignment: usize) -> usize {
    let mask = alignment.max(1) - 1;
    (len + mask) & !mask
}

/// Encode an entry, padded to `alignment` bytes
pub fn encode_entry(entry: &LogEntry, alignment: usize) -> Result<Vec<u8>> {
    let type_tag = entry.type_tag();
    let payload = bincode::serialize(entry)?;

    let total_len = 1 + payload.len() + 4;
    let framed = 4 + total_len;
    let mut buf = Vec::with_capacity(aligned_len(framed, alignment));

    buf.extend_from_slice(&(total_len as u32).to_le_bytes());
    buf.push(type_tag);
    buf.extend_from_slice(&payload);

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(&payload);
    buf.extend_from_slice(&hasher.finalize().to_le_bytes());

    buf.resize(aligned_len(framed, alignment), 0);
    Ok(buf)
}

/// Decode the entry at the start of `buf`
///
/// Returns the entry and the number of bytes consumed including padding.
/// `offset` is the file position of `buf[0]`, used in error messages.
pub fn decode_entry(buf: &[u8], offset: u64, alignment: usize) -> Result<(LogEntry, usize)> {
    if buf.len() < 4 {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: 4,
        });
    }
    let mut len_buf = [0u8; 4];
    len_buf.copy_from_slice(&buf[0..4]);
    let total_len = u32::from_le_bytes(len_buf) as usize;

    if total_len < MIN_ENTRY_LEN {
        return Err(Error::Corruption(format!(
            "offset {}: invalid entry length {}",
            offset, total_len
        )));
    }
    let framed = 4 + total_len;
    if buf.len() < framed {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: framed,
        });
    }

    let type_tag = buf[4];
    let payload = &buf[5..framed - 4];
    let mut crc_buf = [0u8; 4];
    crc_buf.copy_from_slice(&buf[framed - 4..framed]);
    let expected_crc = u32::from_le_bytes(crc_buf);

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(payload);
    let actual_crc = hasher.finalize();
    if actual_crc != expected_crc {
        return Err(Error::Corruption(format!(
            "offset {}: CRC mismatch: expected {:08x}, got {:08x}",
            offset, expected_crc, actual_crc
        )));
    }

    let entry: LogEntry = bincode::deserialize(payload).map_err(|e| {
        Error::Corruption(format!("offset {}: deserialization failed: {}", offset, e))
    })?;
    if entry.type_tag() != type_tag {
        return Err(Error::Corruption(format!(
            "offset {}: type tag {} does not match entry",
            offset, type_tag
        )));
    }

    // a missing padding tail is harmless: the entry itself is complete
    let consumed = aligned_len(framed, alignment).min(buf.len());
    Ok((entry, consumed))
}
