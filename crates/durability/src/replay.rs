//! Log replay
//!
//! Decodes the entries that follow the header. Decoding stops at the first
//! incomplete entry: everything before it is kept and the tail is reported
//! as torn. A checksum or framing failure anywhere aborts replay.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use memmap2::Mmap;
use tansu_core::{Error, Result};
use tracing::{debug, warn};

use crate::encoding::{decode_entry, LogEntry};
use crate::format::HEADER_SIZE;

/// Result of replaying a file
#[derive(Debug, Default)]
pub struct ReplayOutcome {
    /// Entries in file order
    pub entries: Vec<LogEntry>,
    /// File offset just past the last complete entry
    pub valid_len: u64,
    /// Bytes of torn tail after `valid_len`
    pub torn_bytes: u64,
}

impl ReplayOutcome {
    /// True if a partially written entry was found at the end
    pub fn has_torn_tail(&self) -> bool {
        self.torn_bytes > 0
    }
}

/// Decode every entry in `log`, which starts at file offset [`HEADER_SIZE`]
pub fn replay_bytes(log: &[u8], alignment: usize) -> Result<ReplayOutcome> {
    let mut outcome = ReplayOutcome {
        valid_len: HEADER_SIZE as u64,
        ..Default::default()
    };
    let mut pos = 0usize;
    while pos < log.len() {
        let offset = (HEADER_SIZE + pos) as u64;
        match decode_entry(&log[pos..], offset, alignment) {
            Ok((entry, consumed)) => {
                outcome.entries.push(entry);
                pos += consumed;
                outcome.valid_len = (HEADER_SIZE + pos) as u64;
            }
            Err(Error::IncompleteEntry { offset, have, needed }) => {
                warn!(
                    target: "tansu::durability",
                    offset,
                    have,
                    needed,
                    "Discarding torn entry at end of file"
                );
                outcome.torn_bytes = (log.len() - pos) as u64;
                break;
            }
            Err(e) => return Err(e),
        }
    }
    debug!(
        target: "tansu::durability",
        entries = outcome.entries.len(),
        valid_len = outcome.valid_len,
        "Replayed log"
    );
    Ok(outcome)
}

/// Replay the log region of `file`
///
/// Files whose total size fits in `map_limit` bytes are read through a
/// memory map; larger files (or `map_limit == 0`) are read into a buffer.
pub fn replay_file(file: &File, file_len: u64, map_limit: u64, alignment: usize) -> Result<ReplayOutcome> {
    if file_len <= HEADER_SIZE as u64 {
        return Ok(ReplayOutcome {
            valid_len: file_len,
            ..Default::default()
        });
    }
    if map_limit > 0 && file_len <= map_limit {
        // SAFETY: the store holds the file lock for its whole lifetime and
        // the map is dropped before this function returns.
        let map = unsafe { Mmap::map(file)? };
        return replay_bytes(&map[HEADER_SIZE..], alignment);
    }
    let mut buf = Vec::with_capacity(file_len as usize);
    let mut reader = file;
    reader.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
    reader.read_to_end(&mut buf)?;
    replay_bytes(&buf, alignment)
}
