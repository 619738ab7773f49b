//! Durability layer for tansu
//!
//! This crate handles everything that touches disk:
//!
//! - Header: magic, format version, store kind and alignment with a CRC
//! - Log: one CRC-framed, bincode-encoded entry per committed batch
//! - Replay: decode on open, mmap for small files, torn-tail truncation
//! - StoreFile: the locked file handle (fs2), append, sync and rewrite

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod file;
pub mod format;
pub mod replay;

pub use encoding::{decode_entry, encode_entry, LogEntry};
pub use file::{create_store_file, StoreFile};
pub use format::{FileHeader, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use replay::{replay_bytes, ReplayOutcome};
