//! Store engine for tansu
//!
//! This crate owns the handle lifecycle and wires the lower layers together:
//! - Store: open/close, record operations, queries, indexes, copy/optimize
//! - Transaction: buffered, all-or-nothing batch guarded by RAII
//! - config: path spec (`casket.tch#bnum=...#mode=wc`) and TOML tuning
//! - Records: lazy iteration that stops when the store is closed

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod iter;
mod store;
mod transaction;

pub use config::{load_config, parse_path_spec, write_config, StoreLocation, MEMORY_HASH, MEMORY_TREE};
pub use iter::Records;
pub use store::Store;
pub use transaction::Transaction;
