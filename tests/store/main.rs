//! Integration tests for the public store API.
//!
//! These run end to end through `tansu::Store`: the usage scenarios a
//! caller depends on, randomized properties over the record and index
//! layers, and recovery of file-backed stores across reopen.

#[path = "../common/mod.rs"]
mod common;

mod properties;
mod recovery;
mod scenarios;
