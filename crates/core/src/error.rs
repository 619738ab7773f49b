//! Error types for tansu
//!
//! Every failing call returns a typed [`Error`]. Errors fall into the
//! taxonomy exposed by [`ErrorKind`] and carry a native-style numeric
//! [`ErrorCode`] so diagnostics line up with the codes Tokyo Cabinet users
//! already know. We use `thiserror` for the `Display` and `Error` impls.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for tansu operations
pub type Result<T> = std::result::Result<T, Error>;

/// Native-style error codes
///
/// Numbering follows the Tokyo Cabinet `ecode` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// success
    Success = 0,
    /// threading error
    Thread = 1,
    /// invalid operation
    Invalid = 2,
    /// file not found
    NoFile = 3,
    /// no permission
    NoPerm = 4,
    /// invalid meta data
    Meta = 5,
    /// invalid record header
    ReadHeader = 6,
    /// open error
    Open = 7,
    /// close error
    Close = 8,
    /// truncate error
    Truncate = 9,
    /// sync error
    Sync = 10,
    /// stat error
    Stat = 11,
    /// seek error
    Seek = 12,
    /// read error
    Read = 13,
    /// write error
    Write = 14,
    /// mmap error
    Mmap = 15,
    /// lock error
    Lock = 16,
    /// unlink error
    Unlink = 17,
    /// rename error
    Rename = 18,
    /// mkdir error
    Mkdir = 19,
    /// rmdir error
    Rmdir = 20,
    /// existing record
    Keep = 21,
    /// no record found
    NoRecord = 22,
    /// miscellaneous error
    Misc = 9999,
}

impl ErrorCode {
    /// Numeric value of the code
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Short human-readable message for the code
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::Thread => "threading error",
            ErrorCode::Invalid => "invalid operation",
            ErrorCode::NoFile => "file not found",
            ErrorCode::NoPerm => "no permission",
            ErrorCode::Meta => "invalid meta data",
            ErrorCode::ReadHeader => "invalid record header",
            ErrorCode::Open => "open error",
            ErrorCode::Close => "close error",
            ErrorCode::Truncate => "trunc error",
            ErrorCode::Sync => "sync error",
            ErrorCode::Stat => "stat error",
            ErrorCode::Seek => "seek error",
            ErrorCode::Read => "read error",
            ErrorCode::Write => "write error",
            ErrorCode::Mmap => "mmap error",
            ErrorCode::Lock => "lock error",
            ErrorCode::Unlink => "unlink error",
            ErrorCode::Rename => "rename error",
            ErrorCode::Mkdir => "mkdir error",
            ErrorCode::Rmdir => "rmdir error",
            ErrorCode::Keep => "existing record",
            ErrorCode::NoRecord => "no record found",
            ErrorCode::Misc => "miscellaneous error",
        }
    }

    /// Best-effort classification of an I/O error
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ErrorCode::NoFile,
            io::ErrorKind::PermissionDenied => ErrorCode::NoPerm,
            io::ErrorKind::UnexpectedEof => ErrorCode::Read,
            io::ErrorKind::WriteZero => ErrorCode::Write,
            io::ErrorKind::WouldBlock => ErrorCode::Lock,
            _ => ErrorCode::Misc,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_i32(), self.message())
    }
}

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Path invalid, permission denied, corrupt or incompatible file, bad mode flags
    Open,
    /// Operation attempted on a released handle
    Closed,
    /// Numeric increment on a non-numeric stored value
    TypeMismatch,
    /// begin-while-active, commit/abort-while-idle, commit conflicts
    Transaction,
    /// Malformed query condition
    Query,
    /// Storage medium failure during read/write/sync
    Io,
    /// Operation not permitted on this handle (read-only writes, bad tuning values)
    Invalid,
}

/// Transaction state machine violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// `begin()` while another transaction is active on the handle
    #[error("a transaction is already active on this handle")]
    AlreadyActive,

    /// `commit()`/`abort()` with no active transaction
    #[error("no transaction is active")]
    NotActive,

    /// Commit-time validation found reads that were overwritten
    #[error("transaction aborted: {conflicts} conflicting read(s)")]
    Conflict {
        /// Number of keys whose version changed since they were read
        conflicts: usize,
    },
}

/// Error types for tansu
#[derive(Debug, Error)]
pub enum Error {
    /// The store could not be opened
    #[error("cannot open '{}': {message} (err {code})", .path.display())]
    Open {
        /// Path that was being opened
        path: PathBuf,
        /// Native-style code
        code: ErrorCode,
        /// Diagnostic message
        message: String,
    },

    /// The handle (store or result set) was already released
    #[error("handle is closed")]
    Closed,

    /// Numeric increment against a value that does not parse as a number
    #[error("value at '{key}' is not numeric: {message}")]
    TypeMismatch {
        /// Primary key of the offending record
        key: String,
        /// What was found instead
        message: String,
    },

    /// Transaction lifecycle error
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Malformed query
    #[error("query error: {0}")]
    Query(String),

    /// I/O error (file operations)
    #[error("I/O error (err {code}): {source}")]
    Io {
        /// Native-style code
        code: ErrorCode,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Checksum or format violation found in persisted data
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A log entry was cut short (torn write at the tail of the file)
    #[error("incomplete entry at offset {offset}: have {have} bytes, need {needed}")]
    IncompleteEntry {
        /// File offset of the entry
        offset: u64,
        /// Bytes available
        have: usize,
        /// Bytes the entry claims
        needed: usize,
    },

    /// Invalid operation or argument
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build an open error
    pub fn open(path: impl AsRef<Path>, code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Open {
            path: path.as_ref().to_path_buf(),
            code,
            message: message.into(),
        }
    }

    /// Build a query error
    pub fn query(message: impl Into<String>) -> Self {
        Error::Query(message.into())
    }

    /// Build an invalid-operation error
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidOperation(message.into())
    }

    /// Build an I/O error tagged with an explicit code
    pub fn io(code: ErrorCode, source: io::Error) -> Self {
        Error::Io { code, source }
    }

    /// Build a type mismatch error
    pub fn type_mismatch(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TypeMismatch {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open { .. } => ErrorKind::Open,
            Error::Closed => ErrorKind::Closed,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Transaction(_) => ErrorKind::Transaction,
            Error::Query(_) => ErrorKind::Query,
            Error::Io { .. }
            | Error::Corruption(_)
            | Error::IncompleteEntry { .. }
            | Error::Serialization(_) => ErrorKind::Io,
            Error::InvalidOperation(_) => ErrorKind::Invalid,
        }
    }

    /// Native-style code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Open { code, .. } | Error::Io { code, .. } => *code,
            Error::Closed => ErrorCode::Invalid,
            Error::TypeMismatch { .. } => ErrorCode::Invalid,
            Error::Transaction(_) => ErrorCode::Invalid,
            Error::Query(_) => ErrorCode::Invalid,
            Error::Corruption(_) => ErrorCode::Meta,
            Error::IncompleteEntry { .. } => ErrorCode::ReadHeader,
            Error::InvalidOperation(_) => ErrorCode::Invalid,
            Error::Serialization(_) => ErrorCode::Misc,
        }
    }

    /// Re-tag any error raised while opening `path` as [`Error::Open`]
    ///
    /// Codes are preserved so a permission failure still reports `NoPerm`.
    pub fn into_open(self, path: impl AsRef<Path>) -> Self {
        match self {
            Error::Open { .. } => self,
            other => {
                let code = other.code();
                Error::open(path, code, other.to_string())
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io {
            code: ErrorCode::from_io(&e),
            source: e,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
