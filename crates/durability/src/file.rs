//! The single on-disk file backing a store
//!
//! A [`StoreFile`] owns the open file descriptor and its advisory lock.
//! Opening validates the header, replays the log and (when writable) cuts
//! off any torn tail. Every commit appends one entry. [`StoreFile::rewrite`]
//! replaces the file with a compacted log through a locked temporary file
//! and an atomic rename.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tansu_core::{DurabilityMode, Error, ErrorCode, LockMode, Result, StoreConfig, StoreKind};
use tracing::{debug, info, warn};

use crate::encoding::{encode_entry, LogEntry};
use crate::format::{FileHeader, HEADER_SIZE};
use crate::replay::{replay_file, ReplayOutcome};

/// An open, locked store file
#[derive(Debug)]
pub struct StoreFile {
    path: PathBuf,
    file: File,
    header: FileHeader,
    len: u64,
    writable: bool,
    durability: DurabilityMode,
    locked: bool,
    /// bytes past `len` may be left over from a failed append
    dirty_tail: bool,
    #[cfg(test)]
    fault: Option<Fault>,
}

/// Failure injected into the next append
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Write only this many bytes, then fail
    ShortWrite(usize),
    /// Write everything, then fail the sync
    Sync,
}

impl StoreFile {
    /// Open (or create) the file at `path` and replay its log
    ///
    /// Every failure is reported as `Error::Open` carrying the path.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<(Self, ReplayOutcome)> {
        let path = path.as_ref();
        Self::open_inner(path, config).map_err(|e| e.into_open(path))
    }

    fn open_inner(path: &Path, config: &StoreConfig) -> Result<(Self, ReplayOutcome)> {
        config.validate()?;
        let mode = config.mode;
        let exists = path.exists();
        if !exists && !mode.create {
            return Err(Error::open(path, ErrorCode::NoFile, "file does not exist"));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(mode.write)
            .create(mode.create && mode.write)
            .truncate(false)
            .open(path)?;

        let locked = acquire_lock(&file, path, config.lock, mode.write)?;

        if mode.truncate {
            file.set_len(0)?;
        }

        let mut store_file = StoreFile {
            path: path.to_path_buf(),
            file,
            header: FileHeader::new(config.kind, config.alignment_power),
            len: 0,
            writable: mode.write,
            durability: config.durability,
            locked,
            dirty_tail: false,
            #[cfg(test)]
            fault: None,
        };

        let file_len = store_file.file.metadata()?.len();
        if file_len == 0 {
            if !mode.write {
                return Err(Error::open(path, ErrorCode::Meta, "file is empty"));
            }
            store_file.write_header()?;
            info!(
                target: "tansu::durability",
                path = %path.display(),
                kind = %config.kind,
                "Created store file"
            );
            return Ok((store_file, ReplayOutcome {
                valid_len: HEADER_SIZE as u64,
                ..Default::default()
            }));
        }

        let header = {
            let mut reader = &store_file.file;
            reader.seek(SeekFrom::Start(0))?;
            FileHeader::read_from(&mut reader).map_err(|e| match e {
                Error::Io { .. } => Error::open(path, ErrorCode::Meta, "header truncated"),
                other => Error::open(path, ErrorCode::Meta, other.to_string()),
            })?
        };
        if header.kind != config.kind {
            return Err(Error::open(
                path,
                ErrorCode::Meta,
                format!("file holds a {} store, not {}", header.kind, config.kind),
            ));
        }
        store_file.header = header;

        let outcome = replay_file(
            &store_file.file,
            file_len,
            config.extra_mapped_memory,
            header.alignment(),
        )
        .map_err(|e| Error::open(path, ErrorCode::Meta, e.to_string()))?;

        store_file.len = file_len;
        if outcome.has_torn_tail() && store_file.writable {
            warn!(
                target: "tansu::durability",
                path = %path.display(),
                valid_len = outcome.valid_len,
                torn_bytes = outcome.torn_bytes,
                "Truncating torn tail"
            );
            store_file.file.set_len(outcome.valid_len)?;
            store_file.len = outcome.valid_len;
        }

        info!(
            target: "tansu::durability",
            path = %path.display(),
            entries = outcome.entries.len(),
            "Opened store file"
        );
        Ok((store_file, outcome))
    }

    fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.file)?;
        self.file.sync_all()?;
        self.len = HEADER_SIZE as u64;
        Ok(())
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header as read or written at open
    pub fn header(&self) -> FileHeader {
        self.header
    }

    /// Current file size in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if only the header has been written
    pub fn is_empty(&self) -> bool {
        self.len <= HEADER_SIZE as u64
    }

    /// True if opened for writing
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Append one entry at the end of the file
    ///
    /// On failure the file is cut back to its previous length, so a
    /// failed append never reappears on replay.
    pub fn append(&mut self, entry: &LogEntry) -> Result<()> {
        if !self.writable {
            return Err(Error::invalid("store file is read-only"));
        }
        let bytes = encode_entry(entry, self.header.alignment())?;
        if self.dirty_tail {
            self.file
                .set_len(self.len)
                .map_err(|e| Error::io(ErrorCode::Truncate, e))?;
            self.dirty_tail = false;
        }
        if let Err(e) = self.write_at_end(&bytes) {
            self.discard_tail();
            return Err(e);
        }
        self.len += bytes.len() as u64;
        Ok(())
    }

    fn write_at_end(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.len))?;
        #[cfg(test)]
        if let Some(Fault::ShortWrite(n)) = self.fault {
            self.file.write_all(&bytes[..n.min(bytes.len())])?;
            return Err(Error::io(
                ErrorCode::Write,
                std::io::Error::new(std::io::ErrorKind::Other, "file size limit exceeded"),
            ));
        }
        self.file
            .write_all(bytes)
            .map_err(|e| Error::io(ErrorCode::Write, e))?;
        #[cfg(test)]
        if let Some(Fault::Sync) = self.fault {
            return Err(Error::io(
                ErrorCode::Sync,
                std::io::Error::new(std::io::ErrorKind::Other, "device error"),
            ));
        }
        if self.durability == DurabilityMode::Always {
            self.file
                .sync_data()
                .map_err(|e| Error::io(ErrorCode::Sync, e))?;
        }
        Ok(())
    }

    /// Cut off whatever a failed append left past the logical end
    fn discard_tail(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            warn!(
                target: "tansu::durability",
                path = %self.path.display(),
                len = self.len,
                error = %e,
                "Could not truncate failed append; retrying before the next one"
            );
            self.dirty_tail = true;
        }
    }

    /// Flush buffered writes to the device
    pub fn sync(&mut self) -> Result<()> {
        if !self.writable {
            return Ok(());
        }
        self.file
            .sync_all()
            .map_err(|e| Error::io(ErrorCode::Sync, e))
    }

    /// Replace the file contents with `entries`
    ///
    /// The new log is written to a locked sibling temp file, synced and
    /// renamed over the original; this handle then continues on the new
    /// file. A failure leaves the original untouched.
    pub fn rewrite(&mut self, entries: &[LogEntry]) -> Result<()> {
        if !self.writable {
            return Err(Error::invalid("store file is read-only"));
        }
        let tmp_path = temp_path(&self.path);
        let (file, len) = match write_log(&tmp_path, self.header, entries, self.locked) {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            Error::io(ErrorCode::Rename, e)
        })?;

        let old = std::mem::replace(&mut self.file, file);
        self.dirty_tail = false;
        if self.locked {
            let _ = FileExt::unlock(&old);
        }
        let before = self.len;
        self.len = len;
        debug!(
            target: "tansu::durability",
            path = %self.path.display(),
            before,
            after = len,
            "Rewrote store file"
        );
        Ok(())
    }
}

impl Drop for StoreFile {
    fn drop(&mut self) {
        if self.locked {
            let _ = FileExt::unlock(&self.file);
        }
    }
}

/// Write a complete store file at `path` holding `entries`
///
/// Any existing file at `path` is replaced. Used for copies; the file is
/// synced and closed before returning.
pub fn create_store_file(
    path: impl AsRef<Path>,
    kind: StoreKind,
    alignment_power: u8,
    entries: &[LogEntry],
) -> Result<u64> {
    let path = path.as_ref();
    let header = FileHeader::new(kind, alignment_power);
    let (_, len) = write_log(path, header, entries, false)?;
    Ok(len)
}

fn write_log(path: &Path, header: FileHeader, entries: &[LogEntry], lock: bool) -> Result<(File, u64)> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| Error::io(ErrorCode::from_io(&e), e))?;
    if lock {
        FileExt::try_lock_exclusive(&file).map_err(|e| Error::io(ErrorCode::Lock, e))?;
    }
    let mut buf = header.encode();
    for entry in entries {
        buf.extend(encode_entry(entry, header.alignment())?);
    }
    file.write_all(&buf)
        .map_err(|e| Error::io(ErrorCode::Write, e))?;
    file.sync_all()
        .map_err(|e| Error::io(ErrorCode::Sync, e))?;
    Ok((file, buf.len() as u64))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn acquire_lock(file: &File, path: &Path, lock: LockMode, writer: bool) -> Result<bool> {
    let result = match (lock, writer) {
        (LockMode::None, _) => return Ok(false),
        (LockMode::Blocking, true) => FileExt::lock_exclusive(file),
        (LockMode::Blocking, false) => FileExt::lock_shared(file),
        (LockMode::NonBlocking, true) => FileExt::try_lock_exclusive(file),
        (LockMode::NonBlocking, false) => FileExt::try_lock_shared(file),
    };
    result.map_err(|_| {
        Error::open(
            path,
            ErrorCode::Lock,
            "store file is already in use by another handle",
        )
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansu_core::{Mutation, OpenMode, Value};
    use tempfile::TempDir;

    fn commit(version: u64, key: &str) -> LogEntry {
        LogEntry::Commit {
            version,
            ops: vec![Mutation::Put {
                key: key.into(),
                value: Value::from("v"),
            }],
        }
    }

    #[test]
    fn test_create_then_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        let config = StoreConfig::tree();
        {
            let (mut f, outcome) = StoreFile::open(&path, &config).unwrap();
            assert!(outcome.entries.is_empty());
            f.append(&commit(1, "a")).unwrap();
            f.append(&commit(2, "b")).unwrap();
            f.sync().unwrap();
        }
        let (_f, outcome) = StoreFile::open(&path, &config).unwrap();
        assert_eq!(outcome.entries, vec![commit(1, "a"), commit(2, "b")]);
    }

    #[test]
    fn test_short_write_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        let config = StoreConfig::hash();
        {
            let (mut f, _) = StoreFile::open(&path, &config).unwrap();
            f.append(&commit(1, "a")).unwrap();
            let len = f.len();

            f.fault = Some(Fault::ShortWrite(10));
            let err = f.append(&commit(2, "b")).unwrap_err();
            assert_eq!(err.code(), ErrorCode::Write);
            assert_eq!(f.len(), len);
            assert_eq!(fs::metadata(&path).unwrap().len(), len);

            f.fault = None;
            f.append(&commit(3, "c")).unwrap();
            f.sync().unwrap();
        }
        let (_f, outcome) = StoreFile::open(&path, &config).unwrap();
        assert_eq!(outcome.entries, vec![commit(1, "a"), commit(3, "c")]);
    }

    #[test]
    fn test_failed_sync_entry_is_not_replayed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        let config = StoreConfig::hash().with_durability(DurabilityMode::Always);
        {
            let (mut f, _) = StoreFile::open(&path, &config).unwrap();
            f.append(&commit(1, "a")).unwrap();
            f.fault = Some(Fault::Sync);
            assert_eq!(f.append(&commit(2, "b")).unwrap_err().code(), ErrorCode::Sync);
        }
        let (_f, outcome) = StoreFile::open(&path, &config).unwrap();
        assert_eq!(outcome.entries, vec![commit(1, "a")]);
    }

    #[test]
    fn test_missing_file_without_create() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.tns");
        let config = StoreConfig::hash().with_mode(OpenMode::read_only());
        let err = StoreFile::open(&path, &config).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoFile);
        assert_eq!(err.kind(), tansu_core::ErrorKind::Open);
    }

    #[test]
    fn test_second_writer_is_locked_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        let config = StoreConfig::hash();
        let (_first, _) = StoreFile::open(&path, &config).unwrap();
        let err = StoreFile::open(&path, &config).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Lock);
    }

    #[test]
    fn test_kind_mismatch_is_open_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        drop(StoreFile::open(&path, &StoreConfig::hash()).unwrap());
        let err = StoreFile::open(&path, &StoreConfig::tree()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Meta);
    }

    #[test]
    fn test_torn_tail_truncated_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        let config = StoreConfig::hash();
        let good_len = {
            let (mut f, _) = StoreFile::open(&path, &config).unwrap();
            f.append(&commit(1, "a")).unwrap();
            f.len()
        };
        {
            let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
            raw.write_all(&[0x40, 0, 0, 0, 1, 2, 3]).unwrap();
        }
        let (f, outcome) = StoreFile::open(&path, &config).unwrap();
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(f.len(), good_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk");
        fs::write(&path, b"definitely not a store file").unwrap();
        let err = StoreFile::open(&path, &StoreConfig::hash()).unwrap_err();
        assert_eq!(err.kind(), tansu_core::ErrorKind::Open);
    }

    #[test]
    fn test_rewrite_shrinks_and_stays_usable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        let config = StoreConfig::hash();
        let (mut f, _) = StoreFile::open(&path, &config).unwrap();
        for i in 0..20 {
            f.append(&commit(i, "same")).unwrap();
        }
        let before = f.len();
        f.rewrite(&[commit(20, "same")]).unwrap();
        assert!(f.len() < before);
        f.append(&commit(21, "other")).unwrap();
        drop(f);

        let (_f, outcome) = StoreFile::open(&path, &config).unwrap();
        assert_eq!(outcome.entries.len(), 2);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_read_only_rejects_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tns");
        drop(StoreFile::open(&path, &StoreConfig::hash()).unwrap());
        let config = StoreConfig::hash().with_mode(OpenMode::read_only());
        let (mut f, _) = StoreFile::open(&path, &config).unwrap();
        assert!(f.append(&commit(1, "a")).is_err());
    }
}
