//! Durable File
//!
//! Offset-addressed binary file primitive beneath the page caches.
//!
//! ## Contract
//! - `read` is exact-size: it reports `false` (buffer untouched) when the
//!   requested range lies past the current end of file.
//! - `write` is exact-size and auto-extends the file with zero bytes when
//!   the target offset lies past the current end.
//! - No buffering here — the page cache is the buffering layer.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Chunk size used when zero-extending a file
const ZERO_CHUNK: usize = 4096;

/// A byte-addressable persistent store for one area file
pub struct DurableFile {
    file: File,
    path: PathBuf,
    /// Tracked file length, maintained across writes
    len: u64,
}

impl DurableFile {
    /// Open (or create) the file at `path`.
    ///
    /// Parent directories are created as needed. With `truncate` set any
    /// existing content is discarded.
    pub fn open(path: &Path, truncate: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(path)?;

        let len = file.metadata()?.len();

        Ok(Self {
            file,
            path: path.to_path_buf(),
            len,
        })
    }

    /// Read exactly `buf.len()` bytes at `offset`.
    ///
    /// Returns `Ok(false)` without touching `buf` when the range extends
    /// past the current end of file.
    pub fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<bool> {
        if offset + buf.len() as u64 > self.len {
            return Ok(false);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(true)
    }

    /// Write exactly `buf.len()` bytes at `offset`, zero-extending the
    /// file first when `offset` lies past the current end.
    pub fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        if offset > self.len {
            self.extend_to(offset)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        self.len = self.len.max(offset + buf.len() as u64);
        Ok(())
    }

    /// Sync file contents to disk
    pub fn flush(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Current tracked length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path this file was opened at
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append zero bytes until the file is `new_len` bytes long
    fn extend_to(&mut self, new_len: u64) -> Result<()> {
        let zeros = [0u8; ZERO_CHUNK];
        self.file.seek(SeekFrom::End(0))?;

        let mut remaining = new_len - self.len;
        while remaining > 0 {
            let chunk = remaining.min(ZERO_CHUNK as u64) as usize;
            self.file.write_all(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }

        self.len = new_len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_file_and_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("area.db");

        let file = DurableFile::open(&path, false).unwrap();

        assert!(path.exists());
        assert_eq!(file.len(), 0);
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempdir().unwrap();
        let mut file = DurableFile::open(&dir.path().join("a.db"), false).unwrap();

        file.write(b"hello", 0).unwrap();

        let mut buf = [0u8; 5];
        assert!(file.read(&mut buf, 0).unwrap());
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_read_past_end_reports_failure() {
        let dir = tempdir().unwrap();
        let mut file = DurableFile::open(&dir.path().join("a.db"), false).unwrap();
        file.write(b"abcd", 0).unwrap();

        let mut buf = [0xFFu8; 4];
        assert!(!file.read(&mut buf, 2).unwrap());
        // Buffer must be untouched on a short read
        assert_eq!(buf, [0xFFu8; 4]);
    }

    #[test]
    fn test_write_past_end_zero_extends() {
        let dir = tempdir().unwrap();
        let mut file = DurableFile::open(&dir.path().join("a.db"), false).unwrap();

        file.write(b"xy", 10_000).unwrap();
        assert_eq!(file.len(), 10_002);

        let mut gap = [0xFFu8; 16];
        assert!(file.read(&mut gap, 100).unwrap());
        assert_eq!(gap, [0u8; 16]);
    }

    #[test]
    fn test_reopen_preserves_length_and_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.db");

        {
            let mut file = DurableFile::open(&path, false).unwrap();
            file.write(b"persist", 64).unwrap();
            file.flush().unwrap();
        }

        let mut file = DurableFile::open(&path, false).unwrap();
        assert_eq!(file.len(), 71);

        let mut buf = [0u8; 7];
        assert!(file.read(&mut buf, 64).unwrap());
        assert_eq!(&buf, b"persist");
    }

    #[test]
    fn test_truncate_discards_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.db");

        {
            let mut file = DurableFile::open(&path, false).unwrap();
            file.write(b"old data", 0).unwrap();
        }

        let file = DurableFile::open(&path, true).unwrap();
        assert_eq!(file.len(), 0);
    }
}
