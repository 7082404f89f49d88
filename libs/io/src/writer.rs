//! Transactional output stream.

use crate::StreamState;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::trace;

/// File-backed output stream that owns its offset.
///
/// Reopening never truncates: a restored writer continues exactly where the
/// departed copy stopped, so bytes written before migration are preserved.
#[derive(Debug)]
pub struct TransactionalWriter {
    path: PathBuf,
    offset: u64,
    file: Option<File>,
    needs_reattach: bool,
}

impl TransactionalWriter {
    /// Create a writer positioned at the start of `path`. The target file is
    /// created on first write if absent.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            file: None,
            needs_reattach: false,
        }
    }

    /// Rebuild a writer from a migrated snapshot; the first write
    /// reattaches at the saved offset.
    pub fn restore(state: StreamState) -> Self {
        Self {
            path: state.path,
            offset: state.offset,
            file: None,
            needs_reattach: true,
        }
    }

    /// Plain-data record of this stream for serialization.
    pub fn snapshot(&self) -> StreamState {
        StreamState {
            path: self.path.clone(),
            offset: self.offset,
        }
    }

    /// Flag the current handle as stale. Idempotent; the next write performs
    /// the reopen-and-seek.
    pub fn mark_needs_reattachment(&mut self) {
        self.needs_reattach = true;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    async fn attach(&mut self) -> io::Result<&mut File> {
        if self.needs_reattach {
            self.file = None;
            self.needs_reattach = false;
        }
        match self.file {
            Some(ref mut file) => Ok(file),
            None => {
                let mut file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .open(&self.path)
                    .await?;
                file.seek(SeekFrom::Start(self.offset)).await?;
                trace!(path = %self.path.display(), offset = self.offset, "writer attached");
                Ok(self.file.insert(file))
            }
        }
    }

    /// Write one byte at the current offset.
    pub async fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_all(&[byte]).await
    }

    /// Write a full buffer; the offset advances by exactly `buf.len()` on
    /// success.
    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let file = self.attach().await?;
        file.write_all(buf).await?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Write `line` followed by a newline and flush, so partial output is
    /// visible to readers while the owning unit is still running.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_all(line.as_bytes()).await?;
        self.write_byte(b'\n').await?;
        self.flush().await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        match self.file {
            Some(ref mut file) => file.flush().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_bytes_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out");
        let mut writer = TransactionalWriter::new(&path);

        writer.write_all(b"hello ").await.unwrap();
        writer.write_all(b"world").await.unwrap();
        writer.flush().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
        assert_eq!(writer.offset(), 11);
    }

    #[tokio::test]
    async fn offset_fidelity_across_reattachments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out");
        let mut writer = TransactionalWriter::new(&path);

        let contents: Vec<u8> = (0..128).collect();
        for (i, byte) in contents.iter().enumerate() {
            if i % 11 == 0 {
                writer.mark_needs_reattachment();
            }
            writer.write_byte(*byte).await.unwrap();
        }
        writer.flush().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), contents);
    }

    #[tokio::test]
    async fn restore_does_not_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out");

        let mut writer = TransactionalWriter::new(&path);
        writer.write_line("first").await.unwrap();
        let state = writer.snapshot();
        drop(writer);

        let mut restored = TransactionalWriter::restore(state);
        restored.write_line("second").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"first\nsecond\n");
    }

    #[tokio::test]
    async fn creates_missing_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh");
        let mut writer = TransactionalWriter::new(&path);
        writer.write_line("created").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"created\n");
    }
}
