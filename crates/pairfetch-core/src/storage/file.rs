//! Sequential writer for one job's output, with drop-time cleanup.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{temp_path, PartialPolicy};

const WRITE_BUFFER: usize = 64 * 1024;

/// Output file of a single job. Dropping it without `commit` applies the
/// failure side of the `PartialPolicy`; the handle is closed on every path.
pub struct DownloadFile {
    writer: Option<BufWriter<File>>,
    write_path: PathBuf,
    destination: PathBuf,
    policy: PartialPolicy,
    bytes_written: u64,
    committed: bool,
}

impl DownloadFile {
    /// Create (or truncate) the file the body will be written into:
    /// `<destination>.part` under `TempRename`, the destination itself otherwise.
    pub fn create(destination: &Path, policy: PartialPolicy) -> io::Result<Self> {
        let write_path = match policy {
            PartialPolicy::TempRename => temp_path(destination),
            PartialPolicy::Delete | PartialPolicy::Keep => destination.to_path_buf(),
        };
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&write_path)?;
        Ok(DownloadFile {
            writer: Some(BufWriter::with_capacity(WRITE_BUFFER, file)),
            write_path,
            destination: destination.to_path_buf(),
            policy,
            bytes_written: 0,
            committed: false,
        })
    }

    /// Append `data` at the current end of the file.
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(closed)?;
        writer.write_all(data)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flush buffered bytes and sync file data to disk.
    pub fn finish(&mut self) -> io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(closed)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Close the file and, under `TempRename`, atomically rename it onto the
    /// destination (replacing any previous file). Call `finish` first.
    pub fn commit(mut self) -> io::Result<()> {
        drop(self.writer.take());
        if self.write_path != self.destination {
            std::fs::rename(&self.write_path, &self.destination)?;
        }
        self.committed = true;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Path currently receiving bytes.
    pub fn write_path(&self) -> &Path {
        &self.write_path
    }
}

impl Drop for DownloadFile {
    fn drop(&mut self) {
        // Closing first so the file is not deleted while still open.
        drop(self.writer.take());
        if self.committed || self.policy == PartialPolicy::Keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.write_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.write_path.display(), "failed to remove partial file: {}", e);
            }
        } else {
            tracing::debug!(path = %self.write_path.display(), "removed partial file");
        }
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "download file already closed")
}
