use crate::{Result, VfsError};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A file handle holding an advisory lock until dropped.
#[derive(Debug)]
pub(crate) struct LockedFile {
    file: File,
    locked: bool,
}

impl LockedFile {
    pub(crate) fn shared(file: File, target: &str) -> Result<Self> {
        file.lock_shared()
            .map_err(|e| VfsError::access_denied(target, format!("shared lock failed: {e}")))?;
        Ok(Self { file, locked: true })
    }

    pub(crate) fn exclusive(file: File, target: &str) -> Result<Self> {
        file.lock()
            .map_err(|e| VfsError::access_denied(target, format!("exclusive lock failed: {e}")))?;
        Ok(Self { file, locked: true })
    }

    pub(crate) fn unlocked(file: File) -> Self {
        Self {
            file,
            locked: false,
        }
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if self.locked {
            if let Err(err) = self.file.unlock() {
                tracing::debug!(error = %err, "advisory unlock failed");
            }
        }
    }
}

impl Read for LockedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LockedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LockedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
