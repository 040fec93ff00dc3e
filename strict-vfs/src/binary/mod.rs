//! SUMMARY:
//! Fixed-mode, position-tracked binary access over `Disk` and `Memory` storage.
//!
//! OVERVIEW:
//! A [`BinaryHandle`] is bound to one access mode for its whole life. On open it records a
//! snapshot (size, cursor position and, for disk files, the modification time). Every read
//! re-checks the snapshot first; if the file changed underneath the handle the read fails with
//! `VfsError::Stale` instead of returning data that may be inconsistent.
use crate::error::path_label;
use crate::{Result, VfsError};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    /// Truncates the target on open.
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Closed,
    Reading,
    Writing,
}

#[derive(Debug)]
enum Backing<'a> {
    Disk { path: PathBuf, file: Option<File> },
    Memory { buffer: &'a mut Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    size: u64,
    modified: Option<SystemTime>,
}

/// SUMMARY:
/// A TOCTOU-resistant binary handle.
///
/// DETAILS:
/// - `Closed → Reading | Writing`; the first `read`/`write` opens implicitly, and using the other
///   mode fails with `AccessDenied`.
/// - `read(len)` never returns a short buffer: a request past the recorded end fails with
///   `ReadPastEnd`.
/// - `write` retries partial writes until everything landed.
///
/// EXAMPLE:
/// ```rust
/// # use strict_vfs::{AccessMode, Memory, Storage};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut memory = Memory::new(b"abcdef".to_vec());
/// let mut handle = memory.binary(AccessMode::Read)?;
/// assert_eq!(handle.read(4)?, b"abcd");
/// assert_eq!(handle.remaining_bytes(), 2);
/// assert!(handle.read(3).is_err());
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct BinaryHandle<'a> {
    backing: Backing<'a>,
    mode: AccessMode,
    state: HandleState,
    position: u64,
    snapshot: Option<Snapshot>,
    label: String,
}

impl<'a> BinaryHandle<'a> {
    pub(crate) fn for_disk(path: PathBuf, mode: AccessMode) -> Self {
        let label = path_label(&path);
        Self {
            backing: Backing::Disk { path, file: None },
            mode,
            state: HandleState::Closed,
            position: 0,
            snapshot: None,
            label,
        }
    }

    pub(crate) fn for_memory(buffer: &'a mut Vec<u8>, mode: AccessMode) -> Self {
        Self {
            backing: Backing::Memory { buffer },
            mode,
            state: HandleState::Closed,
            position: 0,
            snapshot: None,
            label: "memory buffer".to_string(),
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Size recorded at open (grown by writes); `None` while closed.
    pub fn snapshot_size(&self) -> Option<u64> {
        self.snapshot.map(|s| s.size)
    }

    /// Opens the handle in its mode. A no-op when already open.
    pub fn open(&mut self) -> Result<()> {
        if self.state != HandleState::Closed {
            return Ok(());
        }
        let mode = self.mode;
        let label = self.label.clone();
        let snapshot = match &mut self.backing {
            Backing::Disk { path, file } => {
                let opened = match mode {
                    AccessMode::Read => File::open(&*path),
                    AccessMode::Write => OpenOptions::new()
                        .create(true)
                        .write(true)
                        .truncate(true)
                        .open(&*path),
                }
                .map_err(|e| VfsError::io("open", label.clone(), e))?;
                let meta = opened
                    .metadata()
                    .map_err(|e| VfsError::io("stat", label.clone(), e))?;
                *file = Some(opened);
                Snapshot {
                    size: meta.len(),
                    modified: meta.modified().ok(),
                }
            }
            Backing::Memory { buffer } => {
                if mode == AccessMode::Write {
                    buffer.clear();
                }
                Snapshot {
                    size: buffer.len() as u64,
                    modified: None,
                }
            }
        };
        self.snapshot = Some(snapshot);
        self.position = 0;
        self.state = match mode {
            AccessMode::Read => HandleState::Reading,
            AccessMode::Write => HandleState::Writing,
        };
        tracing::trace!(target_path = %self.label, ?mode, size = snapshot.size, "binary handle opened");
        Ok(())
    }

    fn require(&mut self, wanted: AccessMode) -> Result<Snapshot> {
        if self.mode != wanted {
            return Err(VfsError::access_denied(
                self.label.clone(),
                format!("handle is open for {:?}, not {:?}", self.mode, wanted),
            ));
        }
        self.open()?;
        self.snapshot
            .ok_or_else(|| VfsError::Runtime(format!("{}: handle has no snapshot", self.label)))
    }

    // The file must still look exactly as it did at open.
    fn verify_unchanged(&mut self, snapshot: Snapshot) -> Result<()> {
        let position = self.position;
        let label = self.label.clone();
        let (size, modified, cursor) = match &mut self.backing {
            Backing::Disk { file: Some(file), .. } => {
                let meta = file
                    .metadata()
                    .map_err(|e| VfsError::io("stat", label.clone(), e))?;
                let cursor = file
                    .stream_position()
                    .map_err(|e| VfsError::io("seek", label.clone(), e))?;
                (meta.len(), meta.modified().ok(), cursor)
            }
            Backing::Disk { file: None, .. } => {
                return Err(VfsError::Runtime(format!("{label}: no open handle")))
            }
            Backing::Memory { buffer } => (buffer.len() as u64, None, position),
        };
        if size != snapshot.size {
            return Err(VfsError::stale(
                label,
                format!("size changed from {} to {size}", snapshot.size),
            ));
        }
        if cursor != position {
            return Err(VfsError::stale(
                label,
                format!("cursor moved from {position} to {cursor}"),
            ));
        }
        if modified != snapshot.modified {
            return Err(VfsError::stale(label, "modification time changed"));
        }
        Ok(())
    }

    /// SUMMARY:
    /// Read exactly `len` bytes at the cursor.
    ///
    /// ERRORS:
    /// - `AccessDenied`: the handle is a write handle.
    /// - `ReadPastEnd`: fewer than `len` bytes remain according to the snapshot.
    /// - `Stale`: the file's size, cursor or modification time no longer match the snapshot.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let snapshot = self.require(AccessMode::Read)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let end = self.position.saturating_add(len as u64);
        if end > snapshot.size {
            return Err(VfsError::ReadPastEnd {
                target: self.label.clone(),
                position: self.position,
                requested: len as u64,
                size: snapshot.size,
            });
        }
        self.verify_unchanged(snapshot)?;

        let mut out = vec![0u8; len];
        match &mut self.backing {
            Backing::Disk { file: Some(file), .. } => {
                file.read_exact(&mut out)
                    .map_err(|e| VfsError::io("read", self.label.clone(), e))?;
            }
            Backing::Disk { file: None, .. } => {
                return Err(VfsError::Runtime(format!("{}: no open handle", self.label)))
            }
            Backing::Memory { buffer } => {
                let start = memory_offset(self.position, &self.label)?;
                out.copy_from_slice(&buffer[start..start + len]);
            }
        }
        self.position = end;
        Ok(out)
    }

    /// SUMMARY:
    /// Write all of `bytes` at the cursor, retrying partial writes.
    ///
    /// ERRORS:
    /// - `AccessDenied`: the handle is a read handle.
    /// - `Io` (`Runtime`): the target accepted zero bytes or the write failed.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut snapshot = self.require(AccessMode::Write)?;
        let label = self.label.clone();
        let mut written = 0usize;
        match &mut self.backing {
            Backing::Disk { file: Some(file), .. } => {
                while written < bytes.len() {
                    match file.write(&bytes[written..]) {
                        Ok(0) => {
                            return Err(VfsError::io(
                                "write",
                                label,
                                io::Error::new(io::ErrorKind::WriteZero, "no bytes accepted"),
                            ))
                        }
                        Ok(n) => {
                            written += n;
                            self.position += n as u64;
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(VfsError::io("write", label, e)),
                    }
                }
                file.flush()
                    .map_err(|e| VfsError::io("flush", label.clone(), e))?;
                let meta = file
                    .metadata()
                    .map_err(|e| VfsError::io("stat", label.clone(), e))?;
                snapshot.modified = meta.modified().ok();
            }
            Backing::Disk { file: None, .. } => {
                return Err(VfsError::Runtime(format!("{label}: no open handle")))
            }
            Backing::Memory { buffer } => {
                let start = memory_offset(self.position, &label)?;
                let end = start.checked_add(bytes.len()).ok_or_else(|| {
                    VfsError::InvalidValue(format!("{label}: write would overflow the buffer"))
                })?;
                if end > buffer.len() {
                    buffer.try_reserve(end - buffer.len()).map_err(|e| {
                        VfsError::InvalidValue(format!("{label}: cannot grow buffer to {end}: {e}"))
                    })?;
                }
                // The gap left by a seek past the end reads back as zeroes.
                if start > buffer.len() {
                    buffer.resize(start, 0);
                }
                let overlap = buffer.len().saturating_sub(start).min(bytes.len());
                buffer[start..start + overlap].copy_from_slice(&bytes[..overlap]);
                buffer.extend_from_slice(&bytes[overlap..]);
                written = bytes.len();
                self.position += written as u64;
            }
        }
        snapshot.size = snapshot.size.max(self.position);
        self.snapshot = Some(snapshot);
        Ok(written)
    }

    /// Bytes between the cursor and the recorded end; zero when closed or past the end.
    pub fn remaining_bytes(&self) -> u64 {
        self.snapshot
            .map_or(0, |s| s.size.saturating_sub(self.position))
    }

    /// Moves the cursor. Fails when the handle has not been opened.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if self.state == HandleState::Closed {
            return Err(VfsError::Runtime(format!(
                "{}: seek on a handle that is not open",
                self.label
            )));
        }
        match &mut self.backing {
            Backing::Disk { file: Some(file), .. } => {
                file.seek(SeekFrom::Start(position))
                    .map_err(|e| VfsError::io("seek", self.label.clone(), e))?;
            }
            Backing::Disk { file: None, .. } => {
                return Err(VfsError::Runtime(format!("{}: no open handle", self.label)))
            }
            Backing::Memory { .. } => {
                // A write handle may seek past the end; the gap is zero-filled on write.
                memory_offset(position, &self.label)?;
            }
        }
        self.position = position;
        Ok(())
    }
}

fn memory_offset(position: u64, label: &str) -> Result<usize> {
    usize::try_from(position).map_err(|_| {
        VfsError::InvalidValue(format!("{label}: offset {position} does not fit in memory"))
    })
}
