//! SUMMARY:
//! The polymorphic storage contract and its backends.
//!
//! OVERVIEW:
//! Every backend implements [`Storage`]. Capabilities a backend lacks (listing on `Memory`,
//! binary access on `Adapter`, ...) keep the trait's default body, which fails with
//! `VfsError::Unsupported` instead of pretending to succeed.
//!
//! Backends:
//! - [`Disk`]: a `VfsPath` on the local filesystem, advisory locks around reads and writes.
//! - [`Memory`]: an in-process byte buffer.
//! - [`Stream`]: any `Read + Write + Seek` resource.
//! - [`Adapter`]: a path inside a pluggable [`FsAdapter`] filesystem ([`MemoryFs`] ships in-crate).
//!
//! Rule checks are not performed here; the `File`/`Directory` facades and `transfer` call
//! `check_constraints()` before they act.
use crate::binary::{AccessMode, BinaryHandle};
use crate::validator::{Constraint, Rules};
use crate::{Result, VfsError, VfsPath};
use std::any::Any;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::SystemTime;

pub mod adapter;
pub mod disk;
pub mod hash;
mod lock;
pub mod memory;
pub mod memory_fs;
pub mod mime;
pub mod stream;
pub mod transfer;

pub use adapter::{Adapter, AdapterEntry, AdapterMetadata, FsAdapter};
pub use disk::Disk;
pub use hash::{Digest, HashAlgorithm, HashTarget};
pub use memory::Memory;
pub use memory_fs::MemoryFs;
pub use stream::{Stream, StreamResource};

/// Which backend a storage is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Disk,
    Memory,
    Stream,
    Adapter,
}

impl StorageKind {
    pub fn name(self) -> &'static str {
        match self {
            StorageKind::Disk => "disk",
            StorageKind::Memory => "memory",
            StorageKind::Stream => "stream",
            StorageKind::Adapter => "adapter",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace the content.
    #[default]
    Truncate,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    None,
    /// Exclusive advisory lock held for the duration of the write.
    #[default]
    Advisory,
}

/// One child reported by `Storage::list`, before any storage is built for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: OsString,
    /// Native path for `Disk`, adapter path for `Adapter`.
    pub location: PathBuf,
    /// A real directory; symlinks to directories are `false`.
    pub is_dir: bool,
}

pub type ChildEntries = Box<dyn Iterator<Item = Result<ChildEntry>>>;

/// SUMMARY:
/// Capability contract shared by every backend.
///
/// DETAILS:
/// - `read` returns up to `len` bytes from `offset` (everything to the end when `len` is `None`);
///   a short result at end of content is not an error here. Fixed-size reads go through
///   `BinaryHandle`.
/// - `open_writer` truncates before handing out the writer.
/// - Directory operations and `binary` default to `Unsupported`.
pub trait Storage: fmt::Debug {
    fn kind(&self) -> StorageKind;

    /// Human readable label used in errors and logs.
    fn describe(&self) -> String;

    fn vfs_path(&self) -> Option<&VfsPath> {
        None
    }

    /// Final path component, when the storage has one.
    fn name(&self) -> Option<OsString> {
        self.vfs_path()
            .and_then(VfsPath::filename)
            .map(OsStr::to_os_string)
    }

    /// Location identifying this storage within its backend (native path, adapter path or uri).
    fn location(&self) -> Option<PathBuf> {
        self.vfs_path().map(|path| {
            path.real()
                .map(|real| real.to_path_buf())
                .unwrap_or_else(|| path.raw().to_path_buf())
        })
    }

    fn rules(&self) -> Rules;

    /// Replaces the rules and drops any cached verdict.
    fn set_rules(&mut self, rules: Rules);

    /// The constraint bound to this storage's path, `None` when there is nothing to check.
    fn constraint(&self) -> Option<&Constraint> {
        None
    }

    /// `Err(ConstraintViolation)` when the configured rules fail for this storage's path.
    fn check_constraints(&self) -> Result<()> {
        match self.constraint() {
            Some(constraint) => constraint.check(),
            None => Ok(()),
        }
    }

    /// Re-resolves the path and drops the cached verdict.
    fn reload(&mut self) {}

    fn exists(&self) -> bool;
    fn is_file(&self) -> bool;
    fn is_dir(&self) -> bool;
    fn is_symlink(&self) -> bool {
        false
    }
    fn is_readable(&self) -> bool;
    fn is_writeable(&self) -> bool;
    fn is_executable(&self) -> bool {
        false
    }

    fn read(&self, offset: u64, len: Option<usize>) -> Result<Vec<u8>>;

    /// Content split into lines (`\n` or `\r\n`), without terminators.
    fn read_lines(&self) -> Result<Vec<String>> {
        let bytes = self.read(0, None)?;
        let text = String::from_utf8(bytes).map_err(|_| {
            VfsError::InvalidValue(format!("{} is not valid UTF-8", self.describe()))
        })?;
        Ok(text.lines().map(str::to_owned).collect())
    }

    /// A reader over the whole content. Locks taken for it are released when it is dropped.
    fn open_reader(&self) -> Result<Box<dyn Read + '_>>;

    /// Copies the whole content into `out`; returns the byte count.
    fn stream_to(&self, out: &mut dyn Write) -> Result<u64> {
        let mut reader = self.open_reader()?;
        io::copy(&mut reader, out).map_err(|e| VfsError::io("stream", self.describe(), e))
    }

    fn write(&mut self, content: &[u8], mode: WriteMode, lock: LockMode) -> Result<()>;

    /// A writer replacing the content (created if missing).
    fn open_writer(&mut self) -> Result<Box<dyn Write + '_>>;

    fn remove(&mut self) -> Result<()>;

    /// Creates the target when missing, bumps its modification time otherwise.
    fn touch(&mut self) -> Result<()>;

    fn size(&self) -> Result<u64>;

    fn modified_time(&self) -> Result<SystemTime>;

    fn mime_type(&self) -> Result<String> {
        let head = self.read(0, Some(mime::SNIFF_LEN))?;
        let name = self.name();
        Ok(mime::detect(&head, name.as_deref()).to_string())
    }

    fn hash(&self, target: HashTarget, algorithm: HashAlgorithm) -> Result<Digest> {
        hash::digest_storage(self, target, algorithm)
    }

    fn list(&self) -> Result<ChildEntries> {
        Err(VfsError::unsupported(self.kind().name(), "list"))
    }

    /// Storage for the entry `name` inside this directory. Same backend, same rules.
    fn child(&self, name: &OsStr) -> Result<Box<dyn Storage>> {
        let _ = name;
        Err(VfsError::unsupported(self.kind().name(), "child"))
    }

    fn mkdir(&mut self, recursive: bool) -> Result<()> {
        let _ = recursive;
        Err(VfsError::unsupported(self.kind().name(), "mkdir"))
    }

    fn remove_dir(&mut self, recursive: bool) -> Result<()> {
        let _ = recursive;
        Err(VfsError::unsupported(self.kind().name(), "remove_dir"))
    }

    /// Moves this storage into the child directory `name` in place.
    fn cd(&mut self, name: &OsStr) -> Result<()> {
        let _ = name;
        Err(VfsError::unsupported(self.kind().name(), "cd"))
    }

    /// Storage `levels` directories up, keeping the safe root.
    fn parent(&self, levels: usize) -> Result<Box<dyn Storage>> {
        let _ = levels;
        Err(VfsError::unsupported(self.kind().name(), "parent"))
    }

    /// A closed binary handle; call `open()` on it before use.
    fn binary(&mut self, mode: AccessMode) -> Result<BinaryHandle<'_>> {
        let _ = mode;
        Err(VfsError::unsupported(self.kind().name(), "binary access"))
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests;
