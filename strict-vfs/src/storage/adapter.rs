use super::{ChildEntries, ChildEntry, LockMode, Storage, StorageKind, WriteMode};
use crate::path::path_history::{PathHistory, Raw};
use crate::validator::Rules;
use crate::{Result, VfsError};
use std::any::Any;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Metadata an adapter reports for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterMetadata {
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
    pub readonly: bool,
}

/// One entry of an adapter directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterEntry {
    pub name: OsString,
    pub is_dir: bool,
}

/// SUMMARY:
/// A pluggable filesystem behind `Adapter` storage.
///
/// DETAILS:
/// Paths handed to the adapter are absolute within the adapter's own namespace (`/a/b`), already
/// clamped so `..` cannot climb above `/`. Implementations report failures as `io::Error`; the
/// storage layer maps them onto `VfsError`.
pub trait FsAdapter: fmt::Debug + Send + Sync {
    /// Short identifier used in errors and logs.
    fn name(&self) -> &str;

    fn metadata(&self, path: &Path) -> io::Result<AdapterMetadata>;

    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn read_range(&self, path: &Path, offset: u64, len: Option<usize>) -> io::Result<Vec<u8>> {
        let data = self.read(path)?;
        let start = usize::try_from(offset).map_or(data.len(), |o| o.min(data.len()));
        let end = len.map_or(data.len(), |len| start.saturating_add(len).min(data.len()));
        Ok(data[start..end].to_vec())
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.read(path)?)))
    }

    /// Creates or replaces the file.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// A writer that creates or replaces the file.
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn read_dir(&self, path: &Path) -> io::Result<Vec<AdapterEntry>>;

    fn create_dir(&self, path: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Creates an empty file when missing, bumps its modification time otherwise.
    fn touch(&self, path: &Path) -> io::Result<()>;
}

/// SUMMARY:
/// Storage at one path inside an `FsAdapter`.
///
/// DETAILS:
/// The adapter is trusted by construction: rules are carried but there is nothing to check, so
/// `constraint()` is `None`. Appending and binary access are unsupported.
#[derive(Debug, Clone)]
pub struct Adapter {
    fs: Arc<dyn FsAdapter>,
    path: PathBuf,
    rules: Rules,
}

impl Adapter {
    /// `path` is clamped into the adapter root: `..` never climbs above `/`.
    pub fn new(fs: Arc<dyn FsAdapter>, path: impl AsRef<Path>) -> Self {
        Self {
            fs,
            path: PathHistory::<Raw>::new(path.as_ref()).clamp().into_inner(),
            rules: Rules::default(),
        }
    }

    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    pub fn fs(&self) -> &Arc<dyn FsAdapter> {
        &self.fs
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when both storages sit on the same adapter instance.
    pub fn same_adapter(&self, other: &Adapter) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.fs), Arc::as_ptr(&other.fs))
    }

    pub(crate) fn with_path(&self, path: impl AsRef<Path>) -> Self {
        Self {
            fs: Arc::clone(&self.fs),
            path: PathHistory::<Raw>::new(path.as_ref()).clamp().into_inner(),
            rules: self.rules,
        }
    }

    fn label(&self) -> String {
        format!("{}:{}", self.fs.name(), self.path.display())
    }

    fn io_err(&self, operation: &'static str) -> impl FnOnce(io::Error) -> VfsError + '_ {
        move |e| VfsError::io(operation, self.label(), e)
    }

    fn metadata(&self) -> Result<AdapterMetadata> {
        self.fs.metadata(&self.path).map_err(self.io_err("stat"))
    }
}

impl Storage for Adapter {
    fn kind(&self) -> StorageKind {
        StorageKind::Adapter
    }

    fn describe(&self) -> String {
        self.label()
    }

    fn name(&self) -> Option<OsString> {
        self.path.file_name().map(OsStr::to_os_string)
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn rules(&self) -> Rules {
        self.rules
    }

    fn set_rules(&mut self, rules: Rules) {
        self.rules = rules;
    }

    fn exists(&self) -> bool {
        self.fs.exists(&self.path)
    }

    fn is_file(&self) -> bool {
        self.fs.metadata(&self.path).is_ok_and(|meta| !meta.is_dir)
    }

    fn is_dir(&self) -> bool {
        self.fs.metadata(&self.path).is_ok_and(|meta| meta.is_dir)
    }

    fn is_readable(&self) -> bool {
        self.exists()
    }

    fn is_writeable(&self) -> bool {
        match self.fs.metadata(&self.path) {
            Ok(meta) => !meta.readonly,
            Err(_) => self
                .path
                .parent()
                .and_then(|parent| self.fs.metadata(parent).ok())
                .is_some_and(|meta| meta.is_dir && !meta.readonly),
        }
    }

    fn read(&self, offset: u64, len: Option<usize>) -> Result<Vec<u8>> {
        self.fs
            .read_range(&self.path, offset, len)
            .map_err(self.io_err("read"))
    }

    fn open_reader(&self) -> Result<Box<dyn Read + '_>> {
        let reader = self.fs.open_read(&self.path).map_err(self.io_err("open"))?;
        Ok(reader)
    }

    fn write(&mut self, content: &[u8], mode: WriteMode, _lock: LockMode) -> Result<()> {
        if mode == WriteMode::Append {
            return Err(VfsError::unsupported("adapter", "append"));
        }
        self.fs
            .write(&self.path, content)
            .map_err(self.io_err("write"))?;
        tracing::debug!(adapter = self.fs.name(), path = %self.path.display(), bytes = content.len(), "adapter write");
        Ok(())
    }

    fn open_writer(&mut self) -> Result<Box<dyn Write + '_>> {
        let writer = self.fs.open_write(&self.path).map_err(self.io_err("open"))?;
        Ok(writer)
    }

    fn remove(&mut self) -> Result<()> {
        if self.is_dir() {
            return Err(VfsError::wrong_type(self.label(), "file"));
        }
        self.fs
            .remove_file(&self.path)
            .map_err(self.io_err("remove"))
    }

    fn touch(&mut self) -> Result<()> {
        self.fs.touch(&self.path).map_err(self.io_err("touch"))
    }

    fn size(&self) -> Result<u64> {
        let meta = self.metadata()?;
        if meta.is_dir {
            return Err(VfsError::wrong_type(self.label(), "file"));
        }
        Ok(meta.len)
    }

    fn modified_time(&self) -> Result<SystemTime> {
        self.metadata()?.modified.ok_or_else(|| {
            VfsError::io(
                "stat",
                self.label(),
                io::Error::new(io::ErrorKind::Unsupported, "no modification time"),
            )
        })
    }

    fn list(&self) -> Result<ChildEntries> {
        if !self.is_dir() {
            return Err(if self.exists() {
                VfsError::wrong_type(self.label(), "directory")
            } else {
                VfsError::not_found(self.label())
            });
        }
        let entries = self.fs.read_dir(&self.path).map_err(self.io_err("list"))?;
        let base = self.path.clone();
        Ok(Box::new(entries.into_iter().map(move |entry| {
            Ok(ChildEntry {
                location: base.join(&entry.name),
                name: entry.name,
                is_dir: entry.is_dir,
            })
        })))
    }

    fn child(&self, name: &OsStr) -> Result<Box<dyn Storage>> {
        Ok(Box::new(self.with_path(self.path.join(name))))
    }

    fn mkdir(&mut self, recursive: bool) -> Result<()> {
        let outcome = if recursive {
            self.fs.create_dir_all(&self.path)
        } else {
            self.fs.create_dir(&self.path)
        };
        outcome.map_err(self.io_err("mkdir"))
    }

    fn remove_dir(&mut self, recursive: bool) -> Result<()> {
        let outcome = if recursive {
            self.fs.remove_dir_all(&self.path)
        } else {
            self.fs.remove_dir(&self.path)
        };
        outcome.map_err(self.io_err("remove directory"))
    }

    fn cd(&mut self, name: &OsStr) -> Result<()> {
        let next = self.with_path(self.path.join(name));
        if !next.is_dir() {
            return Err(VfsError::wrong_type(next.label(), "directory"));
        }
        self.path = next.path;
        Ok(())
    }

    fn parent(&self, levels: usize) -> Result<Box<dyn Storage>> {
        let mut up = self.path.clone();
        for _ in 0..levels {
            up.push("..");
        }
        Ok(Box::new(self.with_path(up)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
