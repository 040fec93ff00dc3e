use super::lock::LockedFile;
use super::{ChildEntries, ChildEntry, LockMode, Storage, StorageKind, WriteMode};
use crate::binary::{AccessMode, BinaryHandle};
use crate::error::path_label;
use crate::validator::{Constraint, Rules};
use crate::{PathPart, Result, VfsError, VfsPath};
use std::any::Any;
use std::cell::OnceCell;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const TEMP_PREFIX: &str = "strict-vfs-";

/// SUMMARY:
/// Storage on the local filesystem, addressed by a `VfsPath`.
///
/// DETAILS:
/// - Reads take a shared advisory lock and writes an exclusive one (unless `LockMode::None`);
///   locks are released when the call returns, on every path.
/// - Type and permission queries look at the filesystem live; the `VfsPath` snapshot is
///   reloaded after operations that create or delete the target.
/// - With remove-on-free set, the file or directory tree is deleted best-effort on drop.
///
/// EXAMPLE:
/// ```rust
/// # use strict_vfs::{Disk, LockMode, Storage, WriteMode};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let mut disk = Disk::new([dir.path().as_os_str(), "notes.txt".as_ref()])?;
/// disk.write(b"hello", WriteMode::Truncate, LockMode::Advisory)?;
/// assert_eq!(disk.read(0, None)?, b"hello");
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Disk {
    path: VfsPath,
    rules: Rules,
    constraint: OnceCell<Constraint>,
    remove_on_free: bool,
}

impl Disk {
    /// ERRORS:
    /// - `InvalidValue`: see `VfsPath::new`.
    pub fn new<I>(parts: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<PathPart>,
    {
        Ok(Self::from_path(VfsPath::new(parts)?))
    }

    pub fn from_path(path: VfsPath) -> Self {
        Self {
            path,
            rules: Rules::default(),
            constraint: OnceCell::new(),
            remove_on_free: false,
        }
    }

    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.set_rules(rules);
        self
    }

    /// A new empty file in the system temp directory, deleted when this storage is dropped.
    pub fn temp() -> Result<Self> {
        let named = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile()
            .map_err(|e| VfsError::io("create temp file", "<temp>", e))?;
        let (_file, path) = named
            .keep()
            .map_err(|e| VfsError::io("keep temp file", "<temp>", e.error))?;
        tracing::debug!(path = %path.display(), "created temp file");
        let mut disk = Self::new([path])?;
        disk.remove_on_free = true;
        Ok(disk)
    }

    /// A new empty directory in the system temp directory, removed recursively on drop.
    pub fn temp_dir() -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir()
            .map_err(|e| VfsError::io("create temp dir", "<temp>", e))?
            .keep();
        tracing::debug!(path = %path.display(), "created temp directory");
        let mut disk = Self::new([path])?;
        disk.remove_on_free = true;
        Ok(disk)
    }

    pub fn remove_on_free(&self) -> bool {
        self.remove_on_free
    }

    pub fn set_remove_on_free(&mut self, remove: bool) {
        self.remove_on_free = remove;
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    fn target(&self) -> &Path {
        self.path.raw()
    }

    fn label(&self) -> String {
        path_label(self.target())
    }

    fn io_err(&self, operation: &'static str) -> impl FnOnce(io::Error) -> VfsError + '_ {
        move |e| VfsError::io(operation, self.label(), e)
    }

    fn refresh(&mut self) {
        self.path.reload();
        self.constraint = OnceCell::new();
    }

    fn require_file(&self) -> Result<()> {
        if self.target().is_dir() {
            return Err(VfsError::wrong_type(self.label(), "file"));
        }
        if !self.target().exists() {
            return Err(VfsError::not_found(self.label()));
        }
        Ok(())
    }

    fn require_dir(&self) -> Result<()> {
        if !self.target().exists() {
            return Err(VfsError::not_found(self.label()));
        }
        if !self.target().is_dir() {
            return Err(VfsError::wrong_type(self.label(), "directory"));
        }
        Ok(())
    }

    fn open_locked_read(&self) -> Result<LockedFile> {
        self.require_file()?;
        let file = File::open(self.target()).map_err(self.io_err("open"))?;
        LockedFile::shared(file, &self.label())
    }

    fn open_locked_write(&self, append: bool, lock: LockMode) -> Result<LockedFile> {
        if self.target().is_dir() {
            return Err(VfsError::wrong_type(self.label(), "file"));
        }
        // Never truncate on open: another holder may still own the lock.
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .open(self.target())
            .map_err(self.io_err("open for writing"))?;
        let locked = match lock {
            LockMode::Advisory => LockedFile::exclusive(file, &self.label())?,
            LockMode::None => LockedFile::unlocked(file),
        };
        if !append {
            locked.file().set_len(0).map_err(self.io_err("truncate"))?;
        }
        Ok(locked)
    }
}

/// Deletes a tree depth-first: files and symlinks first, then the emptied directory.
pub(crate) fn remove_tree(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            remove_tree(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    fs::remove_dir(dir)
}

impl From<&Disk> for PathPart {
    fn from(value: &Disk) -> Self {
        PathPart::Path(value.path.clone())
    }
}

impl Storage for Disk {
    fn kind(&self) -> StorageKind {
        StorageKind::Disk
    }

    fn describe(&self) -> String {
        self.label()
    }

    fn vfs_path(&self) -> Option<&VfsPath> {
        Some(&self.path)
    }

    fn rules(&self) -> Rules {
        self.rules
    }

    fn set_rules(&mut self, rules: Rules) {
        self.rules = rules;
        self.constraint = OnceCell::new();
    }

    fn constraint(&self) -> Option<&Constraint> {
        Some(
            self.constraint
                .get_or_init(|| Constraint::new(self.rules, self.path.clone())),
        )
    }

    fn reload(&mut self) {
        self.refresh();
    }

    fn exists(&self) -> bool {
        fs::symlink_metadata(self.target()).is_ok()
    }

    fn is_file(&self) -> bool {
        self.target().is_file()
    }

    fn is_dir(&self) -> bool {
        self.target().is_dir()
    }

    fn is_symlink(&self) -> bool {
        self.target().is_symlink()
    }

    fn is_readable(&self) -> bool {
        if self.is_dir() {
            fs::read_dir(self.target()).is_ok()
        } else {
            File::open(self.target()).is_ok()
        }
    }

    fn is_writeable(&self) -> bool {
        match fs::metadata(self.target()) {
            Ok(meta) => !meta.permissions().readonly(),
            // A missing target is writeable when its directory is.
            Err(_) => self
                .target()
                .parent()
                .map(|parent| if parent.as_os_str().is_empty() { Path::new(".") } else { parent })
                .and_then(|parent| fs::metadata(parent).ok())
                .is_some_and(|meta| meta.is_dir() && !meta.permissions().readonly()),
        }
    }

    #[cfg(unix)]
    fn is_executable(&self) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(self.target())
            .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
    }

    #[cfg(not(unix))]
    fn is_executable(&self) -> bool {
        self.is_file()
            && self
                .target()
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| {
                    ["exe", "bat", "cmd", "com"]
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
    }

    fn read(&self, offset: u64, len: Option<usize>) -> Result<Vec<u8>> {
        let mut locked = self.open_locked_read()?;
        locked
            .seek(SeekFrom::Start(offset))
            .map_err(self.io_err("seek"))?;
        let mut out = Vec::new();
        let outcome = match len {
            Some(len) => (&mut locked).take(len as u64).read_to_end(&mut out),
            None => locked.read_to_end(&mut out),
        };
        outcome.map_err(self.io_err("read"))?;
        tracing::trace!(target_path = %self.label(), offset, bytes = out.len(), "disk read");
        Ok(out)
    }

    fn open_reader(&self) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.open_locked_read()?))
    }

    fn write(&mut self, content: &[u8], mode: WriteMode, lock: LockMode) -> Result<()> {
        let existed = self.exists();
        {
            let mut locked = self.open_locked_write(mode == WriteMode::Append, lock)?;
            locked.write_all(content).map_err(self.io_err("write"))?;
            locked.flush().map_err(self.io_err("flush"))?;
        }
        tracing::debug!(target_path = %self.label(), bytes = content.len(), ?mode, "disk write");
        if !existed {
            self.refresh();
        }
        Ok(())
    }

    fn open_writer(&mut self) -> Result<Box<dyn Write + '_>> {
        let locked = self.open_locked_write(false, LockMode::Advisory)?;
        self.refresh();
        Ok(Box::new(locked))
    }

    fn remove(&mut self) -> Result<()> {
        if self.target().is_dir() && !self.is_symlink() {
            return Err(VfsError::wrong_type(self.label(), "file"));
        }
        fs::remove_file(self.target()).map_err(self.io_err("remove"))?;
        tracing::debug!(target_path = %self.label(), "removed file");
        self.refresh();
        Ok(())
    }

    fn touch(&mut self) -> Result<()> {
        if self.is_dir() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.target())
            .map_err(self.io_err("touch"))?;
        file.set_modified(SystemTime::now())
            .map_err(self.io_err("touch"))?;
        self.refresh();
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        self.require_file()?;
        Ok(fs::metadata(self.target())
            .map_err(self.io_err("stat"))?
            .len())
    }

    fn modified_time(&self) -> Result<SystemTime> {
        fs::metadata(self.target())
            .and_then(|meta| meta.modified())
            .map_err(self.io_err("stat"))
    }

    fn list(&self) -> Result<ChildEntries> {
        self.require_dir()?;
        let label = self.label();
        let entries = fs::read_dir(self.target()).map_err(self.io_err("list"))?;
        Ok(Box::new(entries.map(move |entry| {
            let entry = entry.map_err(|e| VfsError::io("list", label.clone(), e))?;
            // Symlinks are reported but never counted as directories to descend into.
            let file_type = entry
                .file_type()
                .map_err(|e| VfsError::io("list", label.clone(), e))?;
            Ok(ChildEntry {
                name: entry.file_name(),
                is_dir: file_type.is_dir(),
                location: entry.path(),
            })
        })))
    }

    fn child(&self, name: &OsStr) -> Result<Box<dyn Storage>> {
        let mut child = Disk::from_path(self.path.join(name)?);
        child.rules = self.rules;
        Ok(Box::new(child))
    }

    fn mkdir(&mut self, recursive: bool) -> Result<()> {
        let outcome = if recursive {
            fs::create_dir_all(self.target())
        } else {
            fs::create_dir(self.target())
        };
        outcome.map_err(self.io_err("mkdir"))?;
        tracing::debug!(target_path = %self.label(), recursive, "created directory");
        self.refresh();
        Ok(())
    }

    fn remove_dir(&mut self, recursive: bool) -> Result<()> {
        self.require_dir()?;
        let outcome = if recursive {
            remove_tree(self.target())
        } else {
            fs::remove_dir(self.target())
        };
        outcome.map_err(self.io_err("remove directory"))?;
        tracing::debug!(target_path = %self.label(), recursive, "removed directory");
        self.refresh();
        Ok(())
    }

    fn cd(&mut self, name: &OsStr) -> Result<()> {
        let next = self.path.join(name)?;
        if !next.raw().is_dir() {
            return Err(VfsError::wrong_type(path_label(next.raw()), "directory"));
        }
        self.path = next;
        self.constraint = OnceCell::new();
        Ok(())
    }

    fn parent(&self, levels: usize) -> Result<Box<dyn Storage>> {
        let mut parent = Disk::from_path(self.path.parent(levels));
        parent.rules = self.rules;
        Ok(Box::new(parent))
    }

    fn binary(&mut self, mode: AccessMode) -> Result<BinaryHandle<'_>> {
        Ok(BinaryHandle::for_disk(PathBuf::from(self.target()), mode))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for Disk {
    fn drop(&mut self) {
        if !self.remove_on_free {
            return;
        }
        let target = self.target().to_path_buf();
        let outcome = match fs::symlink_metadata(&target) {
            Ok(meta) if meta.is_dir() => remove_tree(&target),
            Ok(_) => fs::remove_file(&target),
            Err(_) => Ok(()),
        };
        match outcome {
            Ok(()) => tracing::debug!(path = %target.display(), "removed temp storage"),
            Err(err) => {
                tracing::debug!(path = %target.display(), error = %err, "temp cleanup failed")
            }
        }
    }
}
