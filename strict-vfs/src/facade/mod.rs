//! SUMMARY:
//! `File` and `Directory`: rule-gated handles over any storage.
//!
//! OVERVIEW:
//! A facade owns one boxed [`Storage`] and re-checks its rules before every operation, so a
//! failing path surfaces as `VfsError::ConstraintViolation` before any I/O happens. Construction
//! checks too; the storage's own verdict is cached, so repeated checks are cheap.
use crate::binary::{AccessMode, BinaryHandle};
use crate::iter::DirIter;
use crate::storage::hash::{digest_bytes, Digest, HashAlgorithm, HashTarget};
use crate::storage::transfer::{self, Retargeted};
use crate::storage::{LockMode, Storage, WriteMode};
use crate::validator::Rules;
use crate::{PathPart, Result, VfsError};
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::PathBuf;
use std::time::SystemTime;

fn path_part(storage: &dyn Storage) -> PathPart {
    match storage.vfs_path() {
        Some(path) => PathPart::Path(path.clone()),
        None => PathPart::Literal(storage.location().unwrap_or_default()),
    }
}

/// SUMMARY:
/// A file on any backend.
///
/// EXAMPLE:
/// ```rust
/// # use strict_vfs::{File, Memory, WriteMode};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut file = File::new(Memory::default())?;
/// file.write(b"one\ntwo\n", WriteMode::Truncate)?;
/// assert_eq!(file.read_lines()?, ["one", "two"]);
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct File {
    storage: Box<dyn Storage>,
}

impl File {
    /// ERRORS:
    /// - `ConstraintViolation`: the storage fails its rules.
    pub fn new(storage: impl Storage + 'static) -> Result<Self> {
        Self::from_boxed(Box::new(storage))
    }

    pub fn from_boxed(storage: Box<dyn Storage>) -> Result<Self> {
        storage.check_constraints()?;
        Ok(Self { storage })
    }

    pub(crate) fn from_storage(storage: Box<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> &mut dyn Storage {
        self.storage.as_mut()
    }

    pub fn into_storage(self) -> Box<dyn Storage> {
        self.storage
    }

    fn gate(&self) -> Result<&dyn Storage> {
        self.storage.check_constraints()?;
        Ok(self.storage.as_ref())
    }

    fn gate_mut(&mut self) -> Result<&mut dyn Storage> {
        self.storage.check_constraints()?;
        Ok(self.storage.as_mut())
    }

    pub fn name(&self) -> Option<OsString> {
        self.storage.name()
    }

    pub fn location(&self) -> Option<PathBuf> {
        self.storage.location()
    }

    pub fn exists(&self) -> bool {
        self.storage.is_file()
    }

    /// The whole content.
    pub fn read(&self) -> Result<Vec<u8>> {
        self.gate()?.read(0, None)
    }

    /// Up to `len` bytes from `offset`.
    pub fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.gate()?.read(offset, Some(len))
    }

    pub fn read_lines(&self) -> Result<Vec<String>> {
        self.gate()?.read_lines()
    }

    pub fn stream_to(&self, out: &mut dyn Write) -> Result<u64> {
        self.gate()?.stream_to(out)
    }

    /// Writes under an exclusive advisory lock.
    pub fn write(&mut self, content: &[u8], mode: WriteMode) -> Result<()> {
        self.gate_mut()?.write(content, mode, LockMode::Advisory)
    }

    pub fn touch(&mut self) -> Result<()> {
        self.gate_mut()?.touch()
    }

    /// SUMMARY:
    /// Copy into `destination`, returning the storage the data landed in when `destination` is a
    /// directory.
    pub fn copy_to(&self, destination: &mut dyn Storage) -> Result<Retargeted> {
        transfer::copy(self.gate()?, destination)
    }

    /// SUMMARY:
    /// Move into `destination`; afterwards `exists()` is false.
    pub fn move_to(&mut self, destination: &mut dyn Storage) -> Result<Retargeted> {
        transfer::move_to(self.gate_mut()?, destination)
    }

    /// Content hash.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Result<Digest> {
        self.gate()?.hash(HashTarget::Content, algorithm)
    }

    pub fn hash_of(&self, target: HashTarget, algorithm: HashAlgorithm) -> Result<Digest> {
        self.gate()?.hash(target, algorithm)
    }

    pub fn size(&self) -> Result<u64> {
        self.gate()?.size()
    }

    pub fn modified_time(&self) -> Result<SystemTime> {
        self.gate()?.modified_time()
    }

    pub fn mime_type(&self) -> Result<String> {
        self.gate()?.mime_type()
    }

    pub fn remove(&mut self) -> Result<()> {
        self.gate_mut()?.remove()
    }

    /// SUMMARY:
    /// An opened binary handle in `mode`.
    ///
    /// ERRORS:
    /// - `Unsupported`: the backend has no binary access (`Stream`, `Adapter`).
    /// - `NotFound`: reading a file that does not exist.
    pub fn binary(&mut self, mode: AccessMode) -> Result<BinaryHandle<'_>> {
        let mut handle = self.gate_mut()?.binary(mode)?;
        handle.open()?;
        Ok(handle)
    }
}

impl From<&File> for PathPart {
    fn from(value: &File) -> Self {
        path_part(value.storage.as_ref())
    }
}

/// SUMMARY:
/// A directory on a directory-capable backend (`Disk`, `Adapter`).
///
/// DETAILS:
/// `dir`, `file` and `up` return new facades whose storages inherit this directory's rules;
/// with `IN_SAFEROOT` set, `up` past the safe root fails instead of escaping it.
#[derive(Debug)]
pub struct Directory {
    storage: Box<dyn Storage>,
}

impl Directory {
    /// ERRORS:
    /// - `ConstraintViolation`: the storage fails its rules.
    pub fn new(storage: impl Storage + 'static) -> Result<Self> {
        Self::from_boxed(Box::new(storage))
    }

    pub fn from_boxed(storage: Box<dyn Storage>) -> Result<Self> {
        storage.check_constraints()?;
        Ok(Self { storage })
    }

    pub(crate) fn from_storage(storage: Box<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn storage_mut(&mut self) -> &mut dyn Storage {
        self.storage.as_mut()
    }

    pub fn into_storage(self) -> Box<dyn Storage> {
        self.storage
    }

    fn gate(&self) -> Result<&dyn Storage> {
        self.storage.check_constraints()?;
        Ok(self.storage.as_ref())
    }

    fn gate_mut(&mut self) -> Result<&mut dyn Storage> {
        self.storage.check_constraints()?;
        Ok(self.storage.as_mut())
    }

    pub fn name(&self) -> Option<OsString> {
        self.storage.name()
    }

    pub fn location(&self) -> Option<PathBuf> {
        self.storage.location()
    }

    pub fn exists(&self) -> bool {
        self.storage.is_dir()
    }

    /// SUMMARY:
    /// Iterate the children, optionally recursing and overriding the children's rules.
    pub fn list(&self, recursive: bool, rules: Option<Rules>) -> Result<DirIter<'_>> {
        let storage = self.gate()?;
        Ok(DirIter::new(storage).recursive(recursive).with_rules(rules))
    }

    /// The child directory `name`; it need not exist yet.
    pub fn dir(&self, name: impl AsRef<OsStr>) -> Result<Directory> {
        Directory::from_boxed(self.gate()?.child(name.as_ref())?)
    }

    /// The child file `name`; it need not exist yet.
    pub fn file(&self, name: impl AsRef<OsStr>) -> Result<File> {
        File::from_boxed(self.gate()?.child(name.as_ref())?)
    }

    /// The directory `levels` up.
    pub fn up(&self, levels: usize) -> Result<Directory> {
        Directory::from_boxed(self.gate()?.parent(levels)?)
    }

    /// Moves this facade into the child directory `name`.
    pub fn cd(&mut self, name: impl AsRef<OsStr>) -> Result<()> {
        let storage = self.gate_mut()?;
        storage.cd(name.as_ref())?;
        storage.check_constraints()
    }

    pub fn mkdir(&mut self, recursive: bool) -> Result<()> {
        self.gate_mut()?.mkdir(recursive)
    }

    pub fn remove(&mut self, recursive: bool) -> Result<()> {
        self.gate_mut()?.remove_dir(recursive)
    }

    /// SUMMARY:
    /// Hash of the tree: every file's content hash, ordered by location, hex-joined and hashed
    /// again.
    ///
    /// DETAILS:
    /// Only content takes part, so two trees with the same files at the same relative places
    /// hash alike wherever they live.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Result<Digest> {
        let mut hashed = Vec::new();
        for file in self.list(true, None)?.files() {
            let file = file?;
            let location = file.location().unwrap_or_default();
            hashed.push((location, file.hash(algorithm)?.to_hex()));
        }
        hashed.sort_by(|a, b| a.0.cmp(&b.0));
        let joined: String = hashed.into_iter().map(|(_, hex)| hex).collect();
        tracing::trace!(directory = %self.storage.describe(), "directory hashed");
        Ok(digest_bytes(algorithm, joined.as_bytes()))
    }

    /// Total size of every file in the tree.
    pub fn size(&self) -> Result<u64> {
        let mut total = 0u64;
        for file in self.list(true, None)?.files() {
            total = total.saturating_add(file?.size()?);
        }
        Ok(total)
    }
}

impl From<&Directory> for PathPart {
    fn from(value: &Directory) -> Self {
        path_part(value.storage.as_ref())
    }
}

/// One item yielded by a directory listing.
#[derive(Debug)]
pub enum Entry {
    File(File),
    Directory(Directory),
}

impl Entry {
    pub fn name(&self) -> Option<OsString> {
        self.storage().name()
    }

    pub fn location(&self) -> Option<PathBuf> {
        self.storage().location()
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }

    pub fn storage(&self) -> &dyn Storage {
        match self {
            Entry::File(file) => file.storage(),
            Entry::Directory(dir) => dir.storage(),
        }
    }

    /// ERRORS:
    /// - `InvalidValue`: the entry is a directory.
    pub fn into_file(self) -> Result<File> {
        match self {
            Entry::File(file) => Ok(file),
            Entry::Directory(dir) => Err(VfsError::InvalidValue(format!(
                "{} is a directory",
                dir.storage.describe()
            ))),
        }
    }

    /// ERRORS:
    /// - `InvalidValue`: the entry is a file.
    pub fn into_dir(self) -> Result<Directory> {
        match self {
            Entry::Directory(dir) => Ok(dir),
            Entry::File(file) => Err(VfsError::InvalidValue(format!(
                "{} is a file",
                file.storage.describe()
            ))),
        }
    }
}
