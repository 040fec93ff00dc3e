//! # strict-vfs
//!
//! A small virtual filesystem: one storage contract over local disk, in-memory buffers, arbitrary
//! `Read + Write + Seek` streams and pluggable adapter filesystems, with path rules checked before
//! anything touches the backend.
//!
//! ## Quick start
//!
//! ```rust
//! # use strict_vfs::{Directory, Disk, HashAlgorithm, Memory, WriteMode};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let td = tempfile::tempdir()?;
//! let mut inbox = Directory::new(Disk::new([td.path()])?)?;
//! inbox.mkdir(true)?;
//!
//! // Untrusted names stay inside the directory they were joined onto.
//! let mut note = inbox.file("note.txt")?;
//! note.write(b"hello", WriteMode::Truncate)?;
//! assert!(inbox.file("../../etc/passwd").is_err());
//!
//! // Any backend can feed any other.
//! let mut scratch = Memory::default();
//! note.copy_to(&mut scratch)?;
//! assert_eq!(scratch.as_bytes(), b"hello");
//! assert_eq!(note.hash(HashAlgorithm::Sha256)?.to_hex().len(), 64);
//! # Ok(()) }
//! ```
//!
//! ## Pieces
//!
//! - [`VfsPath`]: multi-part path that resolves lazily against the filesystem and remembers the
//!   safe root it was seeded with.
//! - [`Rules`] and [`Constraint`]: which checks a path must pass (`IN_SAFEROOT`,
//!   `IN_ALLOWED_ROOTS`, `DISALLOW_SYMLINK`), evaluated once and reported as a full
//!   [`Violations`] list.
//! - [`Storage`]: the backend contract, implemented by [`Disk`], [`Memory`], [`Stream`] and
//!   [`Adapter`]. Operations a backend lacks fail with `Unsupported`.
//! - [`File`] and [`Directory`]: facades that gate every call on the storage's rules.
//! - [`BinaryHandle`]: fixed-mode binary access that refuses to read from a file that changed
//!   since the handle was opened.
//! - [`DirIter`]: lazy listing with three tiers of filters.
//! - [`transfer`]: copy and move between any two storages.
//!
//! ## Allowed roots
//!
//! `IN_ALLOWED_ROOTS` checks against the list in the `STRICT_VFS_ALLOWED_ROOTS` environment
//! variable (the platform's path-list syntax). It is read once per process; an empty or unset
//! list permits everything.
//!
//! ## Logging
//!
//! The crate emits `tracing` events (debug for I/O and transfers, trace for resolution) and
//! never installs a subscriber.
#![forbid(unsafe_code)]

pub mod binary;
pub mod error;
pub mod facade;
pub mod iter;
pub mod path;
pub mod storage;
pub mod validator;

pub use binary::{AccessMode, BinaryHandle, HandleState};
pub use error::{ErrorKind, VfsError};
pub use facade::{Directory, Entry, File};
pub use iter::{DirIter, IterState};
pub use path::{PathPart, VfsPath};
pub use storage::transfer;
pub use storage::{
    Adapter, AdapterEntry, AdapterMetadata, ChildEntry, Digest, Disk, FsAdapter, HashAlgorithm,
    HashTarget, LockMode, Memory, MemoryFs, Storage, StorageKind, Stream, StreamResource,
    WriteMode,
};
pub use validator::{
    AllowedRoots, Constraint, Rule, Rules, Violation, Violations, ALLOWED_ROOTS_ENV,
};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, VfsError>;

/// Builds a `Vec<PathPart>` from mixed path pieces.
///
/// ```rust
/// # use strict_vfs::{parts, Disk, VfsPath};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let td = tempfile::tempdir()?;
/// let base = VfsPath::new([td.path()])?;
/// let disk = Disk::new(parts![&base, "logs", String::from("today.log")])?;
/// assert!(disk.path().raw().ends_with("logs/today.log"));
/// # Ok(()) }
/// ```
#[macro_export]
macro_rules! parts {
    ($($part:expr),* $(,)?) => {
        ::std::vec![$($crate::PathPart::from($part)),*]
    };
}
