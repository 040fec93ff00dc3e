//! SUMMARY:
//! Lazy, filterable directory traversal.
//!
//! OVERVIEW:
//! [`DirIter`] walks a directory-capable storage in backend order, pre-order when recursive
//! (a directory is yielded before its contents). Three filter tiers run in increasing cost:
//! 1. path filters, on the native path before any storage is built (`Disk` only);
//! 2. storage filters, on the child storage;
//! 3. entry filters, on the wrapped [`Entry`].
//!
//! A rejection at any tier skips that entry only; a rejected directory is still descended into.
//! Children that fail their own rules are yielded as `Err(ConstraintViolation)` and not
//! descended into. Symlinked directories are yielded but never followed.
use crate::facade::{Directory, Entry, File};
use crate::storage::{ChildEntries, Storage, StorageKind};
use crate::validator::Rules;
use crate::{ErrorKind, Result, VfsError};
use std::fmt;
use std::path::Path;

pub type PathFilter = Box<dyn Fn(&Path) -> bool>;
pub type StorageFilter = Box<dyn Fn(&dyn Storage) -> bool>;
pub type EntryFilter = Box<dyn Fn(&Entry) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    Created,
    Iterating,
    Exhausted,
    Errored,
}

struct Level {
    /// `None` for the root level.
    dir: Option<Box<dyn Storage>>,
    entries: ChildEntries,
}

/// SUMMARY:
/// Single-pass iterator over the children of a directory storage.
///
/// EXAMPLE:
/// ```rust
/// # use strict_vfs::{Directory, Disk};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let td = tempfile::tempdir()?;
/// std::fs::write(td.path().join("a.txt"), b"a")?;
/// std::fs::create_dir(td.path().join("sub"))?;
/// std::fs::write(td.path().join("sub/b.txt"), b"b")?;
/// let dir = Directory::new(Disk::new([td.path()])?)?;
/// let files: Vec<_> = dir.list(true, None)?.files().collect::<Result<_, _>>()?;
/// assert_eq!(files.len(), 2);
/// # Ok(()) }
/// ```
pub struct DirIter<'a> {
    root: &'a dyn Storage,
    recursive: bool,
    rules: Option<Rules>,
    path_filters: Vec<PathFilter>,
    storage_filters: Vec<StorageFilter>,
    entry_filters: Vec<EntryFilter>,
    state: IterState,
    stack: Vec<Level>,
    pending: Option<VfsError>,
}

impl<'a> DirIter<'a> {
    pub fn new(root: &'a dyn Storage) -> Self {
        Self {
            root,
            recursive: false,
            rules: None,
            path_filters: Vec::new(),
            storage_filters: Vec::new(),
            entry_filters: Vec::new(),
            state: IterState::Created,
            stack: Vec::new(),
            pending: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Rules applied to every child instead of the ones inherited from the root.
    pub fn with_rules(mut self, rules: Option<Rules>) -> Self {
        self.rules = rules;
        self
    }

    /// ERRORS:
    /// - `Unsupported`: the root is not `Disk` storage.
    pub fn filter_path(mut self, filter: impl Fn(&Path) -> bool + 'static) -> Result<Self> {
        if self.root.kind() != StorageKind::Disk {
            return Err(VfsError::unsupported(self.root.kind().name(), "path filter"));
        }
        self.path_filters.push(Box::new(filter));
        Ok(self)
    }

    pub fn filter_storage(mut self, filter: impl Fn(&dyn Storage) -> bool + 'static) -> Self {
        self.storage_filters.push(Box::new(filter));
        self
    }

    pub fn filter_entry(mut self, filter: impl Fn(&Entry) -> bool + 'static) -> Self {
        self.entry_filters.push(Box::new(filter));
        self
    }

    pub fn state(&self) -> IterState {
        self.state
    }

    /// Only the files of this traversal.
    pub fn files(self) -> impl Iterator<Item = Result<File>> + 'a {
        self.filter_map(|item| match item {
            Ok(Entry::File(file)) => Some(Ok(file)),
            Ok(Entry::Directory(_)) => None,
            Err(err) => Some(Err(err)),
        })
    }

    /// Only the directories of this traversal.
    pub fn dirs(self) -> impl Iterator<Item = Result<Directory>> + 'a {
        self.filter_map(|item| match item {
            Ok(Entry::Directory(dir)) => Some(Ok(dir)),
            Ok(Entry::File(_)) => None,
            Err(err) => Some(Err(err)),
        })
    }

    fn start(&mut self) -> Result<()> {
        let entries = self.root.list()?;
        self.stack.push(Level { dir: None, entries });
        tracing::trace!(root = %self.root.describe(), recursive = self.recursive, "listing started");
        Ok(())
    }

    fn apply_rules(&self, storage: &mut dyn Storage) {
        if let Some(rules) = self.rules {
            storage.set_rules(rules);
        }
    }

    fn advance(&mut self) -> Option<Result<Entry>> {
        loop {
            if let Some(err) = self.pending.take() {
                return Some(Err(err));
            }
            let level = self.stack.last_mut()?;
            let child = match level.entries.next() {
                Some(Ok(child)) => child,
                Some(Err(err)) => return Some(Err(err)),
                None => {
                    self.stack.pop();
                    continue;
                }
            };

            let wanted = self.path_filters.iter().all(|keep| keep(&child.location));
            let (built, descent) = {
                let parent: &dyn Storage = match self.stack.last() {
                    Some(Level { dir: Some(dir), .. }) => dir.as_ref(),
                    _ => self.root,
                };
                let built = wanted.then(|| parent.child(&child.name));
                let descent = (self.recursive && child.is_dir).then(|| parent.child(&child.name));
                (built, descent)
            };

            match descent {
                Some(Ok(mut dir)) => {
                    self.apply_rules(dir.as_mut());
                    match dir.check_constraints().and_then(|()| dir.list()) {
                        Ok(entries) => self.stack.push(Level {
                            dir: Some(dir),
                            entries,
                        }),
                        // A yielded entry reports the same failure itself.
                        Err(err)
                            if built.is_some()
                                && err.kind() == ErrorKind::ConstraintViolation => {}
                        Err(err) => self.pending = Some(err),
                    }
                }
                Some(Err(err)) => self.pending = Some(err),
                None => {}
            }

            let mut storage = match built {
                Some(Ok(storage)) => storage,
                Some(Err(err)) => return Some(Err(err)),
                None => continue,
            };
            self.apply_rules(storage.as_mut());
            if let Err(err) = storage.check_constraints() {
                tracing::debug!(child = %storage.describe(), "child skipped by path rules");
                return Some(Err(err));
            }

            if !self.storage_filters.iter().all(|keep| keep(storage.as_ref())) {
                continue;
            }
            let entry = if storage.is_dir() {
                Entry::Directory(Directory::from_storage(storage))
            } else {
                Entry::File(File::from_storage(storage))
            };
            if !self.entry_filters.iter().all(|keep| keep(&entry)) {
                continue;
            }
            return Some(Ok(entry));
        }
    }
}

impl Iterator for DirIter<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            IterState::Exhausted | IterState::Errored => return None,
            IterState::Created => {
                self.state = IterState::Iterating;
                if let Err(err) = self.start() {
                    self.state = IterState::Errored;
                    return Some(Err(err));
                }
            }
            IterState::Iterating => {}
        }
        let item = self.advance();
        if item.is_none() {
            self.state = IterState::Exhausted;
        }
        item
    }
}

impl fmt::Debug for DirIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirIter")
            .field("root", &self.root.describe())
            .field("recursive", &self.recursive)
            .field("rules", &self.rules)
            .field("state", &self.state)
            .field("depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}
