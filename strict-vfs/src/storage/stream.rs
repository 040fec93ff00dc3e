use super::lock::LockedFile;
use super::{LockMode, Storage, StorageKind, WriteMode};
use crate::validator::{Constraint, Rules};
use crate::{PathPart, Result, VfsError, VfsPath};
use std::any::Any;
use std::cell::{Cell, OnceCell, RefCell, RefMut};
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

/// A byte resource a `Stream` can wrap.
pub trait StreamResource: Read + Write + Seek + fmt::Debug {
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// A second handle to the same open file, used for advisory locking.
    /// `None` for resources that are not files.
    fn try_clone_file(&self) -> Option<io::Result<File>> {
        None
    }
}

impl StreamResource for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn try_clone_file(&self) -> Option<io::Result<File>> {
        Some(self.try_clone())
    }
}

impl StreamResource for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds usize"))?;
        self.get_mut().resize(len, 0);
        if self.position() > len as u64 {
            self.set_position(len as u64);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct StreamTimes {
    created: SystemTime,
    modified: SystemTime,
    accessed: SystemTime,
}

/// SUMMARY:
/// Storage over an open `Read + Write + Seek` resource.
///
/// DETAILS:
/// - Streams have no filesystem metadata; created/modified/accessed times are tracked
///   synthetically from the calls made through this storage.
/// - Advisory locking is opt-in and only takes effect for `std::fs::File` resources.
/// - An optional uri gives the stream a name and a path that rules are checked against.
/// - `remove` truncates the resource and marks the stream removed until the next write or touch.
pub struct Stream {
    resource: RefCell<Box<dyn StreamResource>>,
    locking: bool,
    uri: Option<VfsPath>,
    rules: Rules,
    constraint: OnceCell<Constraint>,
    times: Cell<StreamTimes>,
    removed: bool,
}

impl Stream {
    pub fn new(resource: impl StreamResource + 'static) -> Self {
        let now = SystemTime::now();
        Self {
            resource: RefCell::new(Box::new(resource)),
            locking: false,
            uri: None,
            rules: Rules::default(),
            constraint: OnceCell::new(),
            times: Cell::new(StreamTimes {
                created: now,
                modified: now,
                accessed: now,
            }),
            removed: false,
        }
    }

    /// A stream over an open file, with advisory locking enabled.
    pub fn from_file(file: File) -> Self {
        Self::new(file).with_locking(true)
    }

    pub fn with_locking(mut self, locking: bool) -> Self {
        self.locking = locking;
        self
    }

    pub fn with_uri<I>(mut self, parts: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<PathPart>,
    {
        self.uri = Some(VfsPath::new(parts)?);
        self.constraint = OnceCell::new();
        Ok(self)
    }

    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.set_rules(rules);
        self
    }

    pub fn locking(&self) -> bool {
        self.locking
    }

    pub fn created_time(&self) -> SystemTime {
        self.times.get().created
    }

    pub fn accessed_time(&self) -> SystemTime {
        self.times.get().accessed
    }

    fn label(&self) -> String {
        match &self.uri {
            Some(uri) => format!("stream:{uri}"),
            None => "stream".to_string(),
        }
    }

    fn io_err(&self, operation: &'static str) -> impl FnOnce(io::Error) -> VfsError + '_ {
        move |e| VfsError::io(operation, self.label(), e)
    }

    fn mark_accessed(&self) {
        let mut times = self.times.get();
        times.accessed = SystemTime::now();
        self.times.set(times);
    }

    fn mark_modified(&self) {
        let mut times = self.times.get();
        let now = SystemTime::now();
        times.accessed = now;
        times.modified = now;
        self.times.set(times);
    }

    fn borrow(&self) -> Result<RefMut<'_, Box<dyn StreamResource>>> {
        self.resource
            .try_borrow_mut()
            .map_err(|_| VfsError::access_denied(self.label(), "stream is already in use"))
    }

    fn lock(&self, resource: &dyn StreamResource, exclusive: bool) -> Result<Option<LockedFile>> {
        if !self.locking {
            return Ok(None);
        }
        let Some(clone) = resource.try_clone_file() else {
            return Ok(None);
        };
        let file = clone.map_err(self.io_err("clone handle"))?;
        let label = self.label();
        let guard = if exclusive {
            LockedFile::exclusive(file, &label)?
        } else {
            LockedFile::shared(file, &label)?
        };
        Ok(Some(guard))
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("uri", &self.uri)
            .field("locking", &self.locking)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

struct StreamReader<'a> {
    resource: RefMut<'a, Box<dyn StreamResource>>,
    _guard: Option<LockedFile>,
}

impl Read for StreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.resource.read(buf)
    }
}

struct StreamWriter<'a> {
    resource: RefMut<'a, Box<dyn StreamResource>>,
    _guard: Option<LockedFile>,
}

impl Write for StreamWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.resource.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.resource.flush()
    }
}

impl Storage for Stream {
    fn kind(&self) -> StorageKind {
        StorageKind::Stream
    }

    fn describe(&self) -> String {
        self.label()
    }

    fn vfs_path(&self) -> Option<&VfsPath> {
        self.uri.as_ref()
    }

    fn rules(&self) -> Rules {
        self.rules
    }

    fn set_rules(&mut self, rules: Rules) {
        self.rules = rules;
        self.constraint = OnceCell::new();
    }

    fn constraint(&self) -> Option<&Constraint> {
        let uri = self.uri.as_ref()?;
        Some(
            self.constraint
                .get_or_init(|| Constraint::new(self.rules, uri.clone())),
        )
    }

    fn reload(&mut self) {
        if let Some(uri) = self.uri.as_mut() {
            uri.reload();
        }
        self.constraint = OnceCell::new();
    }

    fn exists(&self) -> bool {
        !self.removed
    }

    fn is_file(&self) -> bool {
        !self.removed
    }

    fn is_dir(&self) -> bool {
        false
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_writeable(&self) -> bool {
        true
    }

    fn read(&self, offset: u64, len: Option<usize>) -> Result<Vec<u8>> {
        let mut resource = self.borrow()?;
        let _guard = self.lock(&**resource, false)?;
        resource
            .seek(SeekFrom::Start(offset))
            .map_err(self.io_err("seek"))?;
        let mut out = Vec::new();
        let outcome = match len {
            Some(len) => (&mut *resource).take(len as u64).read_to_end(&mut out),
            None => resource.read_to_end(&mut out),
        };
        outcome.map_err(self.io_err("read"))?;
        self.mark_accessed();
        Ok(out)
    }

    fn open_reader(&self) -> Result<Box<dyn Read + '_>> {
        let mut resource = self.borrow()?;
        let guard = self.lock(&**resource, false)?;
        resource.rewind().map_err(self.io_err("seek"))?;
        self.mark_accessed();
        Ok(Box::new(StreamReader {
            resource,
            _guard: guard,
        }))
    }

    fn write(&mut self, content: &[u8], mode: WriteMode, lock: LockMode) -> Result<()> {
        let mut resource = self.borrow()?;
        let _guard = match lock {
            LockMode::Advisory => self.lock(&**resource, true)?,
            LockMode::None => None,
        };
        match mode {
            WriteMode::Truncate => {
                resource.set_len(0).map_err(self.io_err("truncate"))?;
                resource.rewind().map_err(self.io_err("seek"))?;
            }
            WriteMode::Append => {
                resource
                    .seek(SeekFrom::End(0))
                    .map_err(self.io_err("seek"))?;
            }
        }
        resource.write_all(content).map_err(self.io_err("write"))?;
        resource.flush().map_err(self.io_err("flush"))?;
        drop(resource);
        self.removed = false;
        self.mark_modified();
        tracing::trace!(stream = %self.label(), bytes = content.len(), ?mode, "stream write");
        Ok(())
    }

    fn open_writer(&mut self) -> Result<Box<dyn Write + '_>> {
        let mut resource = self
            .resource
            .try_borrow_mut()
            .map_err(|_| VfsError::access_denied(self.label(), "stream is already in use"))?;
        let guard = self.lock(&**resource, true)?;
        resource.set_len(0).map_err(self.io_err("truncate"))?;
        resource.rewind().map_err(self.io_err("seek"))?;
        self.removed = false;
        self.mark_modified();
        Ok(Box::new(StreamWriter {
            resource,
            _guard: guard,
        }))
    }

    fn remove(&mut self) -> Result<()> {
        self.borrow()?
            .set_len(0)
            .map_err(self.io_err("truncate"))?;
        self.removed = true;
        self.mark_modified();
        tracing::trace!(stream = %self.label(), "stream removed");
        Ok(())
    }

    fn touch(&mut self) -> Result<()> {
        self.removed = false;
        self.mark_modified();
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        let mut resource = self.borrow()?;
        let position = resource.stream_position().map_err(self.io_err("seek"))?;
        let end = resource
            .seek(SeekFrom::End(0))
            .map_err(self.io_err("seek"))?;
        resource
            .seek(SeekFrom::Start(position))
            .map_err(self.io_err("seek"))?;
        Ok(end)
    }

    fn modified_time(&self) -> Result<SystemTime> {
        Ok(self.times.get().modified)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
