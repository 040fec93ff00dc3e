use super::{LockMode, Storage, StorageKind, WriteMode};
use crate::binary::{AccessMode, BinaryHandle};
use crate::validator::Rules;
use crate::Result;
use std::any::Any;
use std::ffi::OsString;
use std::io::{Cursor, Read, Write};
use std::time::SystemTime;

/// SUMMARY:
/// Storage backed by an in-process byte buffer.
///
/// DETAILS:
/// Exists and is readable and writeable from construction. `remove` empties the buffer and
/// marks it removed until the next write or touch. There is no path, so rules have nothing to
/// check; they are only carried along. Listing is unsupported.
#[derive(Debug, Clone)]
pub struct Memory {
    data: Vec<u8>,
    name: Option<OsString>,
    rules: Rules,
    modified: SystemTime,
    removed: bool,
}

impl Memory {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            name: None,
            rules: Rules::default(),
            modified: SystemTime::now(),
            removed: false,
        }
    }

    /// Gives the buffer a display name, used when it is copied into a directory.
    pub fn with_name(mut self, name: impl Into<OsString>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Replaces the buffer with a copy of `other`'s.
    pub(crate) fn clone_from_buffer(&mut self, other: &Memory) {
        self.data.clone_from(&other.data);
        self.mark_modified();
    }

    fn mark_modified(&mut self) {
        self.modified = SystemTime::now();
        self.removed = false;
    }

    fn window(&self, offset: u64, len: Option<usize>) -> &[u8] {
        let start = usize::try_from(offset).map_or(self.data.len(), |o| o.min(self.data.len()));
        let end = match len {
            Some(len) => start.saturating_add(len).min(self.data.len()),
            None => self.data.len(),
        };
        &self.data[start..end]
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Storage for Memory {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("memory:{}", name.to_string_lossy()),
            None => format!("memory buffer ({} bytes)", self.data.len()),
        }
    }

    fn name(&self) -> Option<OsString> {
        self.name.clone()
    }

    fn rules(&self) -> Rules {
        self.rules
    }

    fn set_rules(&mut self, rules: Rules) {
        self.rules = rules;
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
        Ok(self.window(offset, len).to_vec())
    }

    fn open_reader(&self) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.data.as_slice())))
    }

    fn write(&mut self, content: &[u8], mode: WriteMode, _lock: LockMode) -> Result<()> {
        if mode == WriteMode::Truncate {
            self.data.clear();
        }
        self.data.extend_from_slice(content);
        self.mark_modified();
        Ok(())
    }

    fn open_writer(&mut self) -> Result<Box<dyn Write + '_>> {
        self.data.clear();
        self.mark_modified();
        Ok(Box::new(&mut self.data))
    }

    fn remove(&mut self) -> Result<()> {
        self.data.clear();
        self.modified = SystemTime::now();
        self.removed = true;
        Ok(())
    }

    fn touch(&mut self) -> Result<()> {
        self.mark_modified();
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn modified_time(&self) -> Result<SystemTime> {
        Ok(self.modified)
    }

    fn binary(&mut self, mode: AccessMode) -> Result<BinaryHandle<'_>> {
        if mode == AccessMode::Write {
            self.mark_modified();
        }
        Ok(BinaryHandle::for_memory(&mut self.data, mode))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
