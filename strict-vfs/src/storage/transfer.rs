//! SUMMARY:
//! Copy and move between any two storages.
//!
//! OVERVIEW:
//! Every (source, destination) pair works. Same-backend pairs take a native route when one
//! exists:
//! - Disk → Disk: `fs::copy`; moves use `fs::rename`, falling back to copy + delete across
//!   devices.
//! - Adapter → Adapter on the same adapter instance: the adapter's own copy / rename.
//! - Memory → Memory: buffer clone.
//!
//! Everything else streams from the source reader into the destination writer through a
//! buffer, so Disk and Adapter sources are never loaded whole.
use super::{Adapter, Disk, Memory, Storage};
use crate::{Result, VfsError};
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufWriter, Write};

/// Where the data landed when the destination turned out to be a directory.
pub type Retargeted = Option<Box<dyn Storage>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Copy,
    Move,
}

/// SUMMARY:
/// Copy `source`'s content into `destination`.
///
/// DETAILS:
/// When `destination` is an existing directory the copy lands in `destination/<source name>`
/// (a generated unique name when the source has none) and that storage is returned.
/// The destination's rules are re-evaluated first; a missing but writeable destination is
/// touched before any data moves.
///
/// ERRORS:
/// - `ConstraintViolation`: the source or (retargeted) destination fails its rules.
/// - `NotFound`: the source is not an existing file.
/// - `InvalidValue`: source and destination are the same entry.
pub fn copy(source: &dyn Storage, destination: &mut dyn Storage) -> Result<Retargeted> {
    transfer(Src::Shared(source), destination, Op::Copy)
}

/// SUMMARY:
/// Move `source`'s content into `destination`; afterwards `source.is_file()` is false.
///
/// DETAILS:
/// Same retargeting and rule checks as [`copy`]. Disk → Disk and same-adapter moves are native
/// renames; all other pairs copy, then remove the source.
pub fn move_to(source: &mut dyn Storage, destination: &mut dyn Storage) -> Result<Retargeted> {
    transfer(Src::Owned(source), destination, Op::Move)
}

enum Src<'a> {
    Shared(&'a dyn Storage),
    Owned(&'a mut dyn Storage),
}

impl Src<'_> {
    fn get(&self) -> &dyn Storage {
        match self {
            Src::Shared(storage) => *storage,
            Src::Owned(storage) => &**storage,
        }
    }
}

fn transfer(mut source: Src<'_>, destination: &mut dyn Storage, op: Op) -> Result<Retargeted> {
    {
        let src = source.get();
        src.check_constraints()?;
        if !src.is_file() {
            return Err(if src.exists() {
                VfsError::wrong_type(src.describe(), "file")
            } else {
                VfsError::not_found(src.describe())
            });
        }
    }

    let mut retargeted: Retargeted = None;
    if destination.is_dir() {
        let name = source
            .get()
            .name()
            .unwrap_or_else(|| OsString::from(uuid::Uuid::new_v4().to_string()));
        tracing::debug!(
            directory = %destination.describe(),
            name = %name.to_string_lossy(),
            "destination is a directory; retargeting"
        );
        retargeted = Some(destination.child(&name)?);
    }
    let target: &mut dyn Storage = match retargeted.as_mut() {
        Some(child) => child.as_mut(),
        None => destination,
    };

    target.reload();
    target.check_constraints()?;
    if same_entry(source.get(), target) {
        return Err(VfsError::InvalidValue(format!(
            "source and destination are the same: {}",
            target.describe()
        )));
    }
    let touched = !target.exists() && target.is_writeable();
    if touched {
        target.touch()?;
    }

    let copied = match (&mut source, op) {
        (Src::Owned(src), Op::Move) => native_move(&mut **src, target),
        (Src::Owned(src), Op::Copy) => native_copy(&**src, target),
        (Src::Shared(src), _) => native_copy(*src, target),
    }
    .and_then(|native| {
        if native {
            return Ok(());
        }
        stream_copy(source.get(), target).map(drop)
    });
    if let Err(err) = copied {
        if touched {
            discard_touched(target);
        }
        return Err(err);
    }
    if let Src::Owned(src) = &mut source {
        if op == Op::Move && src.is_file() {
            src.remove()?;
        }
    }
    target.reload();
    Ok(retargeted)
}

// Best effort: a failed transfer must not leave the empty placeholder behind.
fn discard_touched(target: &mut dyn Storage) {
    target.reload();
    if let Err(err) = target.remove() {
        tracing::debug!(target_path = %target.describe(), error = %err, "could not discard touched destination");
    }
}

fn same_entry(source: &dyn Storage, target: &dyn Storage) -> bool {
    if source.kind() != target.kind() {
        return false;
    }
    if let (Some(a), Some(b)) = (
        source.as_any().downcast_ref::<Adapter>(),
        target.as_any().downcast_ref::<Adapter>(),
    ) {
        return a.same_adapter(b) && a.path() == b.path();
    }
    match (source.location(), target.location()) {
        (Some(a), Some(b)) => {
            let canonical = |p: &std::path::Path| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
            canonical(&a) == canonical(&b)
        }
        _ => false,
    }
}

// Returns false when no native route applies.
fn native_copy(source: &dyn Storage, target: &mut dyn Storage) -> Result<bool> {
    if let (Some(src), Some(dst)) = (
        source.as_any().downcast_ref::<Disk>(),
        target.as_any().downcast_ref::<Disk>(),
    ) {
        fs::copy(src.path().raw(), dst.path().raw())
            .map_err(|e| VfsError::io("copy", dst.describe(), e))?;
        tracing::debug!(from = %src.describe(), to = %dst.describe(), "disk copy");
        return Ok(true);
    }
    if let (Some(src), Some(dst)) = (
        source.as_any().downcast_ref::<Adapter>(),
        target.as_any().downcast_ref::<Adapter>(),
    ) {
        if src.same_adapter(dst) {
            src.fs()
                .copy(src.path(), dst.path())
                .map_err(|e| VfsError::io("copy", dst.describe(), e))?;
            tracing::debug!(from = %src.describe(), to = %dst.describe(), "adapter copy");
            return Ok(true);
        }
    }
    if let Some(src) = source.as_any().downcast_ref::<Memory>() {
        if let Some(dst) = target.as_any_mut().downcast_mut::<Memory>() {
            dst.clone_from_buffer(src);
            tracing::debug!("memory buffer clone");
            return Ok(true);
        }
    }
    Ok(false)
}

fn native_move(source: &mut dyn Storage, target: &mut dyn Storage) -> Result<bool> {
    if let (Some(src), Some(dst)) = (
        source.as_any().downcast_ref::<Disk>(),
        target.as_any().downcast_ref::<Disk>(),
    ) {
        let (from, to) = (src.path().raw(), dst.path().raw());
        match fs::rename(from, to) {
            Ok(()) => tracing::debug!(from = %src.describe(), to = %dst.describe(), "disk rename"),
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                fs::copy(from, to).map_err(|e| VfsError::io("copy", dst.describe(), e))?;
                fs::remove_file(from).map_err(|e| VfsError::io("remove", src.describe(), e))?;
                tracing::debug!(from = %src.describe(), to = %dst.describe(), "disk copy + delete across devices");
            }
            Err(err) => return Err(VfsError::io("rename", dst.describe(), err)),
        }
        source.reload();
        return Ok(true);
    }
    if let (Some(src), Some(dst)) = (
        source.as_any().downcast_ref::<Adapter>(),
        target.as_any().downcast_ref::<Adapter>(),
    ) {
        if src.same_adapter(dst) {
            src.fs()
                .rename(src.path(), dst.path())
                .map_err(|e| VfsError::io("rename", dst.describe(), e))?;
            tracing::debug!(from = %src.describe(), to = %dst.describe(), "adapter rename");
            return Ok(true);
        }
    }
    if native_copy(&*source, target)? {
        source.remove()?;
        return Ok(true);
    }
    Ok(false)
}

fn stream_copy(source: &dyn Storage, target: &mut dyn Storage) -> Result<u64> {
    let label = target.describe();
    let mut reader = source.open_reader()?;
    let writer = target.open_writer()?;
    let mut buffered = BufWriter::new(writer);
    let copied = io::copy(&mut reader, &mut buffered)
        .map_err(|e| VfsError::io("copy", label.clone(), e))?;
    buffered
        .flush()
        .map_err(|e| VfsError::io("flush", label.clone(), e))?;
    tracing::debug!(from = %source.describe(), to = %label, bytes = copied, "stream copy");
    Ok(copied)
}
