use crate::storage::transfer::{copy, move_to};
use crate::{
    Adapter, Disk, ErrorKind, LockMode, Memory, MemoryFs, Rules, Storage, Stream, StreamResource,
    WriteMode,
};
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn disk_to_disk_copy_and_move() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("a.bin"), b"abc").unwrap();
    let source = Disk::new([td.path().join("a.bin")]).unwrap();
    let mut target = Disk::new([td.path().join("b.bin")]).unwrap();

    assert!(copy(&source, &mut target).unwrap().is_none());
    assert_eq!(fs::read(td.path().join("b.bin")).unwrap(), b"abc");
    assert!(source.is_file());

    let mut source = source;
    let mut moved = Disk::new([td.path().join("c.bin")]).unwrap();
    move_to(&mut source, &mut moved).unwrap();
    assert!(!source.is_file());
    assert_eq!(moved.read(0, None).unwrap(), b"abc");
}

#[test]
fn memory_to_disk_streams_large_buffers() {
    let td = tempfile::tempdir().unwrap();
    let payload = patterned(16 * 1024);
    let source = Memory::new(payload.clone());
    let mut target = Disk::new([td.path().join("big.bin")]).unwrap();
    copy(&source, &mut target).unwrap();
    assert_eq!(target.size().unwrap(), 16 * 1024);
    assert_eq!(target.read(0, None).unwrap(), payload);
}

#[test]
fn copy_into_a_directory_retargets_by_name() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("report.txt"), b"r").unwrap();
    fs::create_dir(td.path().join("out")).unwrap();
    let source = Disk::new([td.path().join("report.txt")]).unwrap();
    let mut dir = Disk::new([td.path().join("out")]).unwrap();

    let landed = copy(&source, &mut dir).unwrap().unwrap();
    assert_eq!(landed.name().as_deref(), Some(OsStr::new("report.txt")));
    assert_eq!(fs::read(td.path().join("out/report.txt")).unwrap(), b"r");
}

#[test]
fn nameless_source_gets_a_generated_name() {
    let td = tempfile::tempdir().unwrap();
    let source = Memory::new(b"anon".to_vec());
    let mut dir = Disk::new([td.path()]).unwrap();
    let landed = copy(&source, &mut dir).unwrap().unwrap();
    let name = landed.name().unwrap().into_string().unwrap();
    assert_eq!(name.len(), 36);
    assert_eq!(landed.read(0, None).unwrap(), b"anon");
}

#[test]
fn same_entry_is_rejected() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("same"), b"1").unwrap();
    let source = Disk::new([td.path().join("same")]).unwrap();
    let mut target = Disk::new([td.path(), Path::new("./same")]).unwrap();
    let err = copy(&source, &mut target).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(fs::read(td.path().join("same")).unwrap(), b"1");
}

#[test]
fn missing_source_is_not_found() {
    let td = tempfile::tempdir().unwrap();
    let source = Disk::new([td.path().join("ghost")]).unwrap();
    let mut target = Memory::default();
    assert_eq!(
        copy(&source, &mut target).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn destination_rules_are_checked_before_copying() {
    let td = tempfile::tempdir().unwrap();
    fs::create_dir(td.path().join("jail")).unwrap();
    let source = Memory::new(b"payload".to_vec());
    let mut target = Disk::new([td.path().join("jail"), "../escaped.txt".into()])
        .unwrap()
        .with_rules(Rules::IN_SAFEROOT);
    let err = copy(&source, &mut target).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert!(!td.path().join("escaped.txt").exists());
}

#[test]
fn memory_move_empties_the_source() {
    let mut source = Memory::new(b"m".to_vec());
    let mut target = Memory::default();
    move_to(&mut source, &mut target).unwrap();
    assert_eq!(target.as_bytes(), b"m");
    assert!(!source.is_file());
}

#[test]
fn same_adapter_uses_native_rename() {
    let fs = Arc::new(MemoryFs::new());
    let mut source = Adapter::new(fs.clone(), "/a.txt");
    source
        .write(b"adapter", WriteMode::Truncate, LockMode::None)
        .unwrap();
    let mut target = Adapter::new(fs.clone(), "/b.txt");
    move_to(&mut source, &mut target).unwrap();
    assert!(!source.exists());
    assert_eq!(target.read(0, None).unwrap(), b"adapter");
    assert_eq!(fs.len(), 2);
}

#[test]
fn adapter_to_other_adapter_and_disk() {
    let left = Arc::new(MemoryFs::new());
    let right = Arc::new(MemoryFs::new());
    let mut source = Adapter::new(left, "/x");
    source
        .write(b"cross", WriteMode::Truncate, LockMode::None)
        .unwrap();
    let mut target = Adapter::new(right, "/y");
    copy(&source, &mut target).unwrap();
    assert_eq!(target.read(0, None).unwrap(), b"cross");

    let td = tempfile::tempdir().unwrap();
    let mut disk = Disk::new([td.path().join("from-adapter")]).unwrap();
    move_to(&mut source, &mut disk).unwrap();
    assert!(!source.exists());
    assert_eq!(disk.read(0, None).unwrap(), b"cross");
}

#[test]
fn stream_round_trip() {
    let source = Stream::new(Cursor::new(b"streamed".to_vec()));
    let mut middle = Memory::default();
    copy(&source, &mut middle).unwrap();
    let mut back = Stream::new(Cursor::new(Vec::new()));
    copy(&middle, &mut back).unwrap();
    assert_eq!(back.read(0, None).unwrap(), b"streamed");
}

#[test]
fn moving_a_stream_source_removes_it() {
    let mut source = Stream::new(Cursor::new(b"payload".to_vec()));
    let mut target = Memory::default();
    move_to(&mut source, &mut target).unwrap();
    assert_eq!(target.as_bytes(), b"payload");
    assert!(!source.is_file());
    assert!(!source.exists());
    assert_eq!(source.size().unwrap(), 0);
}

// Seeks fine, fails every read.
#[derive(Debug)]
struct Unreadable;

impl Read for Unreadable {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("device went away"))
    }
}

impl Write for Unreadable {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Unreadable {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Ok(0)
    }
}

impl StreamResource for Unreadable {
    fn set_len(&mut self, _len: u64) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn failed_copy_leaves_no_empty_destination() {
    let td = tempfile::tempdir().unwrap();
    let source = Stream::new(Unreadable);
    let mut target = Disk::new([td.path().join("never.bin")]).unwrap();
    assert!(copy(&source, &mut target).is_err());
    assert!(!td.path().join("never.bin").exists());

    let mut source = Stream::new(Unreadable);
    assert!(move_to(&mut source, &mut target).is_err());
    assert!(source.is_file());
    assert!(!td.path().join("never.bin").exists());
}

#[test]
fn failed_copy_keeps_an_existing_destination() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("kept.bin"), b"old").unwrap();
    let source = Stream::new(Unreadable);
    let mut target = Disk::new([td.path().join("kept.bin")]).unwrap();
    assert!(copy(&source, &mut target).is_err());
    assert!(td.path().join("kept.bin").exists());
}

#[tracing_test::traced_test]
#[test]
fn transfers_log_the_route_taken() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("src.txt"), b"route").unwrap();
    let mut source = Disk::new([td.path().join("src.txt")]).unwrap();
    let mut renamed = Disk::new([td.path().join("dst.txt")]).unwrap();
    move_to(&mut source, &mut renamed).unwrap();
    assert!(logs_contain("disk rename"));

    let mut memory = Memory::default();
    copy(&renamed, &mut memory).unwrap();
    assert!(logs_contain("stream copy"));
}
