use crate::{Disk, ErrorKind, LockMode, Rules, Storage, StorageKind, WriteMode};
use std::ffi::OsStr;
use std::fs;
use std::io::Write as _;
use std::path::Path;

fn disk_in(root: &Path, tail: &str) -> Disk {
    Disk::new([root, Path::new(tail)]).unwrap()
}

#[test]
fn write_read_and_append() {
    let td = tempfile::tempdir().unwrap();
    let mut disk = disk_in(td.path(), "notes.txt");
    assert!(!disk.exists());

    disk.write(b"hello", WriteMode::Truncate, LockMode::Advisory)
        .unwrap();
    disk.write(b" world", WriteMode::Append, LockMode::Advisory)
        .unwrap();
    assert_eq!(disk.read(0, None).unwrap(), b"hello world");
    assert_eq!(disk.read(6, Some(3)).unwrap(), b"wor");
    // Short reads at the end are fine here.
    assert_eq!(disk.read(9, Some(100)).unwrap(), b"ld");
    assert_eq!(disk.size().unwrap(), 11);

    disk.write(b"x", WriteMode::Truncate, LockMode::None).unwrap();
    assert_eq!(fs::read(td.path().join("notes.txt")).unwrap(), b"x");
}

#[test]
fn write_resolves_the_new_file() {
    let td = tempfile::tempdir().unwrap();
    let mut disk = disk_in(td.path(), "fresh.bin");
    assert!(disk.path().real().is_none());
    disk.write(b"1", WriteMode::Truncate, LockMode::Advisory)
        .unwrap();
    assert!(disk.path().real().is_some());
    assert_eq!(disk.name().as_deref(), Some(OsStr::new("fresh.bin")));
}

#[test]
fn read_lines_strips_terminators() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("lines.txt"), b"a\r\nb\nc").unwrap();
    let disk = disk_in(td.path(), "lines.txt");
    assert_eq!(disk.read_lines().unwrap(), ["a", "b", "c"]);

    fs::write(td.path().join("bin.dat"), [0xff, 0xfe]).unwrap();
    let err = disk_in(td.path(), "bin.dat").read_lines().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn type_queries_follow_the_filesystem() {
    let td = tempfile::tempdir().unwrap();
    fs::create_dir(td.path().join("sub")).unwrap();
    fs::write(td.path().join("f.txt"), b"1").unwrap();

    let file = disk_in(td.path(), "f.txt");
    assert!(file.exists() && file.is_file() && !file.is_dir());
    assert!(file.is_readable() && file.is_writeable());

    let dir = disk_in(td.path(), "sub");
    assert!(dir.is_dir() && !dir.is_file());
    assert!(dir.is_readable());

    let missing = disk_in(td.path(), "missing.txt");
    assert!(!missing.exists() && !missing.is_readable());
    assert!(missing.is_writeable());
    assert_eq!(missing.kind(), StorageKind::Disk);
}

#[test]
fn reading_missing_or_directory_fails() {
    let td = tempfile::tempdir().unwrap();
    let missing = disk_in(td.path(), "nope");
    assert_eq!(missing.read(0, None).unwrap_err().kind(), ErrorKind::NotFound);

    let dir = Disk::new([td.path()]).unwrap();
    assert_eq!(dir.read(0, None).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(dir.size().unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn open_writer_truncates() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("w.txt"), b"long old content").unwrap();
    let mut disk = disk_in(td.path(), "w.txt");
    {
        let mut writer = disk.open_writer().unwrap();
        writer.write_all(b"new").unwrap();
    }
    assert_eq!(disk.read(0, None).unwrap(), b"new");
}

#[test]
fn touch_creates_and_skips_directories() {
    let td = tempfile::tempdir().unwrap();
    let mut file = disk_in(td.path(), "touched");
    file.touch().unwrap();
    assert!(file.is_file());
    assert_eq!(file.size().unwrap(), 0);

    let mut dir = Disk::new([td.path()]).unwrap();
    dir.touch().unwrap();
    assert!(dir.is_dir());
}

#[test]
fn remove_deletes_files_only() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("gone.txt"), b"1").unwrap();
    let mut file = disk_in(td.path(), "gone.txt");
    file.remove().unwrap();
    assert!(!file.exists());
    assert_eq!(file.remove().unwrap_err().kind(), ErrorKind::NotFound);

    let mut dir = Disk::new([td.path()]).unwrap();
    assert_eq!(dir.remove().unwrap_err().kind(), ErrorKind::NotFound);
    assert!(td.path().exists());
}

#[test]
fn mkdir_list_and_remove_dir() {
    let td = tempfile::tempdir().unwrap();
    let mut tree = disk_in(td.path(), "a/b/c");
    assert!(tree.mkdir(false).is_err());
    tree.mkdir(true).unwrap();
    assert!(tree.is_dir());

    let root = disk_in(td.path(), "a");
    let mut child = root.child(OsStr::new("note.txt")).unwrap();
    child
        .write(b"x", WriteMode::Truncate, LockMode::Advisory)
        .unwrap();

    let mut names: Vec<_> = root
        .list()
        .unwrap()
        .map(|entry| entry.unwrap())
        .map(|entry| (entry.name.into_string().unwrap(), entry.is_dir))
        .collect();
    names.sort();
    assert_eq!(names, [("b".to_string(), true), ("note.txt".to_string(), false)]);

    let mut a = disk_in(td.path(), "a");
    let err = a.remove_dir(false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    a.remove_dir(true).unwrap();
    assert!(!td.path().join("a").exists());
}

#[test]
fn list_requires_a_directory() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("f"), b"1").unwrap();
    assert_eq!(
        disk_in(td.path(), "f").list().err().map(|e| e.kind()),
        Some(ErrorKind::NotFound)
    );
}

#[test]
fn child_keeps_rules_and_safe_root() {
    let td = tempfile::tempdir().unwrap();
    let root = Disk::new([td.path()]).unwrap().with_rules(Rules::STRICT);
    let child = root.child(OsStr::new("x.txt")).unwrap();
    assert_eq!(child.rules(), Rules::STRICT);
    assert_eq!(
        child.vfs_path().unwrap().safe_root(),
        root.path().safe_root()
    );
}

#[test]
fn cd_moves_into_directories_only() {
    let td = tempfile::tempdir().unwrap();
    fs::create_dir(td.path().join("inner")).unwrap();
    fs::write(td.path().join("file"), b"1").unwrap();

    let mut disk = Disk::new([td.path()]).unwrap();
    assert_eq!(
        disk.cd(OsStr::new("file")).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    disk.cd(OsStr::new("inner")).unwrap();
    assert!(disk.path().raw().ends_with("inner"));
    assert!(disk.check_constraints().is_ok());
}

#[test]
fn parent_above_the_safe_root_fails_its_rules() {
    let td = tempfile::tempdir().unwrap();
    fs::create_dir(td.path().join("inner")).unwrap();
    let disk = disk_in(td.path(), "inner");

    let up = disk.parent(1).unwrap();
    assert!(up.check_constraints().is_ok());
    assert!(up.is_dir());

    let escaped = disk.parent(2).unwrap();
    let err = escaped.check_constraints().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
}

#[test]
fn temp_file_is_removed_on_drop() {
    let mut disk = Disk::temp().unwrap();
    assert!(disk.remove_on_free());
    disk.write(b"hello", WriteMode::Truncate, LockMode::Advisory)
        .unwrap();
    let path = disk.path().raw().to_path_buf();
    assert_eq!(fs::read(&path).unwrap(), b"hello");
    drop(disk);
    assert!(!path.exists());
}

#[test]
fn temp_dir_is_removed_recursively_on_drop() {
    let disk = Disk::temp_dir().unwrap();
    let path = disk.path().raw().to_path_buf();
    fs::create_dir_all(path.join("x/y")).unwrap();
    fs::write(path.join("x/y/z.txt"), b"1").unwrap();
    drop(disk);
    assert!(!path.exists());
}

#[test]
fn remove_on_free_can_be_cleared() {
    let mut disk = Disk::temp().unwrap();
    disk.set_remove_on_free(false);
    let path = disk.path().raw().to_path_buf();
    drop(disk);
    assert!(path.exists());
    fs::remove_file(path).unwrap();
}

#[test]
fn modified_time_tracks_writes() {
    let td = tempfile::tempdir().unwrap();
    let mut disk = disk_in(td.path(), "t.txt");
    disk.touch().unwrap();
    let first = disk.modified_time().unwrap();
    disk.write(b"later", WriteMode::Truncate, LockMode::Advisory)
        .unwrap();
    assert!(disk.modified_time().unwrap() >= first);
}

#[test]
fn binary_access_is_available() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("b.bin"), b"abc").unwrap();
    let mut disk = disk_in(td.path(), "b.bin");
    let mut handle = disk.binary(crate::AccessMode::Read).unwrap();
    assert_eq!(handle.read(3).unwrap(), b"abc");
}

#[cfg(unix)]
#[test]
fn executable_bit_and_symlinks() {
    use std::os::unix::fs::{symlink, PermissionsExt};
    let td = tempfile::tempdir().unwrap();
    let script = td.path().join("run.sh");
    fs::write(&script, b"#!/bin/sh\n").unwrap();
    let disk = disk_in(td.path(), "run.sh");
    assert!(!disk.is_executable());
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    assert!(disk.is_executable());

    symlink(&script, td.path().join("link")).unwrap();
    let link = disk_in(td.path(), "link");
    assert!(link.is_symlink());
    assert!(!disk.is_symlink());
}
