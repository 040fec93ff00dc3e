use crate::{FsAdapter, MemoryFs};
use std::io::{ErrorKind, Read as _, Write as _};
use std::path::Path;

#[test]
fn starts_with_only_the_root() {
    let fs = MemoryFs::new();
    assert!(fs.is_empty());
    assert_eq!(fs.len(), 1);
    assert!(fs.metadata(Path::new("/")).unwrap().is_dir);
}

#[test]
fn files_need_an_existing_parent() {
    let fs = MemoryFs::new();
    let err = fs.write(Path::new("/missing/f"), b"x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    fs.write(Path::new("/f"), b"x").unwrap();
    let err = fs.write(Path::new("/f/g"), b"x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotADirectory);
}

#[test]
fn writers_stream_into_the_tree() {
    let fs = MemoryFs::new();
    fs.write(Path::new("/log"), b"old").unwrap();
    {
        let mut writer = fs.open_write(Path::new("/log")).unwrap();
        writer.write_all(b"part one, ").unwrap();
        writer.write_all(b"part two").unwrap();
    }
    let mut text = String::new();
    fs.open_read(Path::new("/log"))
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "part one, part two");
    assert_eq!(fs.read_range(Path::new("/log"), 5, Some(3)).unwrap(), b"one");
}

#[test]
fn clones_share_the_tree() {
    let fs = MemoryFs::new();
    let view = fs.clone();
    fs.create_dir(Path::new("/shared")).unwrap();
    assert!(view.exists(Path::new("/shared")));
}

#[test]
fn read_dir_lists_direct_children_only() {
    let fs = MemoryFs::new();
    fs.create_dir_all(Path::new("/a/b/c")).unwrap();
    fs.write(Path::new("/a/one"), b"1").unwrap();
    fs.write(Path::new("/a/b/two"), b"2").unwrap();

    let mut names: Vec<_> = fs
        .read_dir(Path::new("/a"))
        .unwrap()
        .into_iter()
        .map(|entry| (entry.name.into_string().unwrap(), entry.is_dir))
        .collect();
    names.sort();
    assert_eq!(names, [("b".to_string(), true), ("one".to_string(), false)]);
}

#[test]
fn create_dir_rejects_duplicates() {
    let fs = MemoryFs::new();
    fs.create_dir(Path::new("/d")).unwrap();
    let err = fs.create_dir(Path::new("/d")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    fs.create_dir_all(Path::new("/d")).unwrap();
}

#[test]
fn remove_dir_requires_empty_and_never_drops_the_root() {
    let fs = MemoryFs::new();
    fs.create_dir_all(Path::new("/x/y")).unwrap();
    fs.write(Path::new("/x/y/z"), b"1").unwrap();
    // A sibling that sorts right after the prefix must survive.
    fs.write(Path::new("/x y"), b"keep").unwrap();

    let err = fs.remove_dir(Path::new("/x")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DirectoryNotEmpty);

    fs.remove_dir_all(Path::new("/x")).unwrap();
    assert!(!fs.exists(Path::new("/x")));
    assert!(!fs.exists(Path::new("/x/y/z")));
    assert!(fs.exists(Path::new("/x y")));

    assert!(fs.remove_dir(Path::new("/")).is_err());
    fs.remove_dir_all(Path::new("/")).unwrap();
    assert!(fs.exists(Path::new("/")));
    assert!(fs.is_empty());
}

#[test]
fn rename_moves_whole_subtrees() {
    let fs = MemoryFs::new();
    fs.create_dir_all(Path::new("/src/deep")).unwrap();
    fs.write(Path::new("/src/deep/file"), b"data").unwrap();
    fs.create_dir(Path::new("/dst")).unwrap();

    fs.rename(Path::new("/src"), Path::new("/dst/moved")).unwrap();
    assert!(!fs.exists(Path::new("/src")));
    assert_eq!(fs.read(Path::new("/dst/moved/deep/file")).unwrap(), b"data");

    let err = fs
        .rename(Path::new("/dst"), Path::new("/dst/moved/inside"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn rename_never_orphans_an_existing_tree() {
    let fs = MemoryFs::new();
    fs.create_dir_all(Path::new("/old/keep")).unwrap();
    fs.write(Path::new("/old/keep/f"), b"kept").unwrap();
    fs.create_dir(Path::new("/new")).unwrap();
    fs.write(Path::new("/file"), b"x").unwrap();

    let err = fs.rename(Path::new("/new"), Path::new("/old")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DirectoryNotEmpty);
    assert_eq!(fs.read(Path::new("/old/keep/f")).unwrap(), b"kept");

    let err = fs.rename(Path::new("/file"), Path::new("/old")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IsADirectory);
    let err = fs.rename(Path::new("/new"), Path::new("/file")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotADirectory);

    fs.create_dir(Path::new("/empty")).unwrap();
    fs.rename(Path::new("/old"), Path::new("/empty")).unwrap();
    assert_eq!(fs.read(Path::new("/empty/keep/f")).unwrap(), b"kept");
    assert!(!fs.exists(Path::new("/old/keep")));

    fs.rename(Path::new("/file"), Path::new("/file")).unwrap();
    assert_eq!(fs.read(Path::new("/file")).unwrap(), b"x");
}

#[test]
fn copy_and_touch() {
    let fs = MemoryFs::new();
    fs.write(Path::new("/a"), b"abc").unwrap();
    fs.copy(Path::new("/a"), Path::new("/b")).unwrap();
    assert_eq!(fs.read(Path::new("/b")).unwrap(), b"abc");

    fs.touch(Path::new("/empty")).unwrap();
    assert_eq!(fs.metadata(Path::new("/empty")).unwrap().len, 0);
    let before = fs.metadata(Path::new("/a")).unwrap().modified;
    fs.touch(Path::new("/a")).unwrap();
    assert!(fs.metadata(Path::new("/a")).unwrap().modified >= before);
    assert_eq!(fs.read(Path::new("/a")).unwrap(), b"abc");
}

#[test]
fn dot_dot_never_leaves_the_root() {
    let fs = MemoryFs::new();
    fs.write(Path::new("/../../top"), b"t").unwrap();
    assert_eq!(fs.read(Path::new("/top")).unwrap(), b"t");
}
