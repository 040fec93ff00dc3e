use crate::path::path_history::{PathHistory, Raw};
use std::path::{Path, PathBuf};

#[test]
fn clamp_keeps_traversal_inside_virtual_root() {
    let clamped = PathHistory::<Raw>::new("../../etc/./passwd").clamp();
    assert_eq!(&*clamped, Path::new("/etc/passwd"));

    let reset = PathHistory::<Raw>::new("a/b/../c/../../../../d").clamp();
    assert_eq!(reset.into_inner(), PathBuf::from("/d"));
}

#[test]
fn clamp_treats_absolute_input_as_virtual_root() {
    let clamped = PathHistory::<Raw>::new("docs//tmp/../x").clamp();
    assert_eq!(&*clamped, Path::new("/docs/x"));
    let absolute = PathHistory::<Raw>::new("/a/b").clamp();
    assert_eq!(&*absolute, Path::new("/a/b"));
}

#[test]
fn resolve_is_none_for_missing_targets() {
    let td = tempfile::tempdir().unwrap();
    let missing = td.path().join("not-here");
    assert!(PathHistory::<Raw>::new(&missing).resolve().is_none());
    let present = PathHistory::<Raw>::new(td.path()).resolve().unwrap();
    assert_eq!(&*present, std::fs::canonicalize(td.path()).unwrap());
}

#[test]
fn boundary_check_hands_back_escaping_paths() {
    let td = tempfile::tempdir().unwrap();
    let root = std::fs::canonicalize(td.path()).unwrap();

    let inside = PathHistory::<Raw>::new(td.path().join("a/../b"))
        .canonicalize()
        .unwrap();
    assert!(inside.boundary_check(&root).is_ok());

    let outside = PathHistory::<Raw>::new(td.path().join("../escape"))
        .canonicalize()
        .unwrap();
    let rejected = outside.boundary_check(&root).unwrap_err();
    assert!(!rejected.starts_with(&root));
}
