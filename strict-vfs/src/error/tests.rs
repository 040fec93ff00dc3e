use super::*;
use crate::validator::{Rule, Violation, Violations};
use std::error::Error as _;
use std::io;
use std::path::{Path, PathBuf};

#[test]
fn truncate_path_display_preserves_short_paths() {
    let path = Path::new("safe/path.txt");
    let rendered = truncate_path_display(path, 256);
    assert_eq!(rendered, path.to_string_lossy());
}

#[test]
fn truncate_path_display_inserts_ellipsis_for_long_paths() {
    let segment = "verylongcomponent".repeat(20);
    let path = PathBuf::from(format!("/root/{segment}/tail.txt"));
    let max_len = 48;
    let rendered = truncate_path_display(&path, max_len);
    assert!(rendered.chars().count() <= max_len);
    assert!(rendered.contains("..."));
    assert!(rendered.ends_with("tail.txt"));
}

#[test]
fn io_errors_are_promoted_to_their_kind() {
    let missing = VfsError::io(
        "open",
        "/tmp/missing",
        io::Error::new(io::ErrorKind::NotFound, "gone"),
    );
    assert!(matches!(missing, VfsError::NotFound { .. }));
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    let denied = VfsError::io(
        "open",
        "/tmp/locked",
        io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
    );
    assert_eq!(denied.kind(), ErrorKind::AccessDenied);

    let other = VfsError::io("write", "/tmp/x", io::Error::other("disk on fire"));
    assert_eq!(other.kind(), ErrorKind::Runtime);
    assert!(other.source().is_some());
}

#[test]
fn constraint_violation_lists_every_rule() {
    let violations = Violations::from(vec![
        Violation::new(Rule::InAllowedRoots, PathBuf::from("/etc/passwd"), "outside"),
        Violation::new(Rule::InSafeRoot, PathBuf::from("/etc/passwd"), "escapes"),
    ]);
    let err = VfsError::from(violations);
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    let listed = err.violations().map(|v| v.len()).unwrap_or_default();
    assert_eq!(listed, 2);
    let rendered = err.to_string();
    assert!(rendered.contains("/etc/passwd"));
    assert!(rendered.contains("in_allowed_roots"));
    assert!(rendered.contains("in_saferoot"));
}

#[test]
fn remaining_kinds_classify() {
    assert_eq!(
        VfsError::unsupported("memory", "list").kind(),
        ErrorKind::Unsupported
    );
    assert_eq!(
        VfsError::InvalidValue("empty".into()).kind(),
        ErrorKind::InvalidValue
    );
    assert_eq!(
        VfsError::stale("/tmp/a", "size changed").kind(),
        ErrorKind::Runtime
    );
    let past_end = VfsError::ReadPastEnd {
        target: "memory".into(),
        position: 4,
        requested: 10,
        size: 8,
    };
    assert_eq!(past_end.kind(), ErrorKind::InvalidValue);
    assert!(past_end.to_string().contains("exceeds size 8"));
    assert_eq!(
        VfsError::wrong_type("/tmp", "file").kind(),
        ErrorKind::NotFound
    );
}
