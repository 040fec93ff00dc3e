use crate::VfsPath;

#[test]
fn vfs_path_serializes_as_raw_string() {
    let path = VfsPath::new(["/srv/uploads", "../x.txt"]).unwrap();
    let json = serde_json::to_string(&path).unwrap();
    assert_eq!(json, serde_json::to_string(&path.raw().to_string_lossy()).unwrap());
    assert!(json.contains(".."));
}
