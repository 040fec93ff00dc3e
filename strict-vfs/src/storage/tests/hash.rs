use crate::storage::hash::digest_bytes;
use crate::{
    Adapter, Disk, ErrorKind, HashAlgorithm, HashTarget, LockMode, Memory, MemoryFs, Storage,
    Stream, WriteMode,
};
use std::io::Cursor;
use std::sync::Arc;

#[test]
fn known_digests() {
    assert_eq!(
        digest_bytes(HashAlgorithm::Sha256, b"abc").to_hex(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(
        digest_bytes(HashAlgorithm::Md5, b"abc").to_hex(),
        "900150983cd24fb0d6963f7d28e17f72"
    );
    let sha512 = digest_bytes(HashAlgorithm::Sha512, b"abc");
    assert_eq!(sha512.as_bytes().len(), 64);
    assert!(sha512.to_hex().starts_with("ddaf35a193617aba"));
    assert_eq!(sha512.algorithm(), HashAlgorithm::Sha512);
}

#[test]
fn algorithm_names_parse_back() {
    for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha256, HashAlgorithm::Sha512] {
        assert_eq!(algorithm.to_string().parse::<HashAlgorithm>().unwrap(), algorithm);
    }
    assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
    let err = "crc32".parse::<HashAlgorithm>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha256);
}

#[test]
fn content_hash_matches_across_backends() {
    let payload = b"the same bytes everywhere".to_vec();
    let expected = digest_bytes(HashAlgorithm::Sha256, &payload);

    let memory = Memory::new(payload.clone());

    let td = tempfile::tempdir().unwrap();
    let mut disk = Disk::new([td.path().join("p.bin")]).unwrap();
    disk.write(&payload, WriteMode::Truncate, LockMode::Advisory)
        .unwrap();

    let stream = Stream::new(Cursor::new(payload.clone()));

    let mut adapter = Adapter::new(Arc::new(MemoryFs::new()), "/p.bin");
    adapter
        .write(&payload, WriteMode::Truncate, LockMode::None)
        .unwrap();

    let storages: [&dyn Storage; 4] = [&memory, &disk, &stream, &adapter];
    for storage in storages {
        let digest = storage
            .hash(HashTarget::Content, HashAlgorithm::Sha256)
            .unwrap();
        assert_eq!(digest, expected, "{}", storage.describe());
    }
}

#[test]
fn name_and_path_targets() {
    let td = tempfile::tempdir().unwrap();
    let disk = Disk::new([td.path().join("named.txt")]).unwrap();
    let by_name = disk
        .hash(HashTarget::FileName, HashAlgorithm::Md5)
        .unwrap();
    assert_eq!(by_name, digest_bytes(HashAlgorithm::Md5, b"named.txt"));

    let by_path = disk
        .hash(HashTarget::FilePath, HashAlgorithm::Md5)
        .unwrap();
    let location = disk.location().unwrap();
    assert_eq!(
        by_path,
        digest_bytes(HashAlgorithm::Md5, location.as_os_str().as_encoded_bytes())
    );
    assert_ne!(by_name, by_path);
}
