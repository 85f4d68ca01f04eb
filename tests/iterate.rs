//! Integration test for the read-only iteration API, in the same style as
//! the teacher's own `tests/integration_test.rs`.

use dcfh_core::{encode_file, iterate, Entry, HashAlgorithm};
use tempfile::NamedTempFile;

fn sample_entry(path: &str) -> Entry {
    Entry {
        ctime_wall: 10,
        mtime_wall: 20,
        dev: 1,
        ino: 2,
        mode: 0o100644,
        uid: 1000,
        gid: 1000,
        file_size: 5,
        entry_flags: 0,
        hash_type: dcfh_core::hash::HASH_TYPE_BLAKE3,
        hash: HashAlgorithm::Blake3.hash_into_buf(path.as_bytes()),
        path: path.to_owned(),
    }
}

#[test]
fn iterate_reports_main_index_tag_from_filename() {
    let entries = vec![sample_entry("a"), sample_entry("b/c")];
    let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.idx");
    std::fs::write(&path, &bytes).unwrap();

    let mut tags = Vec::new();
    iterate(&path, |view| {
        tags.push(format!("{:?}", view.index_tag));
        true
    })
    .unwrap();

    assert_eq!(tags, vec!["Main", "Main"]);
}

#[test]
fn iterate_over_arbitrary_filename_reports_scan_tag() {
    let entries = vec![sample_entry("x")];
    let bytes = encode_file(HashAlgorithm::Blake3, &entries).unwrap();

    let file = tempfile::Builder::new().suffix(".idx").tempfile().unwrap();
    std::fs::write(file.path(), &bytes).unwrap();

    let mut saw_scan_tag = false;
    iterate(file.path(), |view| {
        if matches!(view.index_tag, dcfh_core::IndexTag::Scan(_)) {
            saw_scan_tag = true;
        }
        true
    })
    .unwrap();

    assert!(saw_scan_tag);
}
