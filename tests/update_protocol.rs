//! End-to-end scenarios for the update protocol (spec scenarios S1-S3, S6;
//! testable properties 5, 6, 8).

use std::fs;

use dcfh_core::{decode_file, update, update_using_cache, verify_file, UpdateOptions};
use tempfile::tempdir;

fn write_file(root: &std::path::Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

struct NeverCancel;
impl dcfh_core::CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[test]
fn s1_empty_tree_produces_zero_entry_main_index() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".dcfh")).unwrap();

    let options = UpdateOptions::default();
    let stats = update(dir.path(), &options, &NeverCancel).unwrap();
    assert_eq!(stats.entry_count, 0);

    let bytes = fs::read(dir.path().join(".dcfh/main.idx")).unwrap();
    let decoded = decode_file(&bytes).unwrap();
    assert_eq!(decoded.header.entry_count, 0);
    assert!(verify_file(&bytes).is_ok());

    let events = dcfh_core::status(dir.path(), &options, &NeverCancel).unwrap();
    assert!(events.is_empty());
}

#[test]
fn s2_five_files_one_change() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".dcfh")).unwrap();

    write_file(dir.path(), "a", "1");
    write_file(dir.path(), "b/c", "22");
    write_file(dir.path(), "b/d", "333");
    write_file(dir.path(), "e", "4444");
    write_file(dir.path(), "f", "55555");

    let options = UpdateOptions::default();
    update(dir.path(), &options, &NeverCancel).unwrap();

    write_file(dir.path(), "b/c", "xx");

    let events = dcfh_core::status(dir.path(), &options, &NeverCancel).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, "b/c");
    assert_eq!(events[0].kind, dcfh_core::DiffKind::Modified);

    let stats = update_using_cache(dir.path(), &options, &NeverCancel).unwrap();
    assert_eq!(stats.entry_count, 5);

    let bytes = fs::read(dir.path().join(".dcfh/main.idx")).unwrap();
    let decoded = decode_file(&bytes).unwrap();
    let bc = decoded.entries.iter().find(|e| e.path == "b/c").unwrap();
    assert_eq!(bc.file_size, 2);

    let expected_hash = dcfh_core::HashAlgorithm::Blake3.hash_into_buf(b"xx");
    assert_eq!(bc.hash, expected_hash);

    let f_entry = decoded.entries.iter().find(|e| e.path == "f").unwrap();
    assert_eq!(f_entry.file_size, 5);
}

#[test]
fn s3_delete_and_add() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".dcfh")).unwrap();

    for (name, contents) in [("a", "1"), ("b/c", "22"), ("b/d", "333"), ("e", "4444"), ("f", "55555")] {
        write_file(dir.path(), name, contents);
    }

    let options = UpdateOptions::default();
    update(dir.path(), &options, &NeverCancel).unwrap();

    fs::remove_file(dir.path().join("e")).unwrap();
    write_file(dir.path(), "g", "new");

    let events = dcfh_core::status(dir.path(), &options, &NeverCancel).unwrap();
    let kinds: Vec<_> = events.iter().map(|e| (e.path.clone(), e.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("e".to_owned(), dcfh_core::DiffKind::Deleted),
            ("g".to_owned(), dcfh_core::DiffKind::Added),
        ]
    );

    update_using_cache(dir.path(), &options, &NeverCancel).unwrap();

    let bytes = fs::read(dir.path().join(".dcfh/main.idx")).unwrap();
    let decoded = decode_file(&bytes).unwrap();
    let paths: Vec<&str> = decoded.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["a", "b/c", "b/d", "e", "f", "g"]);

    let e_entry = decoded.entries.iter().find(|e| e.path == "e").unwrap();
    assert!(e_entry.is_deleted());
}

#[test]
fn update_is_idempotent_with_no_filesystem_change() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".dcfh")).unwrap();
    write_file(dir.path(), "only", "x");

    let options = UpdateOptions::default();
    update(dir.path(), &options, &NeverCancel).unwrap();
    let first = decode_file(&fs::read(dir.path().join(".dcfh/main.idx")).unwrap()).unwrap();

    update(dir.path(), &options, &NeverCancel).unwrap();
    let second = decode_file(&fs::read(dir.path().join(".dcfh/main.idx")).unwrap()).unwrap();

    assert_eq!(first.entries.len(), second.entries.len());
    for (a, b) in first.entries.iter().zip(second.entries.iter()) {
        assert_eq!(a.path, b.path);
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.file_size, b.file_size);
    }
}

#[test]
fn s6_stale_tmp_file_is_removed_before_next_update() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".dcfh")).unwrap();
    write_file(dir.path(), "only", "x");

    let options = UpdateOptions::default();
    update(dir.path(), &options, &NeverCancel).unwrap();

    let prior = fs::read(dir.path().join(".dcfh/main.idx")).unwrap();

    // Simulate a crash between the tmp write (clean=1) and the rename: a
    // leftover main.idx.tmp with valid contents, main.idx untouched.
    fs::write(dir.path().join(".dcfh/main.idx.tmp"), &prior).unwrap();

    write_file(dir.path(), "second", "y");
    let stats = update(dir.path(), &options, &NeverCancel).unwrap();
    assert_eq!(stats.entry_count, 2);
    assert!(!dir.path().join(".dcfh/main.idx.tmp").exists());

    let bytes = fs::read(dir.path().join(".dcfh/main.idx")).unwrap();
    assert!(decode_file(&bytes).is_ok());
}

#[test]
fn soft_deleted_entry_is_a_no_op_on_second_update() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".dcfh")).unwrap();
    write_file(dir.path(), "keep", "1");
    write_file(dir.path(), "gone", "2");

    let options = UpdateOptions::default();
    update(dir.path(), &options, &NeverCancel).unwrap();

    fs::remove_file(dir.path().join("gone")).unwrap();
    update(dir.path(), &options, &NeverCancel).unwrap();

    let after_first_delete = decode_file(&fs::read(dir.path().join(".dcfh/main.idx")).unwrap()).unwrap();
    let gone = after_first_delete.entries.iter().find(|e| e.path == "gone").unwrap();
    assert!(gone.is_deleted());

    update(dir.path(), &options, &NeverCancel).unwrap();
    let after_second = decode_file(&fs::read(dir.path().join(".dcfh/main.idx")).unwrap()).unwrap();
    let gone2 = after_second.entries.iter().find(|e| e.path == "gone").unwrap();
    assert!(gone2.is_deleted());
    assert_eq!(gone.mtime_wall, gone2.mtime_wall);
}
