#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! End-to-end tests of building, querying and updating database files
//!
//! Every test works on real files in a temporary directory and reopens the
//! database after each step, the way separate processes would.

use hcdb::{
    AtomicWriter, CdbReader, UpdateOptions, UpdateStats, append_pairs_with, remove_key_with,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};

fn options() -> UpdateOptions {
    UpdateOptions::default().with_sync(false)
}

fn make<K: AsRef<[u8]>, V: AsRef<[u8]>>(dir: &Path, pairs: &[(K, V)]) -> PathBuf {
    let path = dir.join("test.cdb");
    let mut writer = AtomicWriter::create_with(&path, options()).unwrap();
    for (key, value) in pairs {
        writer.put(key.as_ref(), value.as_ref()).unwrap();
    }
    writer.commit().unwrap();
    path
}

fn values(path: &Path, key: &[u8]) -> Vec<Vec<u8>> {
    let reader = CdbReader::open(path).unwrap();
    reader
        .get_all(key)
        .map(|value| value.unwrap().to_vec())
        .collect()
}

fn records(path: &Path) -> Vec<(Vec<u8>, Vec<u8>)> {
    let reader = CdbReader::open(path).unwrap();
    reader
        .iter()
        .map(|record| {
            let (key, value) = record.unwrap();
            (key.to_vec(), value.to_vec())
        })
        .collect()
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(Vec<u8>, Vec<u8>)> {
    pairs
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect()
}

#[test]
fn test_duplicate_keys_in_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = make(dir.path(), &[("a", "1"), ("b", "2"), ("a", "3")]);

    assert_eq!(values(&path, b"a"), vec![b"1".to_vec(), b"3".to_vec()]);
    assert_eq!(values(&path, b"b"), vec![b"2".to_vec()]);
    assert!(values(&path, b"c").is_empty());

    let reader = CdbReader::open(&path).unwrap();
    assert_eq!(reader.get(b"a").unwrap(), Some(b"1".as_slice()));
}

#[test]
fn test_add_then_remove() {
    let dir = tempfile::tempdir().unwrap();
    let path = make(dir.path(), &[("a", "1"), ("b", "2"), ("a", "3")]);

    let stats = append_pairs_with(&path, [("c", "4"), ("a", "5")], options()).unwrap();
    assert_eq!(
        stats,
        UpdateStats {
            copied: 3,
            added: 2,
            removed: 0
        }
    );
    assert_eq!(
        values(&path, b"a"),
        vec![b"1".to_vec(), b"3".to_vec(), b"5".to_vec()]
    );

    let stats = remove_key_with(&path, b"a", options()).unwrap();
    assert_eq!(stats.removed, 3);
    assert_eq!(records(&path), owned(&[("b", "2"), ("c", "4")]));
}

#[test]
fn test_remove_last_key_leaves_valid_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = make(dir.path(), &[("only", "one")]);

    remove_key_with(&path, b"only", options()).unwrap();

    let reader = CdbReader::open(&path).unwrap();
    assert!(reader.is_empty());
    assert_eq!(reader.iter().count(), 0);
    assert_eq!(reader.get(b"only").unwrap(), None);
}

#[test]
fn test_binary_keys_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let key: &[u8] = &[0, 255, 10, 13, 0];
    let value: &[u8] = &[0xde, 0xad, 0xbe, 0xef];
    let path = make(
        dir.path(),
        &[
            (key.to_vec(), value.to_vec()),
            (Vec::new(), Vec::new()),
            (b"empty".to_vec(), Vec::new()),
        ],
    );

    assert_eq!(values(&path, key), vec![value.to_vec()]);
    assert_eq!(values(&path, b""), vec![Vec::new()]);
    assert_eq!(values(&path, b"empty"), vec![Vec::new()]);
}

#[test]
fn test_many_records_survive_updates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.cdb");

    let mut writer = AtomicWriter::create_with(&path, options()).unwrap();
    for i in 0..5_000u32 {
        writer
            .put(format!("key{i}").as_bytes(), &i.to_le_bytes())
            .unwrap();
    }
    writer.commit().unwrap();

    remove_key_with(&path, b"key2500", options()).unwrap();
    append_pairs_with(&path, [("key2500", "replaced")], options()).unwrap();

    let reader = CdbReader::open(&path).unwrap();
    assert_eq!(reader.len(), 5_000);
    for i in (0..5_000u32).filter(|&i| i != 2500) {
        let value = reader.get(format!("key{i}").as_bytes()).unwrap();
        assert_eq!(value, Some(i.to_le_bytes().as_slice()), "key{i}");
    }
    assert_eq!(
        reader.get(b"key2500").unwrap(),
        Some(b"replaced".as_slice())
    );

    // Removed key moved to the end of the data region
    let (last_key, _) = reader.iter().last().unwrap().unwrap();
    assert_eq!(last_key, b"key2500");
}

#[test]
fn test_updates_leave_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = make(dir.path(), &[("a", "1")]);

    append_pairs_with(&path, [("b", "2")], options()).unwrap();
    remove_key_with(&path, b"a", options()).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["test.cdb".to_string()]);
}

#[test]
fn test_truncated_file_is_rejected_without_damage() {
    let dir = tempfile::tempdir().unwrap();
    let path = make(dir.path(), &[("a", "1"), ("b", "2")]);

    let mut bytes = fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 100);
    fs::write(&path, &bytes).unwrap();

    let err = CdbReader::open(&path).unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {err}");

    let err = append_pairs_with(&path, [("c", "3")], options()).unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(fs::read(&path).unwrap(), bytes);
}
