//! Tests for StorageManager
//!
//! These tests verify:
//! - Opening/creating storage directories
//! - Flushing MemTable to SSTable
//! - Newer SSTables shadow older ones, tombstones included
//! - Bounded range reads across SSTables
//! - Rediscovery of SSTables on reopen

use std::ops::Bound;
use std::path::PathBuf;

use bytes::Bytes;
use stashkv::memtable::{MemTable, MemTableEntry};
use stashkv::storage::StorageManager;
use stashkv::StashError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_storage() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sstables");
    (temp_dir, path)
}

fn memtable_with(puts: &[(&str, &str)], deletes: &[&str]) -> MemTable {
    let memtable = MemTable::new();
    for (key, value) in puts {
        memtable.put(key.as_bytes().to_vec(), Bytes::copy_from_slice(value.as_bytes()), None);
    }
    for key in deletes {
        memtable.delete(key.as_bytes().to_vec());
    }
    memtable
}

fn value(v: &str) -> MemTableEntry {
    MemTableEntry::value(Bytes::copy_from_slice(v.as_bytes()))
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let (_temp, path) = setup_temp_storage();
    assert!(!path.exists());

    let manager = StorageManager::open(&path).unwrap();

    assert!(path.is_dir());
    assert_eq!(manager.sstable_count(), 0);
    assert_eq!(manager.next_sstable_id(), 1);
    assert_eq!(manager.data_dir(), path.as_path());
}

#[test]
fn test_reopen_discovers_sstables() {
    let (_temp, path) = setup_temp_storage();
    {
        let manager = StorageManager::open(&path).unwrap();
        manager.flush(&memtable_with(&[("k1", "v1")], &[])).unwrap();
        manager.flush(&memtable_with(&[("k2", "v2")], &[])).unwrap();
    }

    let manager = StorageManager::open(&path).unwrap();

    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.next_sstable_id(), 3);
    assert_eq!(manager.get(b"k1").unwrap(), Some(value("v1")));
    assert_eq!(manager.get(b"k2").unwrap(), Some(value("v2")));
}

#[test]
fn test_unrelated_files_are_ignored() {
    let (_temp, path) = setup_temp_storage();
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join("notes.txt"), b"hello").unwrap();
    std::fs::write(path.join("sstable_x.sst"), b"junk").unwrap();

    let manager = StorageManager::open(&path).unwrap();
    assert_eq!(manager.sstable_count(), 0);
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_writes_numbered_file() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    let sstable = manager
        .flush(&memtable_with(&[("a", "1"), ("b", "2")], &["c"]))
        .unwrap();

    assert_eq!(sstable.path, path.join("sstable_000001.sst"));
    assert_eq!(sstable.entry_count, 3);
    assert_eq!(manager.get(b"c").unwrap(), Some(MemTableEntry::Tombstone));
}

#[test]
fn test_flush_empty_memtable_is_error() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    assert!(matches!(manager.flush(&MemTable::new()), Err(StashError::Storage(_))));
    assert_eq!(manager.sstable_count(), 0);
}

// =============================================================================
// Shadowing Tests
// =============================================================================

#[test]
fn test_newer_sstable_wins() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    manager.flush(&memtable_with(&[("k", "old"), ("keep", "x")], &[])).unwrap();
    manager.flush(&memtable_with(&[("k", "new")], &[])).unwrap();

    assert_eq!(manager.get(b"k").unwrap(), Some(value("new")));
    assert_eq!(manager.get(b"keep").unwrap(), Some(value("x")));
    assert_eq!(manager.get(b"missing").unwrap(), None);
}

#[test]
fn test_tombstone_shadows_older_value() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    manager.flush(&memtable_with(&[("k", "v")], &[])).unwrap();
    manager.flush(&memtable_with(&[], &["k"])).unwrap();

    assert_eq!(manager.get(b"k").unwrap(), Some(MemTableEntry::Tombstone));
}

#[test]
fn test_runs_from_reads_each_table_oldest_first() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    manager
        .flush(&memtable_with(&[("a1", "1"), ("b1", "old"), ("b2", "2")], &[]))
        .unwrap();
    manager
        .flush(&memtable_with(&[("b1", "new"), ("c1", "3")], &["b2"]))
        .unwrap();

    let runs = manager.runs_from(Bound::Included(&b"b"[..]), 10).unwrap();

    assert_eq!(runs.len(), 2);
    assert_eq!(
        runs[0],
        vec![(b"b1".to_vec(), value("old")), (b"b2".to_vec(), value("2"))]
    );
    assert_eq!(
        runs[1],
        vec![
            (b"b1".to_vec(), value("new")),
            (b"b2".to_vec(), MemTableEntry::Tombstone),
            (b"c1".to_vec(), value("3")),
        ]
    );
}

#[test]
fn test_runs_from_respects_limit_and_exclusive_start() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    let puts: Vec<(String, String)> = (0..50).map(|i| (format!("k{:02}", i), "v".to_string())).collect();
    let refs: Vec<(&str, &str)> = puts.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    manager.flush(&memtable_with(&refs, &[])).unwrap();
    manager.flush(&memtable_with(&[("a", "early")], &[])).unwrap();

    let runs = manager.runs_from(Bound::Excluded(&b"k09"[..]), 3).unwrap();

    // The table holding only "a" ends before the start and is skipped
    assert_eq!(runs.len(), 1);
    let keys: Vec<&[u8]> = runs[0].iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![&b"k10"[..], &b"k11"[..], &b"k12"[..]]);
}
