//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use super::MemTableEntry;
use crate::wal::Operation;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, MemTableEntry>>,
    /// Approximate size in bytes
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get an entry by key (read lock). Tombstones are returned as such.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock). Returns the new approximate size.
    pub fn put(&self, key: Vec<u8>, value: impl Into<Bytes>, expires_at: Option<u64>) -> usize {
        let entry = MemTableEntry::Value {
            value: value.into(),
            expires_at,
        };
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, entry)
    }

    /// Delete a key (write lock, inserts tombstone). Returns the new size.
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, MemTableEntry::Tombstone)
    }

    /// Apply a committed batch under one write lock. Returns the new size.
    pub fn apply(&self, operations: Vec<Operation>) -> usize {
        let mut data = self.data.write();
        let mut size = self.size.load(Ordering::Acquire);
        for op in operations {
            size = match op {
                Operation::Put {
                    key,
                    value,
                    expires_at,
                } => self.insert_locked(
                    &mut data,
                    key,
                    MemTableEntry::Value {
                        value: Bytes::from(value),
                        expires_at,
                    },
                ),
                Operation::Delete { key } => {
                    self.insert_locked(&mut data, key, MemTableEntry::Tombstone)
                }
            };
        }
        size
    }

    fn insert_locked(
        &self,
        data: &mut BTreeMap<Vec<u8>, MemTableEntry>,
        key: Vec<u8>,
        entry: MemTableEntry,
    ) -> usize {
        let added = entry.footprint(&key);
        let removed = data
            .get(&key)
            .map(|old| old.footprint(&key))
            .unwrap_or(0);
        data.insert(key, entry);

        if added >= removed {
            self.size.fetch_add(added - removed, Ordering::AcqRel) + (added - removed)
        } else {
            self.size.fetch_sub(removed - added, Ordering::AcqRel) - (removed - added)
        }
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Entries with key >= `start`, in sorted key order
    pub fn range_from(&self, start: &[u8]) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.data
            .read()
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// At most `limit` entries with key past `start`, in sorted key order
    pub fn range_chunk(&self, start: Bound<&[u8]>, limit: usize) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.data
            .read()
            .range::<[u8], _>((start, Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get an iterator over all entries (for flush)
    /// Returns entries in sorted key order
    pub fn iter(&self) -> MemTableIterator {
        MemTableIterator {
            inner: self.range_from(&[]).into_iter(),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::Release);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a snapshot of MemTable entries
pub struct MemTableIterator {
    inner: std::vec::IntoIter<(Vec<u8>, MemTableEntry)>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
