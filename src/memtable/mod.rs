//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and prefix scans
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (required for SSTable generation and range scans)
//! - In-memory stores never flush, so the memtable is the whole store

mod table;

pub use table::{MemTable, MemTableIterator};

use bytes::Bytes;

use crate::expiry;

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemTableEntry {
    /// A live value, optionally expiring at a unix-millis deadline
    Value {
        value: Bytes,
        expires_at: Option<u64>,
    },

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// Value without expiry
    pub fn value(value: impl Into<Bytes>) -> Self {
        MemTableEntry::Value {
            value: value.into(),
            expires_at: None,
        }
    }

    /// The value if the entry is present and unexpired at `now`
    pub fn live_value(&self, now: u64) -> Option<&Bytes> {
        match self {
            MemTableEntry::Value { value, expires_at } if !expiry::is_expired(*expires_at, now) => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Approximate bytes this entry accounts for
    pub(crate) fn footprint(&self, key: &[u8]) -> usize {
        let value_len = match self {
            MemTableEntry::Value { value, .. } => value.len() + 8,
            MemTableEntry::Tombstone => 0,
        };
        key.len() + value_len
    }
}
