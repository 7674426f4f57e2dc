//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "STKV" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][ExpiresAt: u64][Key][Value]│
//! │   ... repeated for each entry ...                       │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)   │
//! │   (ExpiresAt = 0 means no expiry)                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Offset: u64][Key]                       │
//! │   ... repeated for each entry ...                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a StashKV SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"STKV";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Per-record header: KeyLen (4) + ValLen (4) + ExpiresAt (8)
pub(crate) const RECORD_HEADER_SIZE: usize = 16;

/// Sentinel value indicating a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Sentinel value for "no expiry"
pub(crate) const NO_EXPIRY: u64 = 0;

// =============================================================================
// SSTable Metadata
// =============================================================================

/// Metadata describing a freshly written SSTable
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of entries in this SSTable
    pub entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}

/// Decode a record header into (key_len, val_len, expires_at)
pub(crate) fn decode_record_header(header: &[u8; RECORD_HEADER_SIZE]) -> (usize, u32, Option<u64>) {
    let mut key_len = [0u8; 4];
    let mut val_len = [0u8; 4];
    let mut expires = [0u8; 8];
    key_len.copy_from_slice(&header[0..4]);
    val_len.copy_from_slice(&header[4..8]);
    expires.copy_from_slice(&header[8..16]);

    let expires_at = match u64::from_le_bytes(expires) {
        NO_EXPIRY => None,
        at => Some(at),
    };
    (
        u32::from_le_bytes(key_len) as usize,
        u32::from_le_bytes(val_len),
        expires_at,
    )
}
