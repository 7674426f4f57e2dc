//! SSTable Iterator
//!
//! Sequential iteration over a run of entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use bytes::Bytes;
use parking_lot::MutexGuard;

use crate::error::{Result, StashError};
use crate::memtable::MemTableEntry;

use super::{decode_record_header, RECORD_HEADER_SIZE, TOMBSTONE_MARKER};

/// Iterator over SSTable entries in sorted key order
///
/// Holds the reader's file lock until dropped.
pub struct SSTableIterator<'a> {
    file: MutexGuard<'a, BufReader<File>>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
    failed: bool,
}

impl<'a> SSTableIterator<'a> {
    /// Iterate from `start_offset` (a record boundary) up to `end_offset`
    pub(super) fn new(
        mut file: MutexGuard<'a, BufReader<File>>,
        start_offset: u64,
        end_offset: u64,
    ) -> Result<Self> {
        file.seek(SeekFrom::Start(start_offset))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: start_offset,
            failed: false,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, MemTableEntry)> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        let (key_len, val_len, expires_at) = decode_record_header(&header);

        let mut entry_size = (RECORD_HEADER_SIZE + key_len) as u64;
        if self.current_offset + entry_size > self.end_offset {
            return Err(StashError::Storage(format!(
                "SSTable record at offset {} overruns data block",
                self.current_offset
            )));
        }

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;

        let entry = if val_len == TOMBSTONE_MARKER {
            MemTableEntry::Tombstone
        } else {
            let mut v = vec![0u8; val_len as usize];
            self.file.read_exact(&mut v)?;
            entry_size += val_len as u64;
            MemTableEntry::Value {
                value: Bytes::from(v),
                expires_at,
            }
        };

        self.current_offset += entry_size;
        Ok((key, entry))
    }
}

impl Iterator for SSTableIterator<'_> {
    /// (key, entry) — entry may be a tombstone
    type Item = Result<(Vec<u8>, MemTableEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        let item = self.read_entry();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}
