//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, StashError};
use crate::memtable::MemTableEntry;

use super::iterator::SSTableIterator;
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// The file handle sits behind a mutex so lookups take `&self` and the
/// storage manager can serve concurrent readers under a shared lock.
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading entries
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    /// Metadata
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header and data checksum, then loads the index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(StashError::Storage(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(StashError::Storage(format!(
                "Invalid SSTable magic: expected STKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(StashError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let mut count = [0u8; 8];
        count.copy_from_slice(&header[6..14]);
        let entry_count = u64::from_le_bytes(count);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let mut offset_bytes = [0u8; 8];
        offset_bytes.copy_from_slice(&footer[0..8]);
        let index_offset = u64::from_le_bytes(offset_bytes);
        let data_crc = u32::from_le_bytes([footer[8], footer[9], footer[10], footer[11]]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(StashError::Storage(format!(
                "SSTable {} has invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Verify data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        let actual_crc = crc32fast::hash(&data);
        if actual_crc != data_crc {
            return Err(StashError::Storage(format!(
                "SSTable {} data CRC mismatch: expected {:#010x}, got {:#010x}",
                path.display(),
                data_crc,
                actual_crc
            )));
        }
        drop(data);

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;
        let index = Self::parse_index(&index_data)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Parse index entries: [key_len(4)][offset(8)][key]
    fn parse_index(index_data: &[u8]) -> Result<BTreeMap<Vec<u8>, u64>> {
        let truncated = || StashError::Storage("Truncated SSTable index".to_string());

        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            let len_bytes = index_data.get(pos..pos + 4).ok_or_else(truncated)?;
            let key_len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
            pos += 4;

            let mut offset = [0u8; 8];
            offset.copy_from_slice(index_data.get(pos..pos + 8).ok_or_else(truncated)?);
            pos += 8;

            let key = index_data.get(pos..pos + key_len).ok_or_else(truncated)?;
            pos += key_len;

            index.insert(key.to_vec(), u64::from_le_bytes(offset));
        }
        Ok(index)
    }

    /// Get an entry by key — O(log n) lookup via in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(entry))` — key is in this SSTable (possibly a tombstone)
    /// - `Ok(None)` — key not in this SSTable
    pub fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        let mut iter = SSTableIterator::new(self.file.lock(), offset, self.index_offset)?;
        match iter.next() {
            Some(Ok((found, entry))) if found == key => Ok(Some(entry)),
            Some(Ok(_)) => Err(StashError::Storage(format!(
                "SSTable {} index points at the wrong record",
                self.path.display()
            ))),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Iterate over all entries
    pub fn iter(&self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(self.file.lock(), HEADER_SIZE, self.index_offset)
    }

    /// Iterate over entries with key >= `start`
    pub fn iter_from(&self, start: &[u8]) -> Result<SSTableIterator<'_>> {
        self.iter_range(Bound::Included(start))
    }

    /// Iterate over entries with key past `start`; records are read from
    /// disk only as the iterator advances
    pub fn iter_range(&self, start: Bound<&[u8]>) -> Result<SSTableIterator<'_>> {
        let offset = self
            .index
            .range::<[u8], _>((start, Bound::Unbounded))
            .next()
            .map(|(_, &off)| off)
            .unwrap_or(self.index_offset);
        SSTableIterator::new(self.file.lock(), offset, self.index_offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
