//! SSTable Builder
//!
//! Streams sorted records into a new table. The table is written under a
//! temporary name and renamed into place by `finish`, so a crash mid-flush
//! never leaves a half-written `.sst` for the storage manager to trip over.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StashError};
use crate::memtable::MemTableEntry;

use super::{SSTable, HEADER_SIZE, MAGIC, NO_EXPIRY, RECORD_HEADER_SIZE, TOMBSTONE_MARKER, VERSION};

/// Writes one SSTable; records must arrive in strictly ascending key order
pub struct SSTableBuilder {
    /// Final location, valid only after `finish`
    path: PathBuf,
    /// Where bytes go until `finish`
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    /// Offset the next record starts at
    offset: u64,
    /// key → record offset, in insertion (= key) order
    index: Vec<(Vec<u8>, u64)>,
    data_crc: crc32fast::Hasher,
    /// Reused encoding buffer for one record
    scratch: Vec<u8>,
}

impl SSTableBuilder {
    pub fn new(path: &Path) -> Result<Self> {
        let tmp_path = path.with_extension("sst.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);
        // The entry count is unknown yet; finish() patches it
        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&VERSION.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes());
        writer.write_all(&header)?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            offset: HEADER_SIZE,
            index: Vec::new(),
            data_crc: crc32fast::Hasher::new(),
            scratch: Vec::new(),
        })
    }

    /// Append a live value
    pub fn add(&mut self, key: &[u8], value: &[u8], expires_at: Option<u64>) -> Result<()> {
        if value.len() >= TOMBSTONE_MARKER as usize {
            return Err(StashError::Storage(format!(
                "value too large for SSTable: {} bytes",
                value.len()
            )));
        }
        self.append(key, Some(value), expires_at)
    }

    /// Append a deletion marker
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.append(key, None, None)
    }

    /// Append a memtable entry of either kind
    pub fn add_entry(&mut self, key: &[u8], entry: &MemTableEntry) -> Result<()> {
        match entry {
            MemTableEntry::Value { value, expires_at } => self.add(key, value, *expires_at),
            MemTableEntry::Tombstone => self.add_tombstone(key),
        }
    }

    fn append(&mut self, key: &[u8], value: Option<&[u8]>, expires_at: Option<u64>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(StashError::Storage(format!(
                    "SSTable keys out of order: {:?} after {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                )));
            }
        }

        let val_len = value.map_or(TOMBSTONE_MARKER, |v| v.len() as u32);

        self.scratch.clear();
        self.scratch.extend_from_slice(&(key.len() as u32).to_le_bytes());
        self.scratch.extend_from_slice(&val_len.to_le_bytes());
        self.scratch
            .extend_from_slice(&expires_at.unwrap_or(NO_EXPIRY).to_le_bytes());
        debug_assert_eq!(self.scratch.len(), RECORD_HEADER_SIZE);
        self.scratch.extend_from_slice(key);
        if let Some(v) = value {
            self.scratch.extend_from_slice(v);
        }

        self.writer.write_all(&self.scratch)?;
        self.data_crc.update(&self.scratch);

        self.index.push((key.to_vec(), self.offset));
        self.offset += self.scratch.len() as u64;
        Ok(())
    }

    /// Write the index block and footer, then move the table into place
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.offset;
        let entry_count = self.index.len() as u64;

        // Index block: [key_len(4)][offset(8)][key] per record
        let mut block = Vec::new();
        for (key, offset) in &self.index {
            block.extend_from_slice(&(key.len() as u32).to_le_bytes());
            block.extend_from_slice(&offset.to_le_bytes());
            block.extend_from_slice(key);
        }
        // Footer: index_offset (8) + data_crc (4) + padding (4)
        block.extend_from_slice(&index_offset.to_le_bytes());
        block.extend_from_slice(&self.data_crc.finalize().to_le_bytes());
        block.extend_from_slice(&[0u8; 4]);
        self.writer.write_all(&block)?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| StashError::Storage(format!("failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start((MAGIC.len() + 2) as u64))?;
        file.write_all(&entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;

        let min_key = self.index.first().map(|(k, _)| k.clone()).unwrap_or_default();
        let max_key = self.index.last().map(|(k, _)| k.clone()).unwrap_or_default();

        Ok(SSTable {
            path: self.path,
            entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}
