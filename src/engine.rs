//! Engine Module
//!
//! The transactional storage engine underneath every store.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage (durable mode)
//! - Run read-only and read-write transactions
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::fs::{self, File, OpenOptions};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn, Level};

use crate::config::{Config, StorageTarget};
use crate::error::{Result, StashError};
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;
use crate::transaction::{ReadTxn, Transaction, WriteTxn};
use crate::wal::{Operation, WalEntry, WalRecovery, WalWriter};

/// The storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Write transactions** (`update`): serialized by `write_lock` for their
///   whole duration, so a read-modify-write such as pop sees no interleaved
///   writer. Commit order: WAL → memtable (under `commit_lock` write) →
///   flush if the memtable is full.
///
/// - **Read transactions** (`view`): hold `commit_lock` shared for their
///   duration, so a batch is either fully visible or not at all. Many
///   readers run concurrently; they only wait for a commit being applied.
///   The shared lock is taken recursively, so a read nested inside another
///   read on the same thread never queues behind a waiting committer.
///
/// A durable engine holds an exclusive lock on `{data_dir}/LOCK` until it
/// is dropped; a second engine on the same directory fails to open.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// WAL + SSTables, absent for in-memory engines
    disk: Option<DiskState>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Serializes write transactions
    write_lock: Mutex<()>,

    /// Readers shared, commit application and flush exclusive
    commit_lock: RwLock<()>,
}

/// Sorted records from one source, tombstones included
pub type Run = Vec<(Vec<u8>, MemTableEntry)>;

/// Durable half of an engine
struct DiskState {
    data_dir: PathBuf,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Exclusive lock on the directory; last field, so it is released only
    /// after the WAL has been dropped
    _lock: File,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";
    const LOCK_FILENAME: &'static str = "LOCK";

    /// Open or create an engine with the given config
    ///
    /// Durable startup:
    /// 1. Open/create data directory and lock it
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush recovered data, truncate WAL
    /// 4. Ready to serve transactions
    ///
    /// Fails with [`StashError::Locked`] while another engine, in this
    /// process or another, has the directory open.
    pub fn open(config: Config) -> Result<Self> {
        let memtable = MemTable::new();

        let disk = match &config.target {
            StorageTarget::InMemory => None,
            StorageTarget::Path(dir) => Some(Self::open_disk(dir, &config, &memtable)?),
        };

        if Level::INFO <= config.log_level {
            info!(store = %config.target, "engine opened");
        }

        Ok(Self {
            config,
            disk,
            memtable,
            write_lock: Mutex::new(()),
            commit_lock: RwLock::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Open an empty in-memory engine with default settings
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Config::in_memory())
    }

    fn open_disk(data_dir: &Path, config: &Config, memtable: &MemTable) -> Result<DiskState> {
        fs::create_dir_all(data_dir)?;
        let lock = Self::lock_dir(data_dir)?;

        // Paths derived from data_dir, not configurable
        let storage_dir = data_dir.join(Self::SSTABLE_DIR);
        let wal_path = data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;

        let mut recovered = false;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;

            if result.entries_corrupted > 0 || result.was_truncated {
                if Level::WARN <= config.log_level {
                    warn!(
                        recovered = result.entries_recovered,
                        corrupted = result.entries_corrupted,
                        last_lsn = result.last_lsn,
                        "WAL tail discarded during recovery"
                    );
                }
            } else if result.entries_recovered > 0 && Level::INFO <= config.log_level {
                info!(
                    recovered = result.entries_recovered,
                    last_lsn = result.last_lsn,
                    "WAL recovery complete"
                );
            }

            for entry in entries {
                memtable.apply(entry.operations);
            }

            // Flush recovered data so the WAL can start empty
            if !memtable.is_empty() {
                if Level::INFO <= config.log_level {
                    info!(entries = memtable.entry_count(), "flushing recovered entries to SSTable");
                }
                storage.flush(memtable)?;
                memtable.clear();
                recovered = true;
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        if recovered {
            wal.truncate()?;
        }

        Ok(DiskState {
            data_dir: data_dir.to_path_buf(),
            storage_dir,
            wal: Mutex::new(wal),
            storage,
            _lock: lock,
        })
    }

    /// Take the directory's exclusive lock without blocking
    fn lock_dir(data_dir: &Path) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(data_dir.join(Self::LOCK_FILENAME))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(StashError::Locked(data_dir.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Run `f` inside a read-only transaction
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ReadTxn<'_>) -> Result<T>,
    {
        let txn = ReadTxn::new(self, self.commit_lock.read_recursive());
        f(&txn)
    }

    /// Run `f` inside a read-write transaction
    ///
    /// If `f` returns `Ok` its writes are committed atomically; if it
    /// returns `Err` they are discarded and the error is returned.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<T>,
    {
        let mut txn = WriteTxn::new(self, self.write_lock.lock());
        let out = f(&mut txn)?;

        // Keep the write lock until the batch is applied
        let (operations, _write_guard) = txn.finish();
        self.commit(operations)?;
        Ok(out)
    }

    /// Apply a batch (called with the write lock held via WriteTxn)
    fn commit(&self, operations: Vec<Operation>) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }

        let operations = match &self.disk {
            Some(disk) => {
                let mut wal = disk.wal.lock();
                let entry = WalEntry::new(wal.current_lsn(), operations);
                wal.append_entry(&entry)?;
                entry.operations
            }
            None => operations,
        };

        let count = operations.len();
        let new_size = {
            let _commit = self.commit_lock.write();
            self.memtable.apply(operations)
        };

        if Level::DEBUG <= self.config.log_level {
            debug!(operations = count, memtable_size = new_size, "transaction committed");
        }

        // The batch is durable in the WAL; a failed flush is retried on the
        // next commit rather than failing this one.
        if self.disk.is_some() && new_size >= self.config.memtable_size_limit {
            if let Err(e) = self.flush_internal() {
                error!(error = %e, "memtable flush failed");
            }
        }

        Ok(())
    }

    // =========================================================================
    // Committed-state reads (caller holds commit_lock or write_lock)
    // =========================================================================

    /// Newest record for a key: MemTable first, then SSTables
    pub(crate) fn lookup(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(Some(entry));
        }
        match &self.disk {
            Some(disk) => disk.storage.get(key),
            None => Ok(None),
        }
    }

    /// Up to `limit` records past `start` from every source, oldest
    /// source first (SSTables oldest → newest, then the memtable)
    pub(crate) fn committed_runs(&self, start: Bound<&[u8]>, limit: usize) -> Result<Vec<Run>> {
        let mut runs = match &self.disk {
            Some(disk) => disk.storage.runs_from(start, limit)?,
            None => Vec::new(),
        };
        runs.push(self.memtable.range_chunk(start, limit));
        Ok(runs)
    }

    // =========================================================================
    // Single-operation conveniences
    // =========================================================================

    /// Get a visible value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.view(|txn| txn.get(key))
    }

    /// Put a key-value pair in its own transaction
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.update(|txn| {
            txn.set(key, value);
            Ok(())
        })
    }

    /// Delete a key in its own transaction
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.update(|txn| {
            txn.delete(key);
            Ok(())
        })
    }

    // =========================================================================
    // Flush / Close
    // =========================================================================

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size. No-op in memory mode.
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        let disk = match &self.disk {
            Some(disk) => disk,
            None => return Ok(()),
        };

        if self.memtable.is_empty() {
            return Ok(());
        }

        // Readers must not observe the gap between the new SSTable and the
        // cleared memtable
        let _commit = self.commit_lock.write();

        let table = disk.storage.flush(&self.memtable)?;
        self.memtable.clear();
        disk.wal.lock().truncate()?;

        if Level::INFO <= self.config.log_level {
            info!(
                path = %table.path.display(),
                entries = table.entry_count,
                bytes = table.file_size,
                "memtable flushed"
            );
        }

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;
        if let Some(disk) = &self.disk {
            disk.wal.lock().sync()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path (None in memory mode)
    pub fn data_dir(&self) -> Option<&Path> {
        self.disk.as_ref().map(|d| d.data_dir.as_path())
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> Option<&Path> {
        self.disk.as_ref().map(|d| d.storage_dir.as_path())
    }

    pub fn is_in_memory(&self) -> bool {
        self.disk.is_none()
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.disk.as_ref().map(|d| d.storage.sstable_count()).unwrap_or(0)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
