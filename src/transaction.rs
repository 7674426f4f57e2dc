//! Transactions
//!
//! Read-only ([`ReadTxn`]) and read-write ([`WriteTxn`]) transactions over an
//! [`Engine`], plus an ordered iterator shared by both.
//!
//! Expiry is evaluated once, at the transaction's start time: an entry is
//! either visible for the whole transaction or not at all.
//!
//! Ordered reads are done in bounded steps. Each step takes at most `limit`
//! records from every source (SSTables, memtable, pending writes) and
//! merges them up to the smallest key at which a source was cut short, so
//! a scan only pays for the records it actually walks over.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{MutexGuard, RwLockReadGuard};

use crate::engine::{Engine, Run};
use crate::error::Result;
use crate::expiry;
use crate::memtable::MemTableEntry;
use crate::wal::Operation;

/// One bounded step of an ordered scan
#[derive(Debug, Default)]
pub struct ScanChunk {
    /// Visible entries, ascending
    pub entries: Vec<(Bytes, Bytes)>,
    /// Last key this step covered; `None` once the keyspace is exhausted
    pub resume: Option<Vec<u8>>,
}

/// Operations common to both transaction kinds
pub trait Transaction {
    /// Visible value for `key`; `None` if absent, deleted, or expired
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Visible entries past `start`, reading at most `limit` records from
    /// each source. Continue from `Bound::Excluded(resume)`.
    fn scan(&self, start: Bound<&[u8]>, limit: usize) -> Result<ScanChunk>;

    /// Every visible entry with key >= `start`, ascending
    fn entries_from(&self, start: &[u8]) -> Result<Vec<(Bytes, Bytes)>>
    where
        Self: Sized,
    {
        let mut it = self.iter();
        it.seek(start)?;
        let mut entries = Vec::new();
        while it.valid() {
            if let (Some(k), Some(v)) = (it.key(), it.value()) {
                entries.push((k.clone(), v.clone()));
            }
            it.next()?;
        }
        Ok(entries)
    }

    /// Ascending iterator; call `seek` or `rewind` before reading
    fn iter(&self) -> TxnIterator<'_, Self>
    where
        Self: Sized,
    {
        TxnIterator::new(self)
    }
}

/// Merge runs (oldest first) and keep the entries visible at `now`
fn merge_runs(runs: Vec<Run>, limit: usize, now: u64) -> ScanChunk {
    // A run cut short at `limit` says nothing about keys past its last one
    let resume = runs
        .iter()
        .filter(|run| run.len() >= limit)
        .filter_map(|run| run.last().map(|(k, _)| k.clone()))
        .min();

    let mut merged = BTreeMap::new();
    for run in runs {
        for (key, entry) in run {
            if resume.as_ref().map_or(true, |r| &key <= r) {
                merged.insert(key, entry);
            }
        }
    }

    let entries = merged
        .into_iter()
        .filter_map(|(key, entry)| {
            entry
                .live_value(now)
                .map(|value| (Bytes::from(key), value.clone()))
        })
        .collect();

    ScanChunk { entries, resume }
}

// =============================================================================
// Read-only
// =============================================================================

/// Read-only transaction; holds the engine's commit lock shared
pub struct ReadTxn<'a> {
    engine: &'a Engine,
    now: u64,
    _guard: RwLockReadGuard<'a, ()>,
}

impl<'a> ReadTxn<'a> {
    pub(crate) fn new(engine: &'a Engine, guard: RwLockReadGuard<'a, ()>) -> Self {
        Self {
            engine,
            now: expiry::now_millis(),
            _guard: guard,
        }
    }
}

impl Transaction for ReadTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self
            .engine
            .lookup(key)?
            .and_then(|entry| entry.live_value(self.now).cloned()))
    }

    fn scan(&self, start: Bound<&[u8]>, limit: usize) -> Result<ScanChunk> {
        let runs = self.engine.committed_runs(start, limit)?;
        Ok(merge_runs(runs, limit, self.now))
    }
}

// =============================================================================
// Read-write
// =============================================================================

/// Read-write transaction; holds the engine's writer lock
///
/// Writes are buffered and only reach the WAL and memtable when the
/// enclosing `Engine::update` closure returns `Ok`. Reads see the
/// transaction's own buffered writes.
pub struct WriteTxn<'a> {
    engine: &'a Engine,
    now: u64,
    /// Last write per key, in key order
    pending: BTreeMap<Vec<u8>, MemTableEntry>,
    guard: MutexGuard<'a, ()>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(engine: &'a Engine, guard: MutexGuard<'a, ()>) -> Self {
        Self {
            engine,
            now: expiry::now_millis(),
            pending: BTreeMap::new(),
            guard,
        }
    }

    /// Upsert without expiry
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.pending.insert(
            key.to_vec(),
            MemTableEntry::Value {
                value: Bytes::copy_from_slice(value),
                expires_at: None,
            },
        );
    }

    /// Upsert expiring `ttl` after the transaction started
    pub fn set_with_ttl(&mut self, key: &[u8], value: &[u8], ttl: Duration) {
        self.pending.insert(
            key.to_vec(),
            MemTableEntry::Value {
                value: Bytes::copy_from_slice(value),
                expires_at: Some(expiry::deadline_from(self.now, ttl)),
            },
        );
    }

    /// Delete; a missing key is not an error
    pub fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), MemTableEntry::Tombstone);
    }

    /// Number of buffered writes
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Turn buffered writes into a WAL batch, handing back the writer lock
    pub(crate) fn finish(self) -> (Vec<Operation>, MutexGuard<'a, ()>) {
        let operations = self
            .pending
            .into_iter()
            .map(|(key, entry)| match entry {
                MemTableEntry::Value { value, expires_at } => Operation::Put {
                    key,
                    value: value.to_vec(),
                    expires_at,
                },
                MemTableEntry::Tombstone => Operation::Delete { key },
            })
            .collect();
        (operations, self.guard)
    }
}

impl Transaction for WriteTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let entry = match self.pending.get(key) {
            Some(entry) => Some(entry.clone()),
            None => self.engine.lookup(key)?,
        };
        Ok(entry.and_then(|entry| entry.live_value(self.now).cloned()))
    }

    fn scan(&self, start: Bound<&[u8]>, limit: usize) -> Result<ScanChunk> {
        let mut runs = self.engine.committed_runs(start, limit)?;
        runs.push(
            self.pending
                .range::<[u8], _>((start, Bound::Unbounded))
                .take(limit)
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
        );
        Ok(merge_runs(runs, limit, self.now))
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Ascending cursor over a transaction's visible entries
///
/// `seek` positions the cursor at the first key >= the target. Entries are
/// fetched in steps that start small and double, so reading only the first
/// key touches only the front of each source.
pub struct TxnIterator<'t, T: Transaction + ?Sized> {
    txn: &'t T,
    entries: Vec<(Bytes, Bytes)>,
    pos: usize,
    resume: Option<Vec<u8>>,
    batch: usize,
}

impl<'t, T: Transaction + ?Sized> TxnIterator<'t, T> {
    const FIRST_BATCH: usize = 16;
    const MAX_BATCH: usize = 1024;

    fn new(txn: &'t T) -> Self {
        Self {
            txn,
            entries: Vec::new(),
            pos: 0,
            resume: None,
            batch: Self::FIRST_BATCH,
        }
    }

    /// Position at the first key >= `target`
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.batch = Self::FIRST_BATCH;
        self.fill(Bound::Included(target))
    }

    /// Position at the first key in the store
    pub fn rewind(&mut self) -> Result<()> {
        self.batch = Self::FIRST_BATCH;
        self.fill(Bound::Unbounded)
    }

    /// Load steps until one yields a visible entry or the keyspace ends
    fn fill(&mut self, start: Bound<&[u8]>) -> Result<()> {
        let mut chunk = self.txn.scan(start, self.batch)?;
        while chunk.entries.is_empty() {
            let Some(last) = chunk.resume.take() else { break };
            self.batch = (self.batch * 2).min(Self::MAX_BATCH);
            chunk = self.txn.scan(Bound::Excluded(last.as_slice()), self.batch)?;
        }
        self.entries = chunk.entries;
        self.resume = chunk.resume;
        self.pos = 0;
        Ok(())
    }

    /// Whether the cursor points at an entry
    pub fn valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    /// Whether the cursor points at an entry whose key starts with `prefix`
    pub fn valid_for_prefix(&self, prefix: &[u8]) -> bool {
        self.key().map(|k| k.starts_with(prefix)).unwrap_or(false)
    }

    /// Step to the next entry, reading the next step when this one is used up
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<()> {
        if !self.valid() {
            return Ok(());
        }
        self.pos += 1;
        if self.pos == self.entries.len() {
            if let Some(last) = self.resume.take() {
                self.batch = (self.batch * 2).min(Self::MAX_BATCH);
                self.fill(Bound::Excluded(last.as_slice()))?;
            }
        }
        Ok(())
    }

    pub fn key(&self) -> Option<&Bytes> {
        self.entries.get(self.pos).map(|(k, _)| k)
    }

    pub fn value(&self) -> Option<&Bytes> {
        self.entries.get(self.pos).map(|(_, v)| v)
    }
}
