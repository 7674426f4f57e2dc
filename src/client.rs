//! Client
//!
//! The operation surface of one store. Every method is exactly one
//! transaction: it opens, runs, and commits (or aborts) before returning,
//! and nothing is held across calls.
//!
//! ## Failure modes
//! - `get` / `pop` on an absent or expired key → [`StashError::KeyNotFound`]
//! - `pop_first` on an empty store → [`StashError::EmptyStore`]
//! - engine failures → [`StashError::Transaction`] naming op and key
//! - `delete` of a missing key is a successful no-op

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace};

use crate::config::StorageTarget;
use crate::error::{display_key, Result, StashError};
use crate::handle::StorageHandle;
use crate::transaction::Transaction;

/// Handle to a named store; cheap to clone and safe to share across threads
#[derive(Clone)]
pub struct Client {
    name: Arc<str>,
    handle: Arc<StorageHandle>,
}

impl Client {
    pub fn new(name: impl Into<Arc<str>>, handle: Arc<StorageHandle>) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }

    /// Standalone client over a fresh in-memory store
    pub fn open_in_memory(name: &str) -> Result<Self> {
        let handle = StorageHandle::open(StorageTarget::InMemory)?;
        Ok(Self::new(name, Arc::new(handle)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &StorageHandle {
        &self.handle
    }

    /// Whether both clients are backed by the same engine instance
    pub fn same_store(&self, other: &Client) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Upsert `key` without expiry
    pub fn set(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        let (key, value) = (key.as_ref(), value.as_ref());
        trace!(store = %self.name, key = %display_key(key), "set");

        self.handle
            .engine()
            .update(|txn| {
                txn.set(key, value);
                Ok(())
            })
            .map_err(|e| e.in_txn("set", key))
    }

    /// Upsert `key`, expiring `ttl_secs` seconds from now
    ///
    /// A TTL of zero is already expired when the write commits.
    pub fn set_with_ttl(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        ttl_secs: u64,
    ) -> Result<()> {
        let (key, value) = (key.as_ref(), value.as_ref());
        trace!(store = %self.name, key = %display_key(key), ttl_secs, "set_with_ttl");

        self.handle
            .engine()
            .update(|txn| {
                txn.set_with_ttl(key, value, Duration::from_secs(ttl_secs));
                Ok(())
            })
            .map_err(|e| e.in_txn("set_with_ttl", key))
    }

    /// Remove `key` if present; a missing key still commits successfully
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        let key = key.as_ref();

        let existed = self
            .handle
            .engine()
            .update(|txn| {
                let existed = txn.get(key)?.is_some();
                if existed {
                    txn.delete(key);
                }
                Ok(existed)
            })
            .map_err(|e| e.in_txn("delete", key))?;

        trace!(store = %self.name, key = %display_key(key), existed, "delete");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value stored at `key`
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Bytes> {
        let key = key.as_ref();

        self.handle
            .engine()
            .view(|txn| txn.get(key))
            .map_err(|e| e.in_txn("get", key))?
            .ok_or_else(|| StashError::KeyNotFound(display_key(key)))
    }

    /// Every entry whose key starts with `prefix`, in ascending key order.
    /// An empty prefix returns the whole store.
    pub fn view_prefix(&self, prefix: impl AsRef<[u8]>) -> Result<BTreeMap<Bytes, Bytes>> {
        let prefix = prefix.as_ref();

        self.handle
            .engine()
            .view(|txn| {
                let mut found = BTreeMap::new();
                let mut it = txn.iter();
                it.seek(prefix)?;
                while it.valid_for_prefix(prefix) {
                    if let (Some(k), Some(v)) = (it.key(), it.value()) {
                        found.insert(k.clone(), v.clone());
                    }
                    it.next()?;
                }
                Ok(found)
            })
            .map_err(|e| e.in_txn("view_prefix", prefix))
    }

    /// Log every entry at INFO on the `stashkv::show` target
    pub fn show(&self) -> Result<()> {
        let name = Arc::clone(&self.name);
        self.show_with(|key, value| {
            info!(
                target: "stashkv::show",
                store = %name,
                key = %display_key(key),
                value = %display_key(value),
                "entry"
            );
            Ok(())
        })
    }

    /// Hand every entry, in ascending key order, to `sink`
    ///
    /// The first sink error stops the walk and is returned.
    ///
    /// The walk runs inside a read transaction. The sink may read from this
    /// store (`get`, `view_prefix`), but a write from inside the sink waits
    /// for the walk to end and so never returns.
    pub fn show_with<F>(&self, mut sink: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        self.handle
            .engine()
            .view(|txn| {
                let mut it = txn.iter();
                it.rewind()?;
                loop {
                    match (it.key(), it.value()) {
                        (Some(k), Some(v)) => sink(&k[..], &v[..])?,
                        _ => break,
                    }
                    it.next()?;
                }
                Ok(())
            })
            .map_err(|e| e.in_txn("show", b""))
    }

    // =========================================================================
    // Read-and-delete
    // =========================================================================

    /// Remove `key` and return the value it held
    pub fn pop(&self, key: impl AsRef<[u8]>) -> Result<Bytes> {
        let key = key.as_ref();

        let value = self
            .handle
            .engine()
            .update(|txn| match txn.get(key)? {
                Some(value) => {
                    txn.delete(key);
                    Ok(value)
                }
                None => Err(StashError::KeyNotFound(display_key(key))),
            })
            .map_err(|e| e.in_txn("pop", key))?;

        debug!(store = %self.name, key = %display_key(key), "pop");
        Ok(value)
    }

    /// Remove the lexicographically smallest key and return it
    ///
    /// Expired entries are invisible to the iterator, so they are never
    /// chosen. Only the front of the keyspace is read.
    pub fn pop_first(&self) -> Result<Bytes> {
        let key = self
            .handle
            .engine()
            .update(|txn| {
                let first = {
                    let mut it = txn.iter();
                    it.rewind()?;
                    it.key().cloned()
                };
                match first {
                    Some(key) => {
                        txn.delete(&key);
                        Ok(key)
                    }
                    None => Err(StashError::EmptyStore),
                }
            })
            .map_err(|e| e.in_txn("pop_first", b""))?;

        debug!(store = %self.name, key = %display_key(&key), "pop_first");
        Ok(key)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("target", self.handle.target())
            .finish()
    }
}
