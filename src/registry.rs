//! Registry
//!
//! Maps logical store names to clients, opening at most one engine per
//! name for the registry's lifetime.
//!
//! ## Semantics
//! - The first request for a name opens the store; later requests get the
//!   same client back and their target/in-memory settings are ignored.
//! - Creation runs inside one critical section, so concurrent first-time
//!   requests for a name open exactly one engine.
//! - A failed open inserts nothing; the next request tries again.
//! - A durable directory can back only one name at a time.
//! - Entries are never removed.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, Level};

use crate::client::Client;
use crate::config::{ClientOptions, Config, StorageTarget};
use crate::error::{Result, StashError};
use crate::handle::StorageHandle;

/// Service object owning the name → client map
///
/// Construct one per process (or per test) and share it by reference or
/// `Arc` with every worker.
pub struct Registry {
    /// Engine settings for newly opened stores; `target` is replaced per store
    template: Config,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    clients: HashMap<String, Client>,
    /// Canonical durable directory → owning store name
    targets: HashMap<PathBuf, String>,
}

impl Registry {
    /// Empty registry; engines log errors only
    pub fn new() -> Self {
        Self::with_template(Config::builder().log_level(Level::ERROR).build())
    }

    /// Empty registry whose stores are opened with `template`'s engine
    /// settings (sync strategy, memtable limit, log level)
    pub fn with_template(template: Config) -> Self {
        Self {
            template,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Client for `options.name`, opening its store on first request
    ///
    /// The registry lock is held while a new store opens, and a durable
    /// open replays the WAL and checks every SSTable. Until that finishes,
    /// every other registry call (`get`, `len`, requests for other names)
    /// waits.
    ///
    /// A directory already opened by another engine, through another
    /// registry or another process, fails with `StoreOpen` wrapping
    /// [`StashError::Locked`].
    pub fn get_or_create(&self, options: &ClientOptions) -> Result<Client> {
        let name = options.resolved_name();
        let mut inner = self.inner.lock();

        if let Some(client) = inner.clients.get(name) {
            debug!(store = name, requested = %options.storage_target(), "store already open");
            return Ok(client.clone());
        }

        let requested = options.storage_target();
        let open_err = |source: StashError| StashError::StoreOpen {
            name: name.to_string(),
            target: requested.to_string(),
            source: Box::new(source),
        };

        let target = match &requested {
            StorageTarget::InMemory => StorageTarget::InMemory,
            StorageTarget::Path(dir) => {
                let canonical = fs::create_dir_all(dir)
                    .and_then(|_| fs::canonicalize(dir))
                    .map_err(|e| open_err(e.into()))?;

                if let Some(owner) = inner.targets.get(&canonical) {
                    return Err(open_err(StashError::Config(format!(
                        "directory already in use by store `{}`",
                        owner
                    ))));
                }
                StorageTarget::Path(canonical)
            }
        };

        let config = Config {
            target: target.clone(),
            ..self.template.clone()
        };
        let handle = StorageHandle::open_with(config).map_err(open_err)?;
        let client = Client::new(name, Arc::new(handle));

        if let StorageTarget::Path(dir) = target {
            inner.targets.insert(dir, name.to_string());
        }
        inner.clients.insert(name.to_string(), client.clone());

        info!(store = name, location = %requested, "store opened");
        Ok(client)
    }

    /// Client for `name` if its store is already open
    pub fn get(&self, name: &str) -> Option<Client> {
        let name = if name.is_empty() {
            crate::config::DEFAULT_STORE_NAME
        } else {
            name
        };
        self.inner.lock().clients.get(name).cloned()
    }

    /// Names of all open stores, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().clients.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().clients.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
