//! Configuration for StashKV
//!
//! Engine configuration plus the options a caller passes when asking the
//! registry for a named store.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::Level;

/// Name used when a caller does not supply one
pub const DEFAULT_STORE_NAME: &str = "default";

/// Where an engine keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    /// Durable store rooted at a directory
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    Path(PathBuf),

    /// Ephemeral store; nothing touches the filesystem
    InMemory,
}

impl StorageTarget {
    pub fn is_in_memory(&self) -> bool {
        matches!(self, StorageTarget::InMemory)
    }

    /// Data directory, if durable
    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageTarget::Path(p) => Some(p),
            StorageTarget::InMemory => None,
        }
    }
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTarget::Path(p) => write!(f, "{}", p.display()),
            StorageTarget::InMemory => f.write_str("<memory>"),
        }
    }
}

/// Main configuration for an engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory or in-memory mode
    pub target: StorageTarget,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes). Ignored in memory mode.
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Logging
    // -------------------------------------------------------------------------
    /// Most verbose level the engine emits. Stores opened through the
    /// registry use `Level::ERROR`.
    pub log_level: Level,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: StorageTarget::Path(PathBuf::from("./stashkv_data")),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Default config for an in-memory engine
    pub fn in_memory() -> Self {
        Self {
            target: StorageTarget::InMemory,
            ..Self::default()
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.target = StorageTarget::Path(path.into());
        self
    }

    /// Keep everything in memory
    pub fn in_memory(mut self) -> Self {
        self.config.target = StorageTarget::InMemory;
        self
    }

    pub fn target(mut self, target: StorageTarget) -> Self {
        self.config.target = target;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the most verbose level the engine logs at
    pub fn log_level(mut self, level: Level) -> Self {
        self.config.log_level = level;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Client Options
// =============================================================================

/// What a caller asks the registry for.
///
/// `in_memory == true` or an empty `target` selects an ephemeral store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Logical store name; empty means [`DEFAULT_STORE_NAME`]
    pub name: String,

    /// Filesystem location of a durable store
    pub target: String,

    /// Force an in-memory store even if `target` is set
    pub in_memory: bool,
}

impl ClientOptions {
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// Options for a named in-memory store
    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: String::new(),
            in_memory: true,
        }
    }

    /// Options for a named durable store at `target`
    pub fn durable(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            in_memory: false,
        }
    }

    /// Name with the default applied
    pub fn resolved_name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_STORE_NAME
        } else {
            &self.name
        }
    }

    /// Storage target these options select
    pub fn storage_target(&self) -> StorageTarget {
        if self.in_memory || self.target.is_empty() {
            StorageTarget::InMemory
        } else {
            StorageTarget::Path(PathBuf::from(&self.target))
        }
    }
}

/// Builder for ClientOptions
#[derive(Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.options.target = target.into();
        self
    }

    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.options.in_memory = in_memory;
        self
    }

    pub fn build(self) -> ClientOptions {
        self.options
    }
}
