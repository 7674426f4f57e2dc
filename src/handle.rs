//! Storage Handle
//!
//! One opened engine instance plus the target it was opened at.

use std::fmt;

use tracing::Level;

use crate::config::{Config, StorageTarget};
use crate::engine::Engine;
use crate::error::Result;

/// Owns exactly one open engine
pub struct StorageHandle {
    engine: Engine,
}

impl StorageHandle {
    /// Open an engine at `target` with engine logging limited to errors
    pub fn open(target: StorageTarget) -> Result<Self> {
        Self::open_with(
            Config::builder()
                .target(target)
                .log_level(Level::ERROR)
                .build(),
        )
    }

    /// Open an engine with a full configuration
    pub fn open_with(config: Config) -> Result<Self> {
        Ok(Self {
            engine: Engine::open(config)?,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn target(&self) -> &StorageTarget {
        &self.engine.config().target
    }
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle")
            .field("target", self.target())
            .field("memtable_entries", &self.engine.memtable_entry_count())
            .field("sstables", &self.engine.sstable_count())
            .finish()
    }
}
