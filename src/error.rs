//! Error types for StashKV
//!
//! Provides a unified error type for the engine and the client layer.

use thiserror::Error;

/// Result type alias using StashError
pub type Result<T> = std::result::Result<T, StashError>;

/// Unified error type for StashKV operations
#[derive(Debug, Error)]
pub enum StashError {
    // -------------------------------------------------------------------------
    // Client Errors
    // -------------------------------------------------------------------------
    #[error("failed to open store `{name}` at {target}: {source}")]
    StoreOpen {
        name: String,
        target: String,
        #[source]
        source: Box<StashError>,
    },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("no data in store")]
    EmptyStore,

    #[error("transaction failed during {op} on `{key}`: {source}")]
    Transaction {
        op: &'static str,
        key: String,
        #[source]
        source: Box<StashError>,
    },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("data directory {0} is locked by another engine")]
    Locked(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Observability Sink Errors
    // -------------------------------------------------------------------------
    #[error("Sink error: {0}")]
    Sink(String),
}

impl StashError {
    /// Attach the failing operation and key to an engine-level error.
    ///
    /// `KeyNotFound` and `EmptyStore` are outcomes of the operation itself,
    /// not transaction failures, so they pass through unchanged.
    pub(crate) fn in_txn(self, op: &'static str, key: &[u8]) -> Self {
        match self {
            e @ (StashError::KeyNotFound(_) | StashError::EmptyStore) => e,
            e @ StashError::Transaction { .. } => e,
            source => StashError::Transaction {
                op,
                key: display_key(key),
                source: Box::new(source),
            },
        }
    }

    /// True for the "absent key" outcome of get/pop.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StashError::KeyNotFound(_))
    }
}

/// Render a key for error messages and logs.
pub(crate) fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

impl From<bincode::Error> for StashError {
    fn from(e: bincode::Error) -> Self {
        StashError::Serialization(e.to_string())
    }
}
