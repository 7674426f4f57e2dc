//! # StashKV
//!
//! An embedded key-value stash for workload scenarios:
//! - Named stores, opened once per name and shared by every worker
//! - Every operation is one atomic transaction
//! - TTL expiry, ordered prefix scans, race-free pop and pop-first
//! - Durable (WAL + SSTables) or in-memory storage
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Registry                             │
//! │              (name → Client, one per name)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Client                              │
//! │   set · set_with_ttl · get · pop · pop_first · delete ·     │
//! │                 view_prefix · show                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  one transaction per call
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Engine (StorageHandle)                     │
//! │            (Single Writer / Multi Reader)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use stashkv::{ClientOptions, Registry};
//!
//! let registry = Registry::new();
//! let orders = registry.get_or_create(&ClientOptions::memory("orders")).unwrap();
//!
//! orders.set("a1", "100").unwrap();
//! orders.set_with_ttl("a2", "200", 0).unwrap();
//!
//! assert_eq!(orders.get("a1").unwrap(), "100");
//! assert!(orders.get("a2").unwrap_err().is_not_found());
//! assert_eq!(orders.view_prefix("a").unwrap().len(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod expiry;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod transaction;

pub mod handle;
pub mod client;
pub mod registry;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StashError, Result};
pub use config::{ClientOptions, Config, StorageTarget, WalSyncStrategy, DEFAULT_STORE_NAME};
pub use engine::Engine;
pub use transaction::{ReadTxn, ScanChunk, Transaction, TxnIterator, WriteTxn};
pub use handle::StorageHandle;
pub use client::Client;
pub use registry::Registry;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StashKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
