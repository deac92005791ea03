//! # kv-engine
//!
//! The storage engine: a capacity-bounded, TTL-aware, namespaced
//! in-memory cache backed by a write-ahead log for crash recovery. See
//! [`store::Store`] for the single entry point every operation goes
//! through.

pub mod compactor;
pub mod config;
pub mod entry;
pub mod lru;
pub mod namespace;
pub mod reaper;
pub mod recovery;
pub mod stats;
pub mod store;
pub mod wal;

pub use config::StoreConfig;
pub use store::{NamespaceView, Store, StatsSnapshot, StoreHandle};
pub use wal::WalRecord;

pub use kv_common::{StoreError, StoreResult};
