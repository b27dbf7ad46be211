//! Storage layer for LedgerKV
//!
//! One arena of records, reachable from two structures: an open-chaining
//! hash index and an LRU recency list. The engine composes both under a
//! single mutex and is the only component that releases records.

mod engine;
mod hash_index;
mod lru;
mod record;

pub use engine::{StorageEngine, StorageStats};
pub use hash_index::HashIndex;
pub use lru::LruList;
pub use record::{Record, RecordArena, RecordKey, UserRecord};

use std::sync::atomic::AtomicU64;

/// Records dropped by LRU eviction since process start.
pub static RECORDS_EVICTED: AtomicU64 = AtomicU64::new(0);

/// Hash index growth events since process start.
pub static INDEX_REHASHES: AtomicU64 = AtomicU64::new(0);
