//! # LedgerKV
//!
//! In-memory key/value service for user account records, served over a
//! line-oriented TCP protocol.
//!
//! ## Features
//!
//! - Slash-separated text protocol (`get/<key>`, `set/<field>/<key>/<value>`)
//! - Intrusive storage core: one record population reachable from an
//!   open-chaining hash index and an LRU recency list at the same time
//! - Generational record arena — the two containers hold handles, never
//!   owning pointers, so a record can only be released once
//! - Readiness-driven single-threaded front end with selectable poll/epoll
//!   back ends
//! - Prometheus metrics endpoint and health checks
//!
//! ## Example
//!
//! ```ignore
//! use ledgerkv::config::Config;
//! use ledgerkv::storage::{StorageEngine, UserRecord};
//!
//! let config = Config::default();
//! let engine = StorageEngine::new(&config.storage)?;
//! engine.set("1001", UserRecord::new(1001, "管理员"))?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐  bytes  ┌──────────────────────────┐
//! │ client │────────▶│ Server (poll/epoll loop) │
//! └────────┘         │  ├─ Connection framing   │
//!                    │  └─ CommandHandler       │
//!                    └────────────┬─────────────┘
//!                                 │ get/set/del
//!                    ┌────────────▼─────────────┐
//!                    │ StorageEngine (1 mutex)  │
//!                    │  ├─ HashIndex ─┐         │
//!                    │  ├─ LruList  ──┼─▶ arena │
//!                    │  └─ RecordArena┘         │
//!                    └──────────────────────────┘
//! ```
//!
//! The hash index and the LRU list always hold the same record set; a read
//! that finds a record outside the recency window re-admits it under the
//! engine mutex.

// Modules
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod prelude;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-exports for convenience
pub use error::{LedgerKvError, ProtocolError, Result, StorageError};

/// Version of LedgerKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
