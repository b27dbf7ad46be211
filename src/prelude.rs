//! Prelude module for common imports.
//!
//! This module re-exports commonly used types and traits for convenience.
//!
//! # Usage
//!
//! ```ignore
//! use ledgerkv::prelude::*;
//! ```

// Error types
pub use crate::error::{LedgerKvError, ProtocolError, Result, StorageError};

// Configuration
pub use crate::config::{Config, LoopModel, MetricsConfig, ServerConfig, StorageConfig};

// Storage
pub use crate::storage::{StorageEngine, StorageStats, UserRecord};

// Protocol
pub use crate::protocol::{Command, Field, ParseResult, ResponseWriter};

// Metrics
pub use crate::metrics::Metrics;

// Server
pub use crate::server::{CommandHandler, ConnectionHandler, EchoHandler, Server, ShutdownHandle};

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
