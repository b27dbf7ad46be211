//! Error types for LedgerKV

use thiserror::Error;

/// Main error type for LedgerKV
#[derive(Error, Debug)]
pub enum LedgerKvError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Command parsing and validation errors.
///
/// The display strings double as the client-facing reply text, so they keep
/// the service's native wording.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer than two slash-separated tokens; nothing to dispatch on.
    #[error("无效的命令格式")]
    MalformedCommand,

    /// `set` with a field outside {name, email, phone, cash}.
    #[error("无效的字段")]
    InvalidField,

    /// All-numeric key that does not fit a signed 64-bit id.
    #[error("无效的ID")]
    InvalidId,

    /// `set/cash/...` with a value that is not a signed 64-bit integer.
    #[error("无效的金额")]
    InvalidAmount,

    /// Line exceeded the 4 KiB command bound.
    #[error("命令过长")]
    CommandTooLong,
}

/// Storage engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("empty key")]
    EmptyKey,

    #[error("hash capacity must be at least 1")]
    InvalidHashCapacity,

    #[error("lru capacity must be at least 1")]
    InvalidLruCapacity,
}

pub type Result<T> = std::result::Result<T, LedgerKvError>;
