//! Connection handlers: the command layer and a wiring-test echo.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use crate::error::ProtocolError;
use crate::metrics::Metrics;
use crate::protocol::{Command, Field, ParseResult, ResponseWriter, parse};
use crate::storage::{StorageEngine, UserRecord};

/// Callbacks driving one accepted connection. The byte side (reading,
/// framing, writing) lives in the server; handlers only ever see complete
/// lines. Whatever a handler leaves in `out` is sent as the reply.
pub trait ConnectionHandler: Send + Sync {
    fn on_connected(&self, _peer: SocketAddr) {}

    /// One complete line, LF and CR already stripped.
    fn on_data(&self, line: &str, out: &mut ResponseWriter);

    fn on_closed(&self, _peer: SocketAddr) {}
}

/// Echoes each line back. Useful for exercising the loop plumbing without
/// the storage engine.
pub struct EchoHandler;

impl ConnectionHandler for EchoHandler {
    fn on_data(&self, line: &str, out: &mut ResponseWriter) {
        out.line(line);
    }
}

/// The command layer: parses slash commands, calls the engine, formats the
/// reply. Stateless besides its engine and metrics handles.
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    metrics: Arc<Metrics>,
}

impl CommandHandler {
    pub fn new(storage: Arc<StorageEngine>, metrics: Arc<Metrics>) -> Self {
        Self { storage, metrics }
    }

    fn handle_get(&self, key: &str, out: &mut ResponseWriter) {
        self.metrics.cmd_get.inc();
        match self.storage.get(key) {
            Some(value) => {
                self.metrics.get_hits.inc();
                out.data(&value);
            }
            None => {
                self.metrics.get_misses.inc();
                out.fail();
            }
        }
    }

    fn handle_set(&self, field: Field, key: &str, value: &str, out: &mut ResponseWriter) {
        self.metrics.cmd_set.inc();

        // Fetch the current record or materialize one for a fresh key.
        let mut record = match self.storage.get(key) {
            Some(record) => record,
            None => match materialize(key) {
                Ok(record) => record,
                Err(e) => {
                    self.metrics.protocol_errors.inc();
                    out.fail_with(&e.to_string());
                    return;
                }
            },
        };

        match field {
            Field::Name => record.name = value.to_string(),
            Field::Email => record.email = value.to_string(),
            Field::Phone => record.phone = value.to_string(),
            Field::Cash => match value.parse::<i64>() {
                Ok(cash) => record.cash = cash,
                Err(_) => {
                    self.metrics.protocol_errors.inc();
                    out.fail_with(&ProtocolError::InvalidAmount.to_string());
                    return;
                }
            },
        }

        match self.storage.set(key, record) {
            Ok(()) => out.ok(),
            Err(e) => out.fail_with(&e.to_string()),
        }
    }
}

impl ConnectionHandler for CommandHandler {
    fn on_connected(&self, peer: SocketAddr) {
        debug!(%peer, "client connected");
    }

    fn on_data(&self, line: &str, out: &mut ResponseWriter) {
        match parse(line) {
            ParseResult::Complete(Command::Get { key }) => self.handle_get(&key, out),
            ParseResult::Complete(Command::Set { field, key, value }) => {
                self.handle_set(field, &key, &value, out)
            }
            ParseResult::Empty => {}
            ParseResult::Invalid(e) => {
                self.metrics.protocol_errors.inc();
                out.fail_with(&e.to_string());
            }
            ParseResult::Error(e) => {
                self.metrics.protocol_errors.inc();
                out.error(&e.to_string());
            }
            ParseResult::Help => {
                self.metrics.protocol_errors.inc();
                out.help();
            }
        }
    }

    fn on_closed(&self, peer: SocketAddr) {
        debug!(%peer, "client disconnected");
    }
}

/// A record created on first write. An all-numeric key becomes the id of an
/// administrator record; anything else becomes the display name.
fn materialize(key: &str) -> Result<UserRecord, ProtocolError> {
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        let id = key.parse::<i64>().map_err(|_| ProtocolError::InvalidId)?;
        Ok(UserRecord::new(id, "管理员"))
    } else {
        Ok(UserRecord::new(-1, key))
    }
}
