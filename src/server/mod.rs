//! Readiness-driven TCP front end
//!
//! One listening socket and a map of live connections, driven by a
//! single-threaded event loop. The back end (poll or epoll) is chosen at
//! construction; after setup the server only sees [`Ready`] bits. The
//! storage engine is mutex-guarded, so this loop stays single-threaded
//! while the engine remains callable from anywhere.

mod connection;
mod event_loop;
mod handler;

pub use connection::{Connection, ReadOutcome};
pub use event_loop::{EpollLoop, Event, EventLoop, MAX_EVENTS, PollLoop, Ready, new_event_loop};
pub use handler::{CommandHandler, ConnectionHandler, EchoHandler};

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{LedgerKvError, ProtocolError, Result};
use crate::metrics::Metrics;
use crate::protocol::ResponseWriter;

/// Cloneable stop switch for a running server; the loop observes it within
/// one wait timeout.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    event_loop: Box<dyn EventLoop>,
    conns: HashMap<RawFd, Connection>,
    handler: Arc<dyn ConnectionHandler>,
    metrics: Arc<Metrics>,
    stop_flag: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listener and set up the selected back end. Address and bind
    /// problems surface as configuration errors so the process exits 1.
    pub fn bind(
        config: ServerConfig,
        handler: Arc<dyn ConnectionHandler>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let addr: SocketAddr = config.listen_addr().parse().map_err(|e| {
            LedgerKvError::Config(format!("invalid listen address {}: {e}", config.listen_addr()))
        })?;

        // std sets SO_REUSEADDR and a listen backlog of 128 on Unix.
        let listener = TcpListener::bind(addr)
            .map_err(|e| LedgerKvError::Config(format!("failed to bind {addr}: {e}")))?;
        listener.set_nonblocking(true)?;

        let mut event_loop = event_loop::new_event_loop(config.model)?;
        event_loop.add(listener.as_raw_fd(), Ready::READ)?;

        info!(%addr, model = %config.model, "server listening");

        Ok(Self {
            config,
            listener,
            event_loop,
            conns: HashMap::new(),
            handler,
            metrics,
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Actual bound address (the configured port may be 0 in tests).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.stop_flag))
    }

    /// Drive the loop until stopped. In-flight events finish before the
    /// teardown runs.
    pub fn run(&mut self) -> Result<()> {
        let mut events: Vec<Event> = Vec::with_capacity(MAX_EVENTS);
        let mut lines: Vec<String> = Vec::new();

        while !self.stop_flag.load(Ordering::Relaxed) {
            events.clear();
            self.event_loop.wait(&mut events)?;
            for &event in &events {
                self.dispatch(event, &mut lines);
            }
        }

        for (fd, conn) in self.conns.drain() {
            let _ = self.event_loop.remove(fd);
            self.metrics.active_connections.dec();
            self.handler.on_closed(conn.peer());
        }
        info!("server stopped");
        Ok(())
    }

    fn dispatch(&mut self, event: Event, lines: &mut Vec<String>) {
        if event.fd == self.listener.as_raw_fd() {
            if event.ready.contains(Ready::ERROR) {
                error!("listener error, stopping");
                self.stop_flag.store(true, Ordering::Relaxed);
                return;
            }
            self.accept_ready();
        } else {
            self.connection_ready(event, lines);
        }
    }

    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.register(stream, peer) {
                        warn!(%peer, "failed to register connection: {e}");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("accept error: {e}");
                    break;
                }
            }
        }
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        stream.set_nonblocking(true)?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {e}");
        }

        let fd = stream.as_raw_fd();
        self.event_loop.add(fd, Ready::READ)?;
        self.conns.insert(
            fd,
            Connection::new(stream, peer, self.config.read_buffer_size),
        );

        self.metrics.total_connections.inc();
        self.metrics.active_connections.inc();
        self.handler.on_connected(peer);
        debug!(%peer, fd, "accepted connection");
        Ok(())
    }

    fn connection_ready(&mut self, event: Event, lines: &mut Vec<String>) {
        let mut close = event.ready.contains(Ready::ERROR);

        if !close && event.ready.contains(Ready::READ) {
            close = !self.drain_connection(event.fd, lines);
        }

        if close {
            self.close_connection(event.fd);
        }
    }

    /// Read everything the descriptor has, reply line by line. Returns false
    /// once the connection should be torn down.
    fn drain_connection(&mut self, fd: RawFd, lines: &mut Vec<String>) -> bool {
        lines.clear();
        let outcome = match self.conns.get_mut(&fd) {
            Some(conn) => match conn.read_ready(lines) {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!(fd, "read error: {e}");
                    return false;
                }
            },
            None => return true,
        };
        self.metrics.bytes_read.inc_by(outcome.bytes as u64);

        let handler = Arc::clone(&self.handler);
        let mut response = ResponseWriter::default();

        for line in lines.iter() {
            handler.on_data(line, &mut response);
            if response.is_empty() {
                continue;
            }
            if !self.reply(fd, &mut response) {
                return false;
            }
        }

        for _ in 0..outcome.oversized {
            self.metrics.protocol_errors.inc();
            response.error(&ProtocolError::CommandTooLong.to_string());
            if !self.reply(fd, &mut response) {
                return false;
            }
        }

        outcome.open
    }

    /// Flush the response buffer to the connection; false on write failure.
    fn reply(&mut self, fd: RawFd, response: &mut ResponseWriter) -> bool {
        let buf = response.take();
        self.metrics.bytes_written.inc_by(buf.len() as u64);
        match self.conns.get_mut(&fd) {
            Some(conn) => match conn.send(&buf) {
                Ok(()) => true,
                Err(e) => {
                    debug!(fd, "write error: {e}");
                    false
                }
            },
            None => false,
        }
    }

    fn close_connection(&mut self, fd: RawFd) {
        if let Some(conn) = self.conns.remove(&fd) {
            let _ = self.event_loop.remove(fd);
            self.metrics.active_connections.dec();
            self.handler.on_closed(conn.peer());
            debug!(peer = %conn.peer(), fd, "connection closed");
        }
        // The socket closes when `conn` drops.
    }
}
