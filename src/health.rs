//! Simple HTTP health and metrics server (synchronous)
//!
//! Runs on its own thread next to the main event loop, serving `/health`,
//! `/ready` and `/metrics` for load balancers and Prometheus scrapes.

use crate::config::MetricsConfig;
use crate::metrics::Metrics;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

pub struct HealthServer {
    metrics: Arc<Metrics>,
    ready: AtomicBool,
    running: AtomicBool,
}

impl HealthServer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            ready: AtomicBool::new(false),
            running: AtomicBool::new(true),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Serve until stopped (blocking; run in a separate thread).
    pub fn run(self: Arc<Self>, config: &MetricsConfig) -> std::io::Result<()> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;
        info!("health server listening on {}", config.listen_addr);

        while self.running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = self.handle_connection(stream) {
                        error!("health connection error: {e}");
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
                Err(e) => {
                    error!("health server accept error: {e}");
                }
            }
        }

        info!("health server stopped");
        Ok(())
    }

    fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        stream.set_nonblocking(false)?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        // "GET /path HTTP/1.1"
        let mut parts = request_line.split_whitespace();
        let (method, path) = match (parts.next(), parts.next()) {
            (Some(method), Some(path)) => (method, path),
            _ => return send_response(&mut stream, 400, "text/plain", "Bad Request"),
        };

        if method != "GET" {
            return send_response(&mut stream, 405, "text/plain", "Method Not Allowed");
        }

        match path {
            "/health" | "/healthz" => {
                send_response(&mut stream, 200, "application/json", r#"{"status":"healthy"}"#)
            }
            "/ready" | "/readyz" => {
                if self.is_ready() {
                    send_response(&mut stream, 200, "application/json", r#"{"status":"ready"}"#)
                } else {
                    send_response(
                        &mut stream,
                        503,
                        "application/json",
                        r#"{"status":"not ready"}"#,
                    )
                }
            }
            "/metrics" => {
                let body = self.metrics.gather();
                send_response(&mut stream, 200, "text/plain; version=0.0.4", &body)
            }
            _ => send_response(&mut stream, 404, "text/plain", "Not Found"),
        }
    }
}

fn send_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &str,
) -> std::io::Result<()> {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        503 => "Service Unavailable",
        _ => "Unknown",
    };

    let response = format!(
        "HTTP/1.1 {status} {status_text}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );

    stream.write_all(response.as_bytes())?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state() {
        let server = HealthServer::new(Arc::new(Metrics::new()));

        assert!(!server.is_ready());
        server.set_ready(true);
        assert!(server.is_ready());
        server.set_ready(false);
        assert!(!server.is_ready());
    }
}
