//! Configuration for LedgerKV

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
}

/// Readiness back end driving the server loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopModel {
    /// `poll(2)` over a flat descriptor array, 1-second wakeups.
    Poll,
    /// Edge-triggered `epoll(7)` readiness queue.
    Epoll,
}

impl FromStr for LoopModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poll" => Ok(LoopModel::Poll),
            "epoll" => Ok(LoopModel::Epoll),
            other => Err(format!("unknown event model '{other}' (expected poll or epoll)")),
        }
    }
}

impl fmt::Display for LoopModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopModel::Poll => f.write_str("poll"),
            LoopModel::Epoll => f.write_str("epoll"),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IPv4 address to bind
    pub host: String,

    /// TCP port to listen on
    pub port: u16,

    /// Event demultiplexing back end
    pub model: LoopModel,

    /// Read buffer size per connection (bytes); also the command length bound
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8899,
            model: LoopModel::Epoll,
            read_buffer_size: 4096,
        }
    }
}

impl ServerConfig {
    /// `host:port` as passed to the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Initial bucket count of the hash index (doubles on load factor 0.75)
    pub hash_capacity: usize,

    /// Recency window size; the oldest record is evicted past this bound
    pub lru_capacity: usize,

    /// When false the engine is a plain hash map with unbounded retention
    pub enable_lru: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            hash_capacity: 1024,
            lru_capacity: 100,
            enable_lru: true,
        }
    }
}

/// Metrics and health check configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the metrics/health HTTP server
    pub enabled: bool,

    /// Address for the metrics/health HTTP server
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:9090".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::LedgerKvError::Config(format!("Failed to read config file: {e}"))
        })?;

        toml::from_str(&contents)
            .map_err(|e| crate::LedgerKvError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("LEDGERKV_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("LEDGERKV_PORT")
            && let Ok(n) = port.parse()
        {
            config.server.port = n;
        }

        if let Ok(model) = std::env::var("LEDGERKV_MODEL")
            && let Ok(m) = model.parse()
        {
            config.server.model = m;
        }

        if let Ok(cap) = std::env::var("LEDGERKV_HASH_CAPACITY")
            && let Ok(n) = cap.parse()
        {
            config.storage.hash_capacity = n;
        }

        if let Ok(cap) = std::env::var("LEDGERKV_LRU_CAPACITY")
            && let Ok(n) = cap.parse()
        {
            config.storage.lru_capacity = n;
        }

        if let Ok(enabled) = std::env::var("LEDGERKV_LRU_ENABLED") {
            config.storage.enable_lru = enabled.to_lowercase() == "true" || enabled == "1";
        }

        if let Ok(addr) = std::env::var("LEDGERKV_METRICS_ADDR") {
            config.metrics.listen_addr = addr;
        }

        if let Ok(enabled) = std::env::var("LEDGERKV_METRICS_ENABLED") {
            config.metrics.enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8899);
        assert_eq!(config.server.model, LoopModel::Epoll);
        assert_eq!(config.server.read_buffer_size, 4096);
        assert_eq!(config.storage.hash_capacity, 1024);
        assert_eq!(config.storage.lru_capacity, 100);
        assert!(config.storage.enable_lru);
    }

    #[test]
    fn test_listen_addr() {
        let mut server = ServerConfig::default();
        server.host = "127.0.0.1".to_string();
        server.port = 9000;
        assert_eq!(server.listen_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_loop_model_from_str() {
        assert_eq!("poll".parse::<LoopModel>().unwrap(), LoopModel::Poll);
        assert_eq!("epoll".parse::<LoopModel>().unwrap(), LoopModel::Epoll);
        assert!("kqueue".parse::<LoopModel>().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9001
            model = "poll"

            [storage]
            hash_capacity = 16
            lru_capacity = 4
            enable_lru = false
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.model, LoopModel::Poll);
        assert_eq!(config.storage.hash_capacity, 16);
        assert!(!config.storage.enable_lru);
        // Unspecified sections fall back to defaults
        assert!(config.metrics.enabled);
    }
}
