use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Maximum connections
    pub max_connections: usize,

    /// Maximum connections per IP
    pub max_connections_per_ip: usize,

    /// Outbound chunk size announced after connect
    pub chunk_size: u32,

    /// Window acknowledgement size
    pub window_ack_size: u32,

    /// Peer bandwidth
    pub peer_bandwidth: u32,

    /// Keepalive ping interval
    pub ping_interval: Duration,

    /// Timeout for idle connections
    pub idle_timeout: Duration,

    /// Per-subscriber outbound queue depth
    pub subscriber_queue_len: usize,

    /// Read access path: `/` for all, or an application restriction
    pub read_access: String,

    /// Write access path: `/` for all, or an application restriction
    pub write_access: String,

    /// Enable segment recording for record/append publishes
    pub record_enabled: bool,

    /// Directory segment files are written into
    pub record_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 1935,
            max_connections: 1000,
            max_connections_per_ip: 10,
            chunk_size: 4096,
            window_ack_size: 2_500_000,
            peer_bandwidth: 2_500_000,
            ping_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(300),
            subscriber_queue_len: 512,
            read_access: "/".to_string(),
            write_access: "/".to_string(),
            record_enabled: false,
            record_dir: PathBuf::from("segments"),
        }
    }
}

/// Path-based access check: `/` grants everything, otherwise the path must
/// equal the app name verbatim or `/` + app
fn access_granted(path: &str, app: &str) -> bool {
    path == "/" || path == app || path == format!("/{}", app)
}

impl ServerConfig {
    /// Create config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Check read (play) access for an application
    pub fn can_read(&self, app: &str) -> bool {
        access_granted(&self.read_access, app)
    }

    /// Check write (publish) access for an application
    pub fn can_write(&self, app: &str) -> bool {
        access_granted(&self.write_access, app)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("Invalid port: 0"));
        }

        if self.max_connections == 0 {
            return Err(Error::config("Invalid max_connections: 0"));
        }

        if self.chunk_size < 128 {
            return Err(Error::config("Chunk size must be at least 128"));
        }

        if self.chunk_size > 65536 {
            return Err(Error::config("Chunk size must not exceed 65536"));
        }

        if self.window_ack_size == 0 {
            return Err(Error::config("Window ack size must be non-zero"));
        }

        if self.subscriber_queue_len == 0 {
            return Err(Error::config("Subscriber queue must hold at least one frame"));
        }

        Ok(())
    }
}

/// Builder for ServerConfig
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        ServerConfigBuilder {
            config: ServerConfig::default(),
        }
    }

    /// Set host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set max connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set read access path
    pub fn read_access(mut self, path: impl Into<String>) -> Self {
        self.config.read_access = path.into();
        self
    }

    /// Set write access path
    pub fn write_access(mut self, path: impl Into<String>) -> Self {
        self.config.write_access = path.into();
        self
    }

    /// Enable recording into a directory
    pub fn recording(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.record_enabled = true;
        self.config.record_dir = dir.into();
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set subscriber queue depth
    pub fn subscriber_queue_len(mut self, len: usize) -> Self {
        self.config.subscriber_queue_len = len;
        self
    }

    /// Build configuration
    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        ServerConfigBuilder::new()
    }
}
