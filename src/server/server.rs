use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::connection::{Connection, ConnectionContext};
use crate::handlers::CommandHandlerRegistry;
use crate::muxer::SlicerFactory;
use crate::server::config::ServerConfig;
use crate::server::context::ServerContext;
use crate::{Error, Result};

/// Outbound packet channel depth per connection; a full channel applies
/// backpressure to playback tasks, not to the broker
const OUTBOUND_CHANNEL_DEPTH: usize = 256;

pub struct RtmpServer {
    /// Server configuration
    config: Arc<ServerConfig>,

    /// Shared server context
    context: Arc<ServerContext>,

    /// Command handlers, shared across connections
    handlers: Arc<CommandHandlerRegistry>,

    /// Active connection tasks by connection id
    connections: Arc<RwLock<HashMap<Uuid, tokio::task::JoinHandle<()>>>>,

    /// Shutdown flag
    shutdown: Arc<RwLock<bool>>,
}

impl RtmpServer {
    /// Create new server
    pub fn new(config: ServerConfig) -> Self {
        Self::with_slicer_factory(config, None)
    }

    /// Create a server that records streams through the given slicer
    pub fn with_slicer_factory(
        config: ServerConfig,
        slicer_factory: Option<Arc<dyn SlicerFactory>>,
    ) -> Self {
        let config = Arc::new(config);
        let context = Arc::new(ServerContext::new(config.clone(), slicer_factory));

        RtmpServer {
            config,
            context,
            handlers: Arc::new(CommandHandlerRegistry::new()),
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get server context
    pub fn context(&self) -> Arc<ServerContext> {
        self.context.clone()
    }

    /// Listen and accept connections until shutdown
    pub async fn listen(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::config(format!("Failed to bind {}: {}", addr, e)))?;

        info!("RTMP server listening on {}", addr);

        loop {
            if *self.shutdown.read().await {
                break;
            }

            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept error: {}", e);
                    continue;
                }
            };

            debug!("New connection from {}", peer_addr);

            if self.connections.read().await.len() >= self.config.max_connections {
                warn!("Connection limit reached, rejecting {}", peer_addr);
                drop(stream);
                continue;
            }

            let ip = peer_addr.ip();
            if !self.context.can_accept_from_ip(ip).await {
                warn!("Per-IP limit reached for {}, rejecting", ip);
                drop(stream);
                continue;
            }

            self.spawn_connection(stream, peer_addr.to_string(), ip).await;
        }

        info!("Server stopped");
        Ok(())
    }

    /// Spawn the task driving one accepted socket
    async fn spawn_connection(&self, stream: TcpStream, peer_addr: String, ip: std::net::IpAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_DEPTH);
        let context = Arc::new(ConnectionContext::new(
            peer_addr.clone(),
            self.config.clone(),
            self.context.broker().clone(),
            self.context.slicer_factory(),
            outbound_tx,
        ));
        let connection_id = context.id();
        let connection = Connection::new(context);

        self.context.increment_ip_count(ip).await;

        let handlers = self.handlers.clone();
        let connections = self.connections.clone();
        let server_context = self.context.clone();

        let task = tokio::spawn(async move {
            match connection.process(stream, handlers, outbound_rx).await {
                Ok(()) => info!("Connection {} closed", peer_addr),
                Err(e) => {
                    if e.is_fatal() {
                        warn!("Connection {} failed: {}", peer_addr, e);
                    } else {
                        info!("Connection {} ended: {}", peer_addr, e);
                    }
                }
            }

            connections.write().await.remove(&connection_id);
            server_context.decrement_ip_count(ip).await;
        });

        self.connections.write().await.insert(connection_id, task);
    }

    /// Shutdown: stop accepting and abort active connection tasks
    pub async fn shutdown(&self) {
        info!("Shutting down server");
        *self.shutdown.write().await = true;

        let mut connections = self.connections.write().await;
        for (id, task) in connections.drain() {
            debug!("Aborting connection {}", id);
            task.abort();
        }
    }

    /// Get active connections count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl std::fmt::Debug for RtmpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtmpServer")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish()
    }
}
