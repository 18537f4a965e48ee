use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::broker::StreamBroker;
use crate::muxer::SlicerFactory;
use crate::server::config::ServerConfig;

/// State shared by every connection of one server instance
pub struct ServerContext {
    /// Server configuration
    config: Arc<ServerConfig>,

    /// Stream broker
    broker: Arc<StreamBroker>,

    /// Slicer factory for recording, when configured
    slicer_factory: Option<Arc<dyn SlicerFactory>>,

    /// IP connection counts
    ip_counts: RwLock<HashMap<IpAddr, usize>>,
}

impl ServerContext {
    /// Create new context
    pub fn new(config: Arc<ServerConfig>, slicer_factory: Option<Arc<dyn SlicerFactory>>) -> Self {
        ServerContext {
            config,
            broker: Arc::new(StreamBroker::new()),
            slicer_factory,
            ip_counts: RwLock::new(HashMap::new()),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    /// Get the stream broker
    pub fn broker(&self) -> &Arc<StreamBroker> {
        &self.broker
    }

    /// Get the slicer factory
    pub fn slicer_factory(&self) -> Option<Arc<dyn SlicerFactory>> {
        self.slicer_factory.clone()
    }

    /// Check if a connection from this IP fits the per-IP limit
    pub async fn can_accept_from_ip(&self, ip: IpAddr) -> bool {
        let counts = self.ip_counts.read().await;
        counts.get(&ip).copied().unwrap_or(0) < self.config.max_connections_per_ip
    }

    /// Increment IP connection count
    pub async fn increment_ip_count(&self, ip: IpAddr) {
        let mut counts = self.ip_counts.write().await;
        *counts.entry(ip).or_insert(0) += 1;
    }

    /// Decrement IP connection count
    pub async fn decrement_ip_count(&self, ip: IpAddr) {
        let mut counts = self.ip_counts.write().await;
        if let Some(count) = counts.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&ip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ip_limits() {
        let config = Arc::new(ServerConfig {
            max_connections_per_ip: 2,
            ..ServerConfig::default()
        });
        let context = ServerContext::new(config, None);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(context.can_accept_from_ip(ip).await);
        context.increment_ip_count(ip).await;
        context.increment_ip_count(ip).await;
        assert!(!context.can_accept_from_ip(ip).await);

        context.decrement_ip_count(ip).await;
        assert!(context.can_accept_from_ip(ip).await);

        // Balanced decrements clear the entry entirely
        context.decrement_ip_count(ip).await;
        assert!(context.ip_counts.read().await.is_empty());
    }
}
