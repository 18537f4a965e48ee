// Simple RTMP server
//
// Accepts publishers and players on the default port:
//   publish: rtmp://localhost/live/<name>
//   play:    rtmp://localhost/live/<name>
//
// Usage:
//   cargo run --example simple_server

use std::sync::Arc;

use log::info;
use rtmpd::{Result, RtmpServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = ServerConfig::builder()
        .host("0.0.0.0")
        .port(1935)
        .max_connections(100)
        .chunk_size(4096)
        .build()?;

    info!("Starting RTMP server on {}:{}", config.host, config.port);
    info!("  max connections: {}", config.max_connections);
    info!("  chunk size: {}", config.chunk_size);
    info!("  read access: {}", config.read_access);
    info!("  write access: {}", config.write_access);

    let server = Arc::new(RtmpServer::new(config));

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            shutdown_server.shutdown().await;
        }
    });

    server.listen().await?;
    Ok(())
}
