use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::broker::{StreamBroker, StreamKey};
use crate::connection::stream_manager::StreamManager;
use crate::muxer::SlicerFactory;
use crate::protocol::{
    ProtocolControl, RtmpCommand, RtmpData, RtmpHeader, RtmpPacket, StatusInfo, UserControlEvent,
};
use crate::server::ServerConfig;
use crate::{Error, Result};

/// Application target a connection bound itself to with `connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTarget {
    pub app: String,
    pub instance: String,
}

/// Shared per-connection state handed to command handlers and playback
/// tasks. Owns no I/O itself; outbound packets go through the write task's
/// channel.
pub struct ConnectionContext {
    /// Connection identity, also the clientid surfaced in status objects
    id: Uuid,

    /// Peer address, for logs
    peer_addr: String,

    /// Server configuration
    config: Arc<ServerConfig>,

    /// Shared stream broker
    broker: Arc<StreamBroker>,

    /// Slicer factory when recording is available
    slicer_factory: Option<Arc<dyn SlicerFactory>>,

    /// Outbound packet channel into the write task
    outbound: mpsc::Sender<RtmpPacket>,

    /// Application bound by connect
    app: RwLock<Option<AppTarget>>,

    /// Negotiated object encoding (0 = AMF0, 3 = AMF3)
    object_encoding: RwLock<f64>,

    /// Connect wall-clock time (unix seconds)
    connect_time: RwLock<Option<i64>>,

    /// Peer-announced bandwidth, recorded from SET_PEER_BANDWIDTH
    peer_bandwidth: AtomicU32,

    /// Child NetStreams
    streams: Mutex<StreamManager>,

    /// Close requested by a command or handler
    closing: AtomicBool,
}

impl ConnectionContext {
    /// Create new context
    pub fn new(
        peer_addr: String,
        config: Arc<ServerConfig>,
        broker: Arc<StreamBroker>,
        slicer_factory: Option<Arc<dyn SlicerFactory>>,
        outbound: mpsc::Sender<RtmpPacket>,
    ) -> Self {
        ConnectionContext {
            id: Uuid::new_v4(),
            peer_addr,
            config,
            broker,
            slicer_factory,
            outbound,
            app: RwLock::new(None),
            object_encoding: RwLock::new(0.0),
            connect_time: RwLock::new(None),
            peer_bandwidth: AtomicU32::new(0),
            streams: Mutex::new(StreamManager::new()),
            closing: AtomicBool::new(false),
        }
    }

    /// Connection identity
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Identity string used as clientid in status objects
    pub fn client_id(&self) -> String {
        self.id.simple().to_string()
    }

    /// Peer address
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared stream broker
    pub fn broker(&self) -> &Arc<StreamBroker> {
        &self.broker
    }

    /// Slicer factory, when the server was built with one
    pub fn slicer_factory(&self) -> Option<&Arc<dyn SlicerFactory>> {
        self.slicer_factory.as_ref()
    }

    /// Child NetStream table
    pub fn streams(&self) -> &Mutex<StreamManager> {
        &self.streams
    }

    /// Clone of the outbound sender, for playback tasks
    pub fn outbound(&self) -> mpsc::Sender<RtmpPacket> {
        self.outbound.clone()
    }

    /// Bind the connection to an application target
    pub async fn set_app(&self, target: AppTarget) {
        *self.app.write().await = Some(target);
        *self.connect_time.write().await = Some(chrono::Utc::now().timestamp());
    }

    /// Application target, once connected
    pub async fn app(&self) -> Option<AppTarget> {
        self.app.read().await.clone()
    }

    /// True once `connect` succeeded
    pub async fn is_connected(&self) -> bool {
        self.app.read().await.is_some()
    }

    /// Unix time of the successful connect, if any
    pub async fn connect_time(&self) -> Option<i64> {
        *self.connect_time.read().await
    }

    /// Broker key for a stream name under this connection's app
    pub async fn stream_key(&self, name: &str) -> Result<StreamKey> {
        let target = self
            .app()
            .await
            .ok_or_else(|| Error::command("Not connected"))?;
        Ok(StreamKey::new(target.app, target.instance, name))
    }

    /// Set negotiated object encoding
    pub async fn set_object_encoding(&self, encoding: f64) {
        *self.object_encoding.write().await = encoding;
    }

    /// Negotiated object encoding
    pub async fn object_encoding(&self) -> f64 {
        *self.object_encoding.read().await
    }

    /// Record the peer bandwidth announcement
    pub fn set_peer_bandwidth(&self, bandwidth: u32) {
        self.peer_bandwidth.store(bandwidth, Ordering::Relaxed);
    }

    /// Last announced peer bandwidth
    pub fn peer_bandwidth(&self) -> u32 {
        self.peer_bandwidth.load(Ordering::Relaxed)
    }

    /// Ask the read loop to stop after the current message
    pub fn request_close(&self) {
        self.closing.store(true, Ordering::Release);
    }

    /// True once a close was requested
    pub fn close_requested(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Queue a packet for the write task
    pub async fn send_packet(&self, packet: RtmpPacket) -> Result<()> {
        self.outbound
            .send(packet)
            .await
            .map_err(|_| Error::stream("Connection write channel closed"))
    }

    /// Queue a command reply on a message stream
    pub async fn send_command(&self, stream_id: u32, command: &RtmpCommand) -> Result<()> {
        let payload = command.encode()?;
        let header = RtmpHeader::command(0, payload.len() as u32, stream_id);
        self.send_packet(RtmpPacket::new(header, payload)).await
    }

    /// Queue an onStatus notification on a message stream
    pub async fn send_status(&self, stream_id: u32, info: &StatusInfo) -> Result<()> {
        self.send_command(stream_id, &RtmpCommand::on_status(info))
            .await
    }

    /// Queue a protocol control message
    pub async fn send_control(&self, control: ProtocolControl) -> Result<()> {
        self.send_packet(control.to_packet()).await
    }

    /// Queue a user control event
    pub async fn send_user_control(&self, event: UserControlEvent) -> Result<()> {
        self.send_packet(event.to_packet()).await
    }

    /// Queue a data message on a message stream
    pub async fn send_data(&self, stream_id: u32, data: &RtmpData) -> Result<()> {
        let payload = data.encode()?;
        let header = RtmpHeader::data(0, payload.len() as u32, stream_id);
        self.send_packet(RtmpPacket::new(header, payload)).await
    }
}
