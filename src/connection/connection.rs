use std::sync::Arc;

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::broker::MediaFrame;
use crate::chunk::{ChunkReader, ChunkWriter};
use crate::connection::context::ConnectionContext;
use crate::connection::state::ConnectionState;
use crate::handlers::CommandHandlerRegistry;
use crate::handshake::{C0C1, C2, HANDSHAKE_SIZE, HandshakeEvent, HandshakeState, S0S1S2};
use crate::message::{split_aggregate, MessageType};
use crate::protocol::{
    ProtocolControl, RtmpCommand, RtmpData, RtmpPacket, UserControlEvent, MSG_TYPE_COMMAND_AMF3,
    MSG_TYPE_DATA_AMF3, MSG_TYPE_SET_CHUNK_SIZE, ON_METADATA,
};
use crate::utils::current_timestamp;
use crate::{Error, Result};

/// One accepted RTMP connection: the handshake, the sequential read loop,
/// and the write task owning the outbound chunk stream.
pub struct Connection {
    context: Arc<ConnectionContext>,
    state: RwLock<ConnectionState>,
}

impl Connection {
    /// Create a connection around its shared context
    pub fn new(context: Arc<ConnectionContext>) -> Self {
        Connection {
            context,
            state: RwLock::new(ConnectionState::Uninitialized),
        }
    }

    /// Shared context
    pub fn context(&self) -> &Arc<ConnectionContext> {
        &self.context
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn transition(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        if state.can_transition_to(next) {
            *state = next;
        }
    }

    /// Drive the connection to completion. Consumes the socket; returns
    /// once the peer disconnects, a fatal protocol error occurs, or a
    /// close is requested.
    pub async fn process<S>(
        &self,
        stream: S,
        handlers: Arc<CommandHandlerRegistry>,
        outbound_rx: mpsc::Receiver<RtmpPacket>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut read_half, mut write_half) = tokio::io::split(stream);

        self.transition(ConnectionState::Handshaking).await;
        self.handshake(&mut read_half, &mut write_half).await?;
        debug!("Handshake complete for {}", self.context.peer_addr());
        self.transition(ConnectionState::Connected).await;

        let write_task = spawn_write_task(write_half, outbound_rx);
        let ping_task = self.spawn_ping_task();

        let result = self.read_loop(&mut read_half, &handlers).await;

        self.transition(ConnectionState::Closing).await;
        self.cleanup().await;
        ping_task.abort();
        write_task.abort();
        self.transition(ConnectionState::Closed).await;

        result
    }

    /// Three-stage handshake; any failure closes the socket without a
    /// status frame
    async fn handshake<R, W>(&self, read_half: &mut R, write_half: &mut W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let deadline = self.context.config().idle_timeout;
        let mut state = HandshakeState::new();

        let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
        timeout(deadline, read_half.read_exact(&mut c0c1))
            .await
            .map_err(|_| Error::timeout("Timed out reading C0+C1"))?
            .map_err(|e| Error::handshake(format!("Failed to read C0+C1: {}", e)))?;

        let c0c1 = C0C1::parse(&c0c1)?;
        let response = S0S1S2::answer(&c0c1)?;
        state.transition(HandshakeEvent::ReceivedC0C1)?;

        write_half
            .write_all(&response.encode())
            .await
            .map_err(|e| Error::handshake(format!("Failed to write S0+S1+S2: {}", e)))?;
        write_half
            .flush()
            .await
            .map_err(|e| Error::handshake(format!("Failed to flush handshake: {}", e)))?;

        let mut c2 = vec![0u8; HANDSHAKE_SIZE];
        timeout(deadline, read_half.read_exact(&mut c2))
            .await
            .map_err(|_| Error::timeout("Timed out reading C2"))?
            .map_err(|e| Error::handshake(format!("Failed to read C2: {}", e)))?;
        C2::parse(&c2)?;
        state.transition(HandshakeEvent::ReceivedC2)?;

        Ok(())
    }

    /// Sequential decode-dispatch-handle loop; per-connection ordering is
    /// the loop itself
    async fn read_loop<R>(
        &self,
        read_half: &mut R,
        handlers: &Arc<CommandHandlerRegistry>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let idle = self.context.config().idle_timeout;
        let mut reader = ChunkReader::new();

        loop {
            if self.context.close_requested() {
                return Ok(());
            }

            let message = match timeout(idle, reader.read_message(read_half)).await {
                Err(_) => return Err(Error::timeout("Connection idle timeout")),
                Ok(Err(e)) => return Err(e),
                Ok(Ok(message)) => message,
            };

            if let Some(packet) = message {
                self.handle_message(packet, &mut reader, handlers).await?;
            }

            while let Some(sequence) = reader.take_ack() {
                self.context
                    .send_control(ProtocolControl::Acknowledgement(sequence))
                    .await?;
            }
        }
    }

    /// Classify and handle one assembled message
    async fn handle_message(
        &self,
        packet: RtmpPacket,
        reader: &mut ChunkReader,
        handlers: &Arc<CommandHandlerRegistry>,
    ) -> Result<()> {
        match MessageType::from_id(packet.message_type()) {
            MessageType::Control(_) => {
                self.handle_control(&packet, reader)?;
            }
            MessageType::UserControl => {
                self.handle_user_control(&packet).await?;
            }
            MessageType::Command => {
                let offset = amf3_offset(&packet, MSG_TYPE_COMMAND_AMF3);
                let command = RtmpCommand::decode(&packet.payload[offset..])?;
                trace!(
                    "Command '{}' on stream {}",
                    command.name,
                    packet.message_stream_id()
                );
                handlers
                    .handle(command, &packet.header, self.context.clone())
                    .await?;
            }
            MessageType::Data => {
                self.handle_data(packet).await;
            }
            MessageType::Audio => {
                self.handle_audio(packet).await;
            }
            MessageType::Video => {
                self.handle_video(packet).await;
            }
            MessageType::Aggregate => {
                for sub in split_aggregate(&packet)? {
                    match MessageType::from_id(sub.message_type()) {
                        MessageType::Audio => self.handle_audio(sub).await,
                        MessageType::Video => self.handle_video(sub).await,
                        MessageType::Data => self.handle_data(sub).await,
                        other => debug!("Ignoring {:?} inside aggregate", other),
                    }
                }
            }
            MessageType::SharedObject => {
                debug!("Ignoring shared object message");
            }
            MessageType::Unknown(id) => {
                debug!("Ignoring unknown message type {}", id);
            }
        }

        Ok(())
    }

    /// Apply protocol control messages to the inbound codec state
    fn handle_control(&self, packet: &RtmpPacket, reader: &mut ChunkReader) -> Result<()> {
        match ProtocolControl::decode(packet.message_type(), &packet.payload)? {
            ProtocolControl::SetChunkSize(size) => {
                debug!("Peer chunk size is now {}", size);
                reader.set_chunk_size(size as usize);
            }
            ProtocolControl::Abort(cs_id) => {
                debug!("Peer aborted chunk stream {}", cs_id);
                reader.abort(cs_id);
            }
            ProtocolControl::Acknowledgement(sequence) => {
                trace!("Peer acknowledged {} bytes", sequence);
            }
            ProtocolControl::WindowAckSize(size) => {
                debug!("Peer window ack size is now {}", size);
                reader.set_window(size);
            }
            ProtocolControl::SetPeerBandwidth { size, .. } => {
                self.context.set_peer_bandwidth(size);
            }
        }

        Ok(())
    }

    /// Interpret user control events; ping requests are answered
    async fn handle_user_control(&self, packet: &RtmpPacket) -> Result<()> {
        match UserControlEvent::decode(&packet.payload)? {
            UserControlEvent::PingRequest(timestamp) => {
                self.context
                    .send_user_control(UserControlEvent::PingResponse(timestamp))
                    .await?;
            }
            UserControlEvent::PingResponse(timestamp) => {
                trace!("Ping response for {}", timestamp);
            }
            UserControlEvent::SetBufferLength {
                stream_id,
                buffer_ms,
            } => {
                debug!("Peer buffer for stream {}: {} ms", stream_id, buffer_ms);
            }
            event => {
                debug!("Ignoring user control event {:?}", event);
            }
        }
        Ok(())
    }

    /// Publisher data path: track retained data frames, fan out the rest
    async fn handle_data(&self, packet: RtmpPacket) {
        let Some(stream) = self.published_stream(packet.message_stream_id()).await else {
            debug!("Data message on non-publishing stream, dropped");
            return;
        };

        let offset = amf3_offset(&packet, MSG_TYPE_DATA_AMF3);
        let data = match RtmpData::decode(&packet.payload[offset..]) {
            Ok(data) => data,
            Err(e) => {
                debug!("Undecodable data message dropped: {}", e);
                return;
            }
        };

        if data.is_set_data_frame() {
            match data.unwrap_set_data_frame() {
                Ok((handler, payload)) => stream.publish_data(handler, payload).await,
                Err(e) => debug!("Malformed @setDataFrame dropped: {}", e),
            }
        } else if data.is_clear_data_frame() {
            match data.unwrap_clear_data_frame() {
                Ok(handler) => stream.clear_data(&handler).await,
                Err(e) => debug!("Malformed @clearDataFrame dropped: {}", e),
            }
        } else if data.handler == ON_METADATA {
            stream
                .publish_data(data.handler, packet.payload[offset..].to_vec())
                .await;
        } else {
            stream
                .send_data(data.handler, packet.payload[offset..].to_vec())
                .await;
        }
    }

    /// Publisher audio path
    async fn handle_audio(&self, packet: RtmpPacket) {
        let Some(stream) = self.published_stream(packet.message_stream_id()).await else {
            debug!("Audio message on non-publishing stream, dropped");
            return;
        };

        let frame = MediaFrame::audio(packet.timestamp(), packet.payload);
        stream.publish_audio(frame).await;
    }

    /// Publisher video path
    async fn handle_video(&self, packet: RtmpPacket) {
        let Some(stream) = self.published_stream(packet.message_stream_id()).await else {
            debug!("Video message on non-publishing stream, dropped");
            return;
        };

        let frame = MediaFrame::video(packet.timestamp(), packet.payload);
        stream.publish_video(frame).await;
    }

    /// The broker stream behind a publishing NetStream, if any
    async fn published_stream(
        &self,
        stream_id: u32,
    ) -> Option<Arc<crate::broker::BrokerStream>> {
        let streams = self.context.streams().lock().await;
        streams.get(stream_id).and_then(|ns| ns.published_stream())
    }

    /// Server-side keepalive pings
    fn spawn_ping_task(&self) -> JoinHandle<()> {
        let context = self.context.clone();
        let interval = self.context.config().ping_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let ping = UserControlEvent::PingRequest(current_timestamp());
                if context.send_user_control(ping).await.is_err() {
                    return;
                }
            }
        })
    }

    /// Cascade teardown into every child NetStream. Idempotent; never
    /// leaves a broker subscription or publisher slot behind.
    async fn cleanup(&self) {
        self.context.request_close();

        let streams = {
            let mut manager = self.context.streams().lock().await;
            manager.take_all()
        };

        for mut net_stream in streams {
            net_stream
                .detach(self.context.id(), self.context.broker())
                .await;
        }
    }
}

/// The write task: sole owner of the outbound chunk writer. An outbound
/// SET_CHUNK_SIZE takes effect immediately after it is written.
fn spawn_write_task<W>(mut write_half: W, mut outbound_rx: mpsc::Receiver<RtmpPacket>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut writer = ChunkWriter::new();

        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = writer.write_message(&mut write_half, &packet).await {
                debug!("Write task ending: {}", e);
                return;
            }

            if packet.message_type() == MSG_TYPE_SET_CHUNK_SIZE && packet.payload.len() >= 4 {
                let size = u32::from_be_bytes([
                    packet.payload[0],
                    packet.payload[1],
                    packet.payload[2],
                    packet.payload[3],
                ]) & 0x7FFF_FFFF;
                writer.set_chunk_size(size as usize);
            }
        }
    })
}

/// AMF3 command/data messages carry a one-byte format prefix before the
/// AMF0-encoded body
fn amf3_offset(packet: &RtmpPacket, amf3_type: u8) -> usize {
    if packet.message_type() == amf3_type && !packet.payload.is_empty() {
        1
    } else {
        0
    }
}
