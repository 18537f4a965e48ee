// Shared test harness: a minimal RTMP client built from the crate's own
// handshake and chunk primitives, driving a real server socket.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use rtmpd::{
    Amf0Object, Amf0Value, ChunkReader, ChunkWriter, ProtocolControl, RtmpCommand, RtmpHeader,
    RtmpPacket, C0C1, C2, HANDSHAKE_SIZE, MSG_TYPE_SET_CHUNK_SIZE, S0S1S2,
};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestClient {
    stream: TcpStream,
    reader: ChunkReader,
    writer: ChunkWriter,
}

impl TestClient {
    /// Connect and complete the plain handshake
    pub async fn connect(port: u16) -> TestClient {
        let stream = timeout(
            IO_TIMEOUT,
            TcpStream::connect(format!("127.0.0.1:{}", port)),
        )
        .await
        .expect("connect timeout")
        .expect("connect");

        let mut client = TestClient {
            stream,
            reader: ChunkReader::new(),
            writer: ChunkWriter::new(),
        };
        client.handshake().await;
        client
    }

    async fn handshake(&mut self) {
        let c0c1 = C0C1::create_client();
        self.stream.write_all(&c0c1.encode()).await.unwrap();

        let mut response = vec![0u8; 1 + HANDSHAKE_SIZE * 2];
        timeout(IO_TIMEOUT, self.stream.read_exact(&mut response))
            .await
            .expect("handshake timeout")
            .expect("handshake read");
        let response = S0S1S2::parse(&response).unwrap();

        let c2 = C2::create_from_s1(&response.s1).unwrap();
        self.stream.write_all(&c2.encode()).await.unwrap();
    }

    /// Send a packet through the chunk writer
    pub async fn send_packet(&mut self, packet: &RtmpPacket) {
        self.writer
            .write_message(&mut self.stream, packet)
            .await
            .expect("send packet");
    }

    /// Send a command on a message stream
    pub async fn send_command(&mut self, stream_id: u32, command: &RtmpCommand) {
        let payload = command.encode().unwrap();
        let header = RtmpHeader::command(0, payload.len() as u32, stream_id);
        self.send_packet(&RtmpPacket::new(header, payload)).await;
    }

    /// Receive the next full message; server chunk-size changes are
    /// applied to the inbound decoder as they arrive
    pub async fn recv_message(&mut self) -> RtmpPacket {
        loop {
            let message = timeout(IO_TIMEOUT, self.reader.read_message(&mut self.stream))
                .await
                .expect("receive timeout")
                .expect("receive");

            if let Some(packet) = message {
                if packet.message_type() == MSG_TYPE_SET_CHUNK_SIZE {
                    if let Ok(ProtocolControl::SetChunkSize(size)) =
                        ProtocolControl::decode(packet.message_type(), &packet.payload)
                    {
                        self.reader.set_chunk_size(size as usize);
                    }
                }
                return packet;
            }
        }
    }

    /// Receive until the next command message decodes
    pub async fn recv_command(&mut self) -> RtmpCommand {
        loop {
            let packet = self.recv_message().await;
            if packet.is_command() {
                return RtmpCommand::decode(&packet.payload).unwrap();
            }
        }
    }

    /// Receive until the next audio/video message
    pub async fn recv_media(&mut self) -> RtmpPacket {
        loop {
            let packet = self.recv_message().await;
            if packet.is_audio() || packet.is_video() {
                return packet;
            }
        }
    }

    /// Receive until a command with an info code appears
    pub async fn next_status_code(&mut self) -> String {
        loop {
            let command = self.recv_command().await;
            if let Some(code) = command
                .argument(0)
                .and_then(|v| v.get_property("code"))
                .and_then(|v| v.as_string())
            {
                return code.to_string();
            }
        }
    }

    /// The full NetConnection bring-up: connect to an app and drain the
    /// negotiation sequence up to the `_result`
    pub async fn connect_app(&mut self, app: &str) -> RtmpCommand {
        self.send_command(0, &connect_command(app)).await;

        loop {
            let packet = self.recv_message().await;
            if packet.is_command() {
                let command = RtmpCommand::decode(&packet.payload).unwrap();
                assert_eq!(command.name, "_result");
                return command;
            }
        }
    }

    /// createStream and return the allocated id
    pub async fn create_stream(&mut self) -> u32 {
        let mut command = RtmpCommand::new("createStream", 4.0);
        command.command_object = Some(Amf0Value::Null);
        self.send_command(0, &command).await;

        let reply = self.recv_command().await;
        assert_eq!(reply.name, "_result");
        reply.argument(0).and_then(|v| v.as_number()).unwrap() as u32
    }
}

pub fn connect_command(app: &str) -> RtmpCommand {
    let mut command = RtmpCommand::new("connect", 1.0);
    command.command_object = Some(Amf0Value::Object(
        Amf0Object::new()
            .with("app", Amf0Value::String(app.to_string()))
            .with(
                "tcUrl",
                Amf0Value::String(format!("rtmp://127.0.0.1/{}", app)),
            )
            .with("objectEncoding", Amf0Value::Number(0.0)),
    ));
    command
}

pub fn publish_command(name: &str, kind: &str) -> RtmpCommand {
    let mut command = RtmpCommand::new("publish", 5.0);
    command.command_object = Some(Amf0Value::Null);
    command.arguments.push(Amf0Value::String(name.to_string()));
    command.arguments.push(Amf0Value::String(kind.to_string()));
    command
}

pub fn play_command(name: &str, start: f64, duration: f64, reset: bool) -> RtmpCommand {
    let mut command = RtmpCommand::new("play", 0.0);
    command.command_object = Some(Amf0Value::Null);
    command.arguments.push(Amf0Value::String(name.to_string()));
    command.arguments.push(Amf0Value::Number(start));
    command.arguments.push(Amf0Value::Number(duration));
    command.arguments.push(Amf0Value::Boolean(reset));
    command
}

/// AVC sequence header video payload (keyframe, packet type 0)
pub fn avc_config_payload() -> Vec<u8> {
    vec![
        0x17, 0x00, 0x00, 0x00, 0x00, // tag header
        0x01, 0x64, 0x00, 0x1F, 0xFF, // avcC prefix
        0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, // one SPS
        0x01, 0x00, 0x02, 0x68, 0xEB, // one PPS
    ]
}

/// AAC sequence header audio payload
pub fn aac_config_payload() -> Vec<u8> {
    vec![0xAF, 0x00, 0x12, 0x10]
}

/// AVC keyframe payload with one NALU
pub fn avc_keyframe_payload() -> Vec<u8> {
    vec![
        0x17, 0x01, 0x00, 0x00, 0x00, // tag header
        0x00, 0x00, 0x00, 0x03, 0x65, 0xAA, 0xBB, // one 3-byte NALU
    ]
}
