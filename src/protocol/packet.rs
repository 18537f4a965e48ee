use crate::protocol::constants::*;

#[derive(Debug, Clone)]
pub struct RtmpPacket {
    pub header: RtmpHeader,
    pub payload: Vec<u8>,
}

impl RtmpPacket {
    /// Create new packet
    pub fn new(header: RtmpHeader, payload: Vec<u8>) -> Self {
        RtmpPacket { header, payload }
    }

    /// Get message type
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    /// Get message stream ID
    pub fn message_stream_id(&self) -> u32 {
        self.header.message_stream_id
    }

    /// Get timestamp
    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    /// Check if this is an audio packet
    pub fn is_audio(&self) -> bool {
        self.header.message_type == MSG_TYPE_AUDIO
    }

    /// Check if this is a video packet
    pub fn is_video(&self) -> bool {
        self.header.message_type == MSG_TYPE_VIDEO
    }

    /// Check if this is a command message
    pub fn is_command(&self) -> bool {
        self.header.message_type == MSG_TYPE_COMMAND_AMF0
            || self.header.message_type == MSG_TYPE_COMMAND_AMF3
    }

    /// Check if this is a data message
    pub fn is_data(&self) -> bool {
        self.header.message_type == MSG_TYPE_DATA_AMF0
            || self.header.message_type == MSG_TYPE_DATA_AMF3
    }

    /// Check if this is a protocol control message
    pub fn is_control(&self) -> bool {
        matches!(
            self.header.message_type,
            MSG_TYPE_SET_CHUNK_SIZE
                | MSG_TYPE_ABORT
                | MSG_TYPE_ACK
                | MSG_TYPE_WINDOW_ACK
                | MSG_TYPE_SET_PEER_BW
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtmpHeader {
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type: u8,
    pub message_stream_id: u32,
    pub chunk_stream_id: u32,
}

impl RtmpHeader {
    /// Create new header
    pub fn new(
        timestamp: u32,
        message_length: u32,
        message_type: u8,
        message_stream_id: u32,
        chunk_stream_id: u32,
    ) -> Self {
        RtmpHeader {
            timestamp,
            message_length,
            message_type,
            message_stream_id,
            chunk_stream_id,
        }
    }

    /// Create header for audio message
    pub fn audio(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(timestamp, length, MSG_TYPE_AUDIO, stream_id, CHUNK_STREAM_AUDIO)
    }

    /// Create header for video message
    pub fn video(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(timestamp, length, MSG_TYPE_VIDEO, stream_id, CHUNK_STREAM_VIDEO)
    }

    /// Create header for command message
    pub fn command(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(
            timestamp,
            length,
            MSG_TYPE_COMMAND_AMF0,
            stream_id,
            CHUNK_STREAM_COMMAND,
        )
    }

    /// Create header for data message
    pub fn data(timestamp: u32, length: u32, stream_id: u32) -> Self {
        RtmpHeader::new(timestamp, length, MSG_TYPE_DATA_AMF0, stream_id, CHUNK_STREAM_DATA)
    }

    /// Create header for a protocol control or user control message
    pub fn control(message_type: u8, length: u32) -> Self {
        RtmpHeader::new(0, length, message_type, 0, CHUNK_STREAM_PROTOCOL)
    }

    /// Check if timestamp is extended (>= 0xFFFFFF)
    pub fn has_extended_timestamp(&self) -> bool {
        self.timestamp >= EXTENDED_TIMESTAMP
    }
}

pub fn make_audio_packet(data: Vec<u8>, timestamp: u32, stream_id: u32) -> RtmpPacket {
    let header = RtmpHeader::audio(timestamp, data.len() as u32, stream_id);
    RtmpPacket::new(header, data)
}

pub fn make_video_packet(data: Vec<u8>, timestamp: u32, stream_id: u32) -> RtmpPacket {
    let header = RtmpHeader::video(timestamp, data.len() as u32, stream_id);
    RtmpPacket::new(header, data)
}

pub fn make_data_packet(data: Vec<u8>, timestamp: u32, stream_id: u32) -> RtmpPacket {
    let header = RtmpHeader::data(timestamp, data.len() as u32, stream_id);
    RtmpPacket::new(header, data)
}
