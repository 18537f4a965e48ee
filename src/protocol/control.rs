use crate::protocol::constants::*;
use crate::protocol::packet::{RtmpHeader, RtmpPacket};
use crate::{Error, Result};

/// Protocol control messages (message stream 0, chunk stream 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolControl {
    SetChunkSize(u32),
    Abort(u32),
    Acknowledgement(u32),
    WindowAckSize(u32),
    SetPeerBandwidth { size: u32, limit_type: u8 },
}

impl ProtocolControl {
    /// Decode from message type and payload
    pub fn decode(message_type: u8, payload: &[u8]) -> Result<Self> {
        let word = |payload: &[u8]| -> Result<u32> {
            if payload.len() < 4 {
                return Err(Error::protocol("Control message too short"));
            }
            Ok(u32::from_be_bytes([
                payload[0], payload[1], payload[2], payload[3],
            ]))
        };

        match message_type {
            MSG_TYPE_SET_CHUNK_SIZE => {
                // Top bit is reserved; the field is 31 bits
                let size = word(payload)? & 0x7FFF_FFFF;
                if size == 0 || size > MAX_MESSAGE_SIZE as u32 {
                    return Err(Error::protocol(format!("Invalid chunk size: {}", size)));
                }
                Ok(ProtocolControl::SetChunkSize(size))
            }
            MSG_TYPE_ABORT => Ok(ProtocolControl::Abort(word(payload)?)),
            MSG_TYPE_ACK => Ok(ProtocolControl::Acknowledgement(word(payload)?)),
            MSG_TYPE_WINDOW_ACK => {
                let size = word(payload)?;
                if size == 0 {
                    return Err(Error::protocol("Invalid window ack size: 0"));
                }
                Ok(ProtocolControl::WindowAckSize(size))
            }
            MSG_TYPE_SET_PEER_BW => {
                let size = word(payload)?;
                let limit_type = *payload
                    .get(4)
                    .ok_or_else(|| Error::protocol("Peer bandwidth message too short"))?;
                Ok(ProtocolControl::SetPeerBandwidth { size, limit_type })
            }
            other => Err(Error::protocol(format!(
                "Not a protocol control type: {}",
                other
            ))),
        }
    }

    /// Build the wire packet
    pub fn to_packet(&self) -> RtmpPacket {
        let (message_type, payload) = match *self {
            ProtocolControl::SetChunkSize(size) => {
                (MSG_TYPE_SET_CHUNK_SIZE, size.to_be_bytes().to_vec())
            }
            ProtocolControl::Abort(csid) => (MSG_TYPE_ABORT, csid.to_be_bytes().to_vec()),
            ProtocolControl::Acknowledgement(seq) => (MSG_TYPE_ACK, seq.to_be_bytes().to_vec()),
            ProtocolControl::WindowAckSize(size) => {
                (MSG_TYPE_WINDOW_ACK, size.to_be_bytes().to_vec())
            }
            ProtocolControl::SetPeerBandwidth { size, limit_type } => {
                let mut payload = size.to_be_bytes().to_vec();
                payload.push(limit_type);
                (MSG_TYPE_SET_PEER_BW, payload)
            }
        };

        RtmpPacket::new(
            RtmpHeader::control(message_type, payload.len() as u32),
            payload,
        )
    }
}

// User control event type ids
const UC_STREAM_BEGIN: u16 = 0;
const UC_STREAM_EOF: u16 = 1;
const UC_STREAM_DRY: u16 = 2;
const UC_SET_BUFFER_LENGTH: u16 = 3;
const UC_STREAM_IS_RECORDED: u16 = 4;
const UC_PING_REQUEST: u16 = 6;
const UC_PING_RESPONSE: u16 = 7;

/// User control events (message type 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
    StreamDry(u32),
    SetBufferLength { stream_id: u32, buffer_ms: u32 },
    StreamIsRecorded(u32),
    PingRequest(u32),
    PingResponse(u32),
}

impl UserControlEvent {
    /// Decode from a user control payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < 6 {
            return Err(Error::protocol("User control message too short"));
        }

        let event_type = u16::from_be_bytes([payload[0], payload[1]]);
        let first = u32::from_be_bytes([payload[2], payload[3], payload[4], payload[5]]);

        match event_type {
            UC_STREAM_BEGIN => Ok(UserControlEvent::StreamBegin(first)),
            UC_STREAM_EOF => Ok(UserControlEvent::StreamEof(first)),
            UC_STREAM_DRY => Ok(UserControlEvent::StreamDry(first)),
            UC_SET_BUFFER_LENGTH => {
                if payload.len() < 10 {
                    return Err(Error::protocol("SetBufferLength message too short"));
                }
                let buffer_ms =
                    u32::from_be_bytes([payload[6], payload[7], payload[8], payload[9]]);
                Ok(UserControlEvent::SetBufferLength {
                    stream_id: first,
                    buffer_ms,
                })
            }
            UC_STREAM_IS_RECORDED => Ok(UserControlEvent::StreamIsRecorded(first)),
            UC_PING_REQUEST => Ok(UserControlEvent::PingRequest(first)),
            UC_PING_RESPONSE => Ok(UserControlEvent::PingResponse(first)),
            other => Err(Error::protocol(format!(
                "Unknown user control event: {}",
                other
            ))),
        }
    }

    /// Build the wire packet
    pub fn to_packet(&self) -> RtmpPacket {
        let (event_type, first, second) = match *self {
            UserControlEvent::StreamBegin(id) => (UC_STREAM_BEGIN, id, None),
            UserControlEvent::StreamEof(id) => (UC_STREAM_EOF, id, None),
            UserControlEvent::StreamDry(id) => (UC_STREAM_DRY, id, None),
            UserControlEvent::SetBufferLength {
                stream_id,
                buffer_ms,
            } => (UC_SET_BUFFER_LENGTH, stream_id, Some(buffer_ms)),
            UserControlEvent::StreamIsRecorded(id) => (UC_STREAM_IS_RECORDED, id, None),
            UserControlEvent::PingRequest(ts) => (UC_PING_REQUEST, ts, None),
            UserControlEvent::PingResponse(ts) => (UC_PING_RESPONSE, ts, None),
        };

        let mut payload = Vec::with_capacity(10);
        payload.extend_from_slice(&event_type.to_be_bytes());
        payload.extend_from_slice(&first.to_be_bytes());
        if let Some(second) = second {
            payload.extend_from_slice(&second.to_be_bytes());
        }

        RtmpPacket::new(
            RtmpHeader::control(MSG_TYPE_USER_CONTROL, payload.len() as u32),
            payload,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_control_round_trip() {
        let cases = [
            ProtocolControl::SetChunkSize(4096),
            ProtocolControl::Abort(4),
            ProtocolControl::Acknowledgement(2_500_000),
            ProtocolControl::WindowAckSize(2_500_000),
            ProtocolControl::SetPeerBandwidth {
                size: 2_500_000,
                limit_type: LIMIT_TYPE_DYNAMIC,
            },
        ];

        for original in cases {
            let packet = original.to_packet();
            assert_eq!(packet.header.chunk_stream_id, CHUNK_STREAM_PROTOCOL);
            assert_eq!(packet.header.message_stream_id, 0);

            let decoded =
                ProtocolControl::decode(packet.header.message_type, &packet.payload).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(ProtocolControl::decode(MSG_TYPE_SET_CHUNK_SIZE, &[0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_user_control_round_trip() {
        let cases = [
            UserControlEvent::StreamBegin(0),
            UserControlEvent::StreamEof(1),
            UserControlEvent::SetBufferLength {
                stream_id: 1,
                buffer_ms: 3000,
            },
            UserControlEvent::PingRequest(12345),
            UserControlEvent::PingResponse(12345),
        ];

        for original in cases {
            let packet = original.to_packet();
            assert_eq!(packet.header.message_type, MSG_TYPE_USER_CONTROL);
            assert_eq!(UserControlEvent::decode(&packet.payload).unwrap(), original);
        }
    }

    #[test]
    fn test_truncated_user_control() {
        assert!(UserControlEvent::decode(&[0, 0, 0]).is_err());
        assert!(UserControlEvent::decode(&[0, 3, 0, 0, 0, 1]).is_err());
    }
}
