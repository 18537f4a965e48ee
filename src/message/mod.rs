mod types;

pub use types::*;

use crate::protocol::{RtmpHeader, RtmpPacket};
use crate::{Error, Result};

/// Split an aggregate message (type 22) into its contained sub-messages.
///
/// The body is a sequence of FLV-style tags: type (1), length (3),
/// timestamp (3 + 1 extension byte), stream id (3), payload, and a 4-byte
/// back pointer. Sub-message timestamps are shifted so the first one equals
/// the aggregate's own timestamp; the stream id of the aggregate wins.
pub fn split_aggregate(packet: &RtmpPacket) -> Result<Vec<RtmpPacket>> {
    let body = &packet.payload;
    let mut messages = Vec::new();
    let mut offset = 0usize;
    let mut base_delta: Option<i64> = None;

    while offset < body.len() {
        if body.len() - offset < 11 {
            return Err(Error::protocol("Truncated aggregate sub-header"));
        }

        let message_type = body[offset];
        let length = u32::from_be_bytes([0, body[offset + 1], body[offset + 2], body[offset + 3]])
            as usize;
        let raw_timestamp = u32::from_be_bytes([
            body[offset + 7], // extension byte holds the high bits
            body[offset + 4],
            body[offset + 5],
            body[offset + 6],
        ]);
        offset += 11;

        if body.len() - offset < length + 4 {
            return Err(Error::protocol("Truncated aggregate sub-message"));
        }

        let delta =
            *base_delta.get_or_insert(packet.header.timestamp as i64 - raw_timestamp as i64);
        let timestamp = (raw_timestamp as i64 + delta) as u32;

        let payload = body[offset..offset + length].to_vec();
        offset += length + 4; // skip the back pointer

        messages.push(RtmpPacket::new(
            RtmpHeader::new(
                timestamp,
                length as u32,
                message_type,
                packet.header.message_stream_id,
                packet.header.chunk_stream_id,
            ),
            payload,
        ));
    }

    Ok(messages)
}
