use std::collections::HashMap;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::constants::{DEFAULT_CHUNK_SIZE, EXTENDED_TIMESTAMP};
use crate::protocol::RtmpPacket;
use crate::{Error, Result};

/// Header fields of the last message sent on a chunk stream
#[derive(Debug, Clone, Copy)]
struct LastSent {
    timestamp: u32,
    delta: u32,
    message_length: u32,
    message_type: u8,
    message_stream_id: u32,
    extended: bool,
}

pub struct ChunkWriter {
    /// Previous headers per chunk stream, the delta-compression base
    last: HashMap<u32, LastSent>,

    /// Current outbound chunk size
    chunk_size: usize,
}

impl ChunkWriter {
    /// Create new chunk writer
    pub fn new() -> Self {
        ChunkWriter {
            last: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE as usize,
        }
    }

    /// Set outgoing chunk size; the change must be announced to the peer
    /// with a SET_CHUNK_SIZE message beforehand
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    /// Encode a message into its chunked wire form
    pub fn encode_message(&mut self, packet: &RtmpPacket) -> Vec<u8> {
        let header = packet.header;
        let cs_id = header.chunk_stream_id;

        // Pick the smallest format the previous header on this CSID allows
        let prev = self.last.get(&cs_id).copied();
        let (fmt, field) = match prev {
            None => (0u8, header.timestamp),
            Some(prev) if prev.message_stream_id != header.message_stream_id => {
                (0, header.timestamp)
            }
            Some(prev) if header.timestamp < prev.timestamp => (0, header.timestamp),
            Some(prev) => {
                let delta = header.timestamp - prev.timestamp;
                if prev.message_length == header.message_length
                    && prev.message_type == header.message_type
                {
                    if delta == prev.delta {
                        (3, delta)
                    } else {
                        (2, delta)
                    }
                } else {
                    (1, delta)
                }
            }
        };

        // The extended timestamp form and the value continuation chunks
        // re-carry
        let (extended, ext_value) = if fmt == 3 {
            let prev = prev.expect("fmt 3 implies a previous header");
            (prev.extended, if prev.delta > 0 { prev.delta } else { header.timestamp })
        } else {
            (field >= EXTENDED_TIMESTAMP, field)
        };

        let mut out = Vec::with_capacity(16 + packet.payload.len());

        // First chunk: basic header + message header
        out.extend_from_slice(&encode_basic_header(fmt, cs_id));
        let wire_field = field.min(EXTENDED_TIMESTAMP);
        match fmt {
            0 => {
                push_u24(&mut out, wire_field);
                push_u24(&mut out, header.message_length);
                out.push(header.message_type);
                out.extend_from_slice(&header.message_stream_id.to_le_bytes());
            }
            1 => {
                push_u24(&mut out, wire_field);
                push_u24(&mut out, header.message_length);
                out.push(header.message_type);
            }
            2 => {
                push_u24(&mut out, wire_field);
            }
            _ => {}
        }
        if extended {
            out.extend_from_slice(&ext_value.to_be_bytes());
        }

        // Payload split at the chunk size, fmt 3 continuation headers between
        let continuation = encode_basic_header(3, cs_id);
        let mut offset = 0;
        let payload_len = packet.payload.len();
        loop {
            let end = (offset + self.chunk_size).min(payload_len);
            out.extend_from_slice(&packet.payload[offset..end]);
            offset = end;

            if offset >= payload_len {
                break;
            }

            out.extend_from_slice(&continuation);
            if extended {
                out.extend_from_slice(&ext_value.to_be_bytes());
            }
        }

        // Record the new delta base
        let entry = match (fmt, prev) {
            (3, Some(prev)) => LastSent {
                timestamp: header.timestamp,
                ..prev
            },
            _ => LastSent {
                timestamp: header.timestamp,
                delta: if fmt == 0 { 0 } else { field },
                message_length: header.message_length,
                message_type: header.message_type,
                message_stream_id: header.message_stream_id,
                extended,
            },
        };
        self.last.insert(cs_id, entry);

        out
    }

    /// Chunk a message and write it to the stream
    pub async fn write_message<W: AsyncWrite + Unpin>(
        &mut self,
        writer: &mut W,
        packet: &RtmpPacket,
    ) -> Result<()> {
        let chunks = self.encode_message(packet);

        writer
            .write_all(&chunks)
            .await
            .map_err(|e| Error::chunk(format!("Failed to write chunks: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::chunk(format!("Failed to flush: {}", e)))?;

        Ok(())
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        ChunkWriter::new()
    }
}

fn push_u24(out: &mut Vec<u8>, value: u32) {
    out.push((value >> 16) as u8);
    out.push((value >> 8) as u8);
    out.push(value as u8);
}

/// Encode the 1-3 byte basic header for a format and chunk stream id
pub fn encode_basic_header(fmt: u8, cs_id: u32) -> Vec<u8> {
    if cs_id <= 63 {
        vec![(fmt << 6) | cs_id as u8]
    } else if cs_id <= 319 {
        vec![fmt << 6, (cs_id - 64) as u8]
    } else {
        let id = cs_id - 64;
        vec![(fmt << 6) | 1, (id & 0xFF) as u8, (id >> 8) as u8]
    }
}
