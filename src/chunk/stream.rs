use crate::protocol::{RtmpHeader, RtmpPacket};
use crate::{Error, Result};

/// Header fields of the last message seen on a chunk stream, the delta base
/// for fmt 1/2/3 chunks
#[derive(Debug, Clone, Copy)]
pub struct LastHeader {
    /// Absolute timestamp of the last message
    pub timestamp: u32,

    /// Last timestamp delta applied (0 after a fmt 0 chunk)
    pub delta: u32,

    /// Message length
    pub message_length: u32,

    /// Message type
    pub message_type: u8,

    /// Message stream ID
    pub message_stream_id: u32,

    /// True when the last header-bearing chunk used the extended timestamp
    /// field; fmt 3 chunks then re-carry it
    pub extended: bool,
}

/// Per-CSID inbound assembly state
#[derive(Debug, Default)]
pub struct ChunkStreamContext {
    /// Delta base from the last header-bearing chunk
    pub last: Option<LastHeader>,

    /// Header of the message currently being assembled
    current: Option<RtmpHeader>,

    /// Partial message payload
    buffer: Vec<u8>,
}

impl ChunkStreamContext {
    /// Create new chunk stream context
    pub fn new() -> Self {
        ChunkStreamContext::default()
    }

    /// Check if a message is partially assembled
    pub fn is_assembling(&self) -> bool {
        self.current.is_some()
    }

    /// Payload bytes still missing for the current message
    pub fn bytes_remaining(&self) -> usize {
        match self.current {
            Some(header) => (header.message_length as usize).saturating_sub(self.buffer.len()),
            None => 0,
        }
    }

    /// Begin assembling a message and record the new delta base
    pub fn start_message(&mut self, header: RtmpHeader, last: LastHeader) -> Result<()> {
        if self.is_assembling() {
            return Err(Error::chunk(
                "New message header while previous message incomplete",
            ));
        }

        self.buffer.clear();
        self.buffer.reserve(header.message_length as usize);
        self.current = Some(header);
        self.last = Some(last);
        Ok(())
    }

    /// Append one chunk of payload; returns the packet once complete
    pub fn append_chunk(&mut self, data: &[u8]) -> Result<Option<RtmpPacket>> {
        let header = self
            .current
            .ok_or_else(|| Error::chunk("Payload chunk without message header"))?;

        self.buffer.extend_from_slice(data);

        if self.buffer.len() < header.message_length as usize {
            return Ok(None);
        }

        self.current = None;
        Ok(Some(RtmpPacket::new(header, std::mem::take(&mut self.buffer))))
    }

    /// Drop the partially assembled message (ABORT control message)
    pub fn abort(&mut self) {
        self.current = None;
        self.buffer.clear();
    }
}
