use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::chunk::stream::{ChunkStreamContext, LastHeader};
use crate::protocol::{RtmpHeader, RtmpPacket};
use crate::protocol::constants::{
    CHUNK_STREAM_ID_MAX, DEFAULT_CHUNK_SIZE, DEFAULT_WINDOW_SIZE, EXTENDED_TIMESTAMP,
    MAX_MESSAGE_SIZE,
};
use crate::{Error, Result};

pub struct ChunkReader {
    /// Assembly state per chunk stream
    chunk_streams: HashMap<u32, ChunkStreamContext>,

    /// Current inbound chunk size
    chunk_size: usize,

    /// Peer window acknowledgement size
    window: u32,

    /// Total bytes consumed from the socket
    bytes_received: u64,

    /// Bytes already covered by emitted acknowledgements
    acked: u64,
}

impl ChunkReader {
    /// Create new chunk reader
    pub fn new() -> Self {
        ChunkReader {
            chunk_streams: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE as usize,
            window: DEFAULT_WINDOW_SIZE,
            bytes_received: 0,
            acked: 0,
        }
    }

    /// Set incoming chunk size; takes effect on the next chunk
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    /// Set the peer window acknowledgement size
    pub fn set_window(&mut self, size: u32) {
        self.window = size;
    }

    /// Total bytes consumed so far
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Discard the partial message on a chunk stream (ABORT)
    pub fn abort(&mut self, chunk_stream_id: u32) {
        if let Some(ctx) = self.chunk_streams.get_mut(&chunk_stream_id) {
            ctx.abort();
        }
    }

    /// Yield the next acknowledgement sequence number if a window boundary
    /// has been crossed; call repeatedly until it returns None
    pub fn take_ack(&mut self) -> Option<u32> {
        if self.window == 0 {
            return None;
        }
        if self.bytes_received - self.acked >= self.window as u64 {
            self.acked += self.window as u64;
            return Some(self.bytes_received as u32);
        }
        None
    }

    /// Read one chunk; returns the assembled message when it completes
    pub async fn read_message<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<RtmpPacket>> {
        let (fmt, cs_id) = self.read_basic_header(reader).await?;

        if cs_id < 2 || cs_id > CHUNK_STREAM_ID_MAX {
            return Err(Error::chunk(format!("Invalid chunk stream id: {}", cs_id)));
        }

        let prev = self.chunk_streams.get(&cs_id).and_then(|ctx| ctx.last);

        match fmt {
            0 => {
                let (header, extended) = self.read_type0_header(reader, cs_id).await?;
                self.start_message(cs_id, header, 0, extended)?;
            }
            1 => {
                let prev = prev.ok_or_else(|| Error::chunk("Type 1 chunk without base header"))?;
                let (delta, length, message_type, extended) =
                    self.read_type1_header(reader).await?;
                let header = RtmpHeader::new(
                    prev.timestamp.wrapping_add(delta),
                    length,
                    message_type,
                    prev.message_stream_id,
                    cs_id,
                );
                self.start_message(cs_id, header, delta, extended)?;
            }
            2 => {
                let prev = prev.ok_or_else(|| Error::chunk("Type 2 chunk without base header"))?;
                let (delta, extended) = self.read_type2_header(reader).await?;
                let header = RtmpHeader::new(
                    prev.timestamp.wrapping_add(delta),
                    prev.message_length,
                    prev.message_type,
                    prev.message_stream_id,
                    cs_id,
                );
                self.start_message(cs_id, header, delta, extended)?;
            }
            3 => {
                let prev = prev.ok_or_else(|| Error::chunk("Type 3 chunk without base header"))?;

                // A type 3 chunk re-carries the 4-byte extended timestamp
                // whenever the base header used one
                if prev.extended {
                    self.read_u32(reader).await?;
                }

                let assembling = self
                    .chunk_streams
                    .get(&cs_id)
                    .map(|ctx| ctx.is_assembling())
                    .unwrap_or(false);

                if !assembling {
                    // A fresh message inheriting everything, including the
                    // previous delta
                    let header = RtmpHeader::new(
                        prev.timestamp.wrapping_add(prev.delta),
                        prev.message_length,
                        prev.message_type,
                        prev.message_stream_id,
                        cs_id,
                    );
                    self.start_message(cs_id, header, prev.delta, prev.extended)?;
                }
            }
            _ => unreachable!("fmt is two bits"),
        }

        // Payload slice for this chunk
        let ctx = self
            .chunk_streams
            .get_mut(&cs_id)
            .expect("context created above");
        let take = ctx.bytes_remaining().min(self.chunk_size);

        let mut data = vec![0u8; take];
        reader
            .read_exact(&mut data)
            .await
            .map_err(|e| Error::chunk(format!("Failed to read chunk payload: {}", e)))?;
        self.bytes_received += take as u64;

        ctx.append_chunk(&data)
    }

    /// Read the 1-3 byte basic header
    async fn read_basic_header<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<(u8, u32)> {
        let first = self.read_u8(reader).await?;
        let fmt = first >> 6;

        let cs_id = match first & 0x3F {
            0 => {
                // 2-byte form
                let id = self.read_u8(reader).await?;
                id as u32 + 64
            }
            1 => {
                // 3-byte form, little endian
                let lo = self.read_u8(reader).await?;
                let hi = self.read_u8(reader).await?;
                u16::from_le_bytes([lo, hi]) as u32 + 64
            }
            n => n as u32,
        };

        Ok((fmt, cs_id))
    }

    /// Type 0: absolute timestamp, length, type, stream id (11 bytes)
    async fn read_type0_header<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
        cs_id: u32,
    ) -> Result<(RtmpHeader, bool)> {
        let mut bytes = [0u8; 11];
        reader
            .read_exact(&mut bytes)
            .await
            .map_err(|e| Error::chunk(format!("Failed to read type 0 header: {}", e)))?;
        self.bytes_received += 11;

        let raw_timestamp = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        let length = u32::from_be_bytes([0, bytes[3], bytes[4], bytes[5]]);
        let message_type = bytes[6];
        let stream_id = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);

        let extended = raw_timestamp == EXTENDED_TIMESTAMP;
        let timestamp = if extended {
            self.read_u32(reader).await?
        } else {
            raw_timestamp
        };

        Ok((
            RtmpHeader::new(timestamp, length, message_type, stream_id, cs_id),
            extended,
        ))
    }

    /// Type 1: timestamp delta, length, type (7 bytes)
    async fn read_type1_header<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<(u32, u32, u8, bool)> {
        let mut bytes = [0u8; 7];
        reader
            .read_exact(&mut bytes)
            .await
            .map_err(|e| Error::chunk(format!("Failed to read type 1 header: {}", e)))?;
        self.bytes_received += 7;

        let raw_delta = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        let length = u32::from_be_bytes([0, bytes[3], bytes[4], bytes[5]]);
        let message_type = bytes[6];

        let extended = raw_delta == EXTENDED_TIMESTAMP;
        let delta = if extended {
            self.read_u32(reader).await?
        } else {
            raw_delta
        };

        Ok((delta, length, message_type, extended))
    }

    /// Type 2: timestamp delta only (3 bytes)
    async fn read_type2_header<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<(u32, bool)> {
        let mut bytes = [0u8; 3];
        reader
            .read_exact(&mut bytes)
            .await
            .map_err(|e| Error::chunk(format!("Failed to read type 2 header: {}", e)))?;
        self.bytes_received += 3;

        let raw_delta = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        if raw_delta == EXTENDED_TIMESTAMP {
            return Ok((self.read_u32(reader).await?, true));
        }
        Ok((raw_delta, false))
    }

    fn start_message(
        &mut self,
        cs_id: u32,
        header: RtmpHeader,
        delta: u32,
        extended: bool,
    ) -> Result<()> {
        if header.message_length as usize > MAX_MESSAGE_SIZE {
            return Err(Error::chunk(format!(
                "Declared message length {} exceeds cap",
                header.message_length
            )));
        }

        let last = LastHeader {
            timestamp: header.timestamp,
            delta,
            message_length: header.message_length,
            message_type: header.message_type,
            message_stream_id: header.message_stream_id,
            extended,
        };

        self.chunk_streams
            .entry(cs_id)
            .or_insert_with(ChunkStreamContext::new)
            .start_message(header, last)
    }

    async fn read_u8<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<u8> {
        let byte = reader
            .read_u8()
            .await
            .map_err(|e| Error::chunk(format!("Failed to read chunk header: {}", e)))?;
        self.bytes_received += 1;
        Ok(byte)
    }

    async fn read_u32<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<u32> {
        let mut bytes = [0u8; 4];
        reader
            .read_exact(&mut bytes)
            .await
            .map_err(|e| Error::chunk(format!("Failed to read extended timestamp: {}", e)))?;
        self.bytes_received += 4;
        Ok(u32::from_be_bytes(bytes))
    }
}

impl Default for ChunkReader {
    fn default() -> Self {
        ChunkReader::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::writer::ChunkWriter;
    use crate::protocol::{make_video_packet, MSG_TYPE_VIDEO};

    async fn read_all(reader: &mut ChunkReader, mut bytes: &[u8]) -> Vec<RtmpPacket> {
        let mut packets = Vec::new();
        while !bytes.is_empty() {
            if let Some(packet) = reader.read_message(&mut bytes).await.unwrap() {
                packets.push(packet);
            }
        }
        packets
    }

    #[tokio::test]
    async fn test_round_trip_across_chunk_sizes() {
        for chunk_size in [64usize, 128, 4096, 65536] {
            let payload: Vec<u8> = (0..10000).map(|i| (i % 251) as u8).collect();
            let message = make_video_packet(payload.clone(), 123456, 1);

            let mut writer = ChunkWriter::new();
            writer.set_chunk_size(chunk_size);
            let bytes = writer.encode_message(&message);

            let mut reader = ChunkReader::new();
            reader.set_chunk_size(chunk_size);
            let packets = read_all(&mut reader, &bytes).await;

            assert_eq!(packets.len(), 1, "chunk size {}", chunk_size);
            assert_eq!(packets[0].header, message.header);
            assert_eq!(packets[0].payload, payload);
        }
    }

    #[tokio::test]
    async fn test_interleaved_chunk_streams() {
        // Two messages interleaved chunk by chunk on distinct CSIDs,
        // chunk size 4: A(6 bytes, csid 3), B(5 bytes, csid 4)
        let mut bytes: Vec<u8> = Vec::new();

        // A, first chunk: fmt 0, csid 3
        bytes.extend_from_slice(&[0x03, 0, 0, 10, 0, 0, 6, MSG_TYPE_VIDEO, 1, 0, 0, 0]);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        // B, first chunk: fmt 0, csid 4
        bytes.extend_from_slice(&[0x04, 0, 0, 20, 0, 0, 5, MSG_TYPE_VIDEO, 1, 0, 0, 0]);
        bytes.extend_from_slice(&[9, 8, 7, 6]);
        // A, continuation: fmt 3, csid 3
        bytes.extend_from_slice(&[0xC3, 5, 6]);
        // B, continuation: fmt 3, csid 4
        bytes.extend_from_slice(&[0xC4, 5]);

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4);
        let packets = read_all(&mut reader, &bytes).await;

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].header.chunk_stream_id, 3);
        assert_eq!(packets[0].payload, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(packets[0].timestamp(), 10);
        assert_eq!(packets[1].header.chunk_stream_id, 4);
        assert_eq!(packets[1].payload, vec![9, 8, 7, 6, 5]);
        assert_eq!(packets[1].timestamp(), 20);
    }

    #[tokio::test]
    async fn test_delta_timestamps() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4096);

        let mut bytes = writer.encode_message(&make_video_packet(vec![1, 2, 3], 1000, 1));
        bytes.extend(writer.encode_message(&make_video_packet(vec![4, 5, 6], 1040, 1)));
        bytes.extend(writer.encode_message(&make_video_packet(vec![7, 8, 9], 1080, 1)));

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4096);
        let packets = read_all(&mut reader, &bytes).await;

        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].timestamp(), 1000);
        assert_eq!(packets[1].timestamp(), 1040);
        assert_eq!(packets[2].timestamp(), 1080);
    }

    #[tokio::test]
    async fn test_extended_timestamp_round_trip() {
        let timestamp = 0x0100_0000u32;
        let payload: Vec<u8> = (0..300).map(|i| (i % 256) as u8).collect();
        let message = make_video_packet(payload.clone(), timestamp, 1);

        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(128);
        let bytes = writer.encode_message(&message);

        // 3-byte field saturates and the real value follows
        assert_eq!(&bytes[1..4], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[12..16], &timestamp.to_be_bytes());

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(128);
        let packets = read_all(&mut reader, &bytes).await;

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].timestamp(), timestamp);
        assert_eq!(packets[0].payload, payload);
    }

    #[tokio::test]
    async fn test_continuation_without_base_is_fatal() {
        let bytes = [0xC3u8, 1, 2, 3];
        let mut reader = ChunkReader::new();
        let err = reader.read_message(&mut &bytes[..]).await.unwrap_err();
        assert!(matches!(err, Error::Chunk(_)));
    }

    #[tokio::test]
    async fn test_ack_per_window_boundary() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4096);
        let bytes = writer.encode_message(&make_video_packet(vec![0u8; 256], 0, 1));

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4096);
        reader.set_window(100);

        let mut input = &bytes[..];
        reader.read_message(&mut input).await.unwrap().unwrap();

        let mut acks = Vec::new();
        while let Some(seq) = reader.take_ack() {
            acks.push(seq);
        }

        // 268 bytes consumed, window 100: two boundaries crossed
        assert_eq!(acks.len(), 2);
        assert_eq!(acks[0], reader.bytes_received() as u32);
        assert!(reader.take_ack().is_none());
    }

    #[tokio::test]
    async fn test_abort_discards_partial_message() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend_from_slice(&[0x03, 0, 0, 0, 0, 0, 8, MSG_TYPE_VIDEO, 1, 0, 0, 0]);
        bytes.extend_from_slice(&[1, 2, 3, 4]);

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4);
        let mut input = &bytes[..];
        assert!(reader.read_message(&mut input).await.unwrap().is_none());

        reader.abort(3);

        // A fresh fmt 0 message on the same CSID decodes cleanly
        let mut more: Vec<u8> = Vec::new();
        more.extend_from_slice(&[0x03, 0, 0, 0, 0, 0, 2, MSG_TYPE_VIDEO, 1, 0, 0, 0]);
        more.extend_from_slice(&[7, 7]);
        let mut input = &more[..];
        let packet = reader.read_message(&mut input).await.unwrap().unwrap();
        assert_eq!(packet.payload, vec![7, 7]);
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        // Declared length of 0xFFFFFF is the u24 cap and allowed; craft a
        // header at the cap plus one via the reader's internal check instead
        let mut reader = ChunkReader::new();
        let header = RtmpHeader::new(0, MAX_MESSAGE_SIZE as u32 + 1, MSG_TYPE_VIDEO, 1, 3);
        assert!(reader.start_message(3, header, 0, false).is_err());
    }
}
