use crate::utils::{current_timestamp, generate_random_bytes};
use crate::{ByteBuffer, Error, Result};

/// RTMP version
pub const RTMP_VERSION: u8 = 3;

/// Handshake block size (C1/S1/C2/S2)
pub const HANDSHAKE_SIZE: usize = 1536;

/// Client handshake (C0 + C1)
#[derive(Debug, Clone)]
pub struct C0C1 {
    /// RTMP version (C0)
    pub version: u8,

    /// Timestamp (C1)
    pub timestamp: u32,

    /// Zero field (C1)
    pub zero: u32,

    /// Random data (C1)
    pub random_data: Vec<u8>,
}

impl C0C1 {
    /// Parse C0+C1 from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 1 + HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "C0+C1 too short: {} bytes, expected {}",
                data.len(),
                1 + HANDSHAKE_SIZE
            )));
        }

        let version = data[0];
        if version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported RTMP version: {}, expected {}",
                version, RTMP_VERSION
            )));
        }

        let mut buffer = ByteBuffer::new(data[1..1 + HANDSHAKE_SIZE].to_vec());
        let timestamp = buffer.read_u32_be()?;
        let zero = buffer.read_u32_be()?;
        let random_data = buffer.read_bytes(HANDSHAKE_SIZE - 8)?;

        Ok(C0C1 {
            version,
            timestamp,
            zero,
            random_data,
        })
    }

    /// Create C0+C1 for a client
    pub fn create_client() -> Self {
        C0C1 {
            version: RTMP_VERSION,
            timestamp: current_timestamp(),
            zero: 0,
            random_data: generate_random_bytes(HANDSHAKE_SIZE - 8),
        }
    }

    /// The raw 1536-byte C1 block, as needed for digest verification and echo
    pub fn c1_block(&self) -> Vec<u8> {
        let mut block = Vec::with_capacity(HANDSHAKE_SIZE);
        block.extend_from_slice(&self.timestamp.to_be_bytes());
        block.extend_from_slice(&self.zero.to_be_bytes());
        block.extend_from_slice(&self.random_data);
        block
    }

    /// Encode to bytes (C0 followed by C1)
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(1 + HANDSHAKE_SIZE);
        result.push(self.version);
        result.extend_from_slice(&self.c1_block());
        result
    }
}
