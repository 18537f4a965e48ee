use crate::handshake::c0c1::{C0C1, HANDSHAKE_SIZE, RTMP_VERSION};
use crate::handshake::digest::{
    detect_client_handshake, make_digest_s1, make_digest_s2, ClientHandshakeKind,
};
use crate::utils::{current_timestamp, generate_random_bytes};
use crate::{ByteBuffer, Error, Result};

/// Server handshake (S0 + S1 + S2)
#[derive(Debug, Clone)]
pub struct S0S1S2 {
    /// RTMP version (S0)
    pub version: u8,

    /// S1 block
    pub s1: Vec<u8>,

    /// S2 block
    pub s2: Vec<u8>,
}

impl S0S1S2 {
    /// Generate the response for a parsed C0+C1.
    ///
    /// A digest-signed response is produced when the client sent a digest
    /// handshake; otherwise S1 is a fresh random block and S2 echoes C1.
    pub fn answer(c0c1: &C0C1) -> Result<Self> {
        let c1 = c0c1.c1_block();

        let (s1, s2) = match detect_client_handshake(&c1)? {
            ClientHandshakeKind::Plain => {
                let mut s1 = Vec::with_capacity(HANDSHAKE_SIZE);
                s1.extend_from_slice(&current_timestamp().to_be_bytes());
                s1.extend_from_slice(&[0, 0, 0, 0]);
                s1.extend_from_slice(&generate_random_bytes(HANDSHAKE_SIZE - 8));
                (s1, c1)
            }
            ClientHandshakeKind::Digest(format) => {
                (make_digest_s1(format), make_digest_s2(format, &c1)?)
            }
        };

        Ok(S0S1S2 {
            version: RTMP_VERSION,
            s1,
            s2,
        })
    }

    /// Encode to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(1 + HANDSHAKE_SIZE * 2);
        result.push(self.version);
        result.extend_from_slice(&self.s1);
        result.extend_from_slice(&self.s2);
        result
    }

    /// Parse S0+S1+S2 from bytes (client side)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 1 + HANDSHAKE_SIZE * 2 {
            return Err(Error::handshake(format!(
                "S0+S1+S2 too short: {} bytes",
                data.len()
            )));
        }

        let version = data[0];
        if version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported server version: {}",
                version
            )));
        }

        Ok(S0S1S2 {
            version,
            s1: data[1..1 + HANDSHAKE_SIZE].to_vec(),
            s2: data[1 + HANDSHAKE_SIZE..1 + 2 * HANDSHAKE_SIZE].to_vec(),
        })
    }
}

/// C2 block completing the handshake
#[derive(Debug, Clone)]
pub struct C2 {
    pub timestamp: u32,
    pub timestamp2: u32,
    pub random_echo: Vec<u8>,
}

impl C2 {
    /// Create C2 echoing the server S1 block
    pub fn create_from_s1(s1: &[u8]) -> Result<Self> {
        if s1.len() != HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "S1 block has wrong size: {}",
                s1.len()
            )));
        }

        let mut buffer = ByteBuffer::new(s1.to_vec());
        let timestamp = buffer.read_u32_be()?;
        buffer.read_u32_be()?;

        Ok(C2 {
            timestamp,
            timestamp2: current_timestamp(),
            random_echo: s1[8..].to_vec(),
        })
    }

    /// Parse C2 from bytes.
    ///
    /// The echo is not compared against S1: a digest client legitimately
    /// sends a signature here instead of a byte-for-byte copy.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HANDSHAKE_SIZE {
            return Err(Error::handshake(format!("C2 too short: {} bytes", data.len())));
        }

        let mut buffer = ByteBuffer::new(data.to_vec());
        let timestamp = buffer.read_u32_be()?;
        let timestamp2 = buffer.read_u32_be()?;
        let random_echo = buffer.read_bytes(HANDSHAKE_SIZE - 8)?;

        Ok(C2 {
            timestamp,
            timestamp2,
            random_echo,
        })
    }

    /// Encode to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut block = Vec::with_capacity(HANDSHAKE_SIZE);
        block.extend_from_slice(&self.timestamp.to_be_bytes());
        block.extend_from_slice(&self.timestamp2.to_be_bytes());
        block.extend_from_slice(&self.random_echo);
        block
    }
}
