use crate::handshake::c0c1::HANDSHAKE_SIZE;
use crate::utils::{calculate_hmac_sha256, generate_random_bytes, signatures_match};
use crate::{Error, Result};

// Digest constants from the Flash handshake scheme
const GENUINE_FMS: &[u8] = b"Genuine Adobe Flash Media Server 001";
const GENUINE_FP: &[u8] = b"Genuine Adobe Flash Player 001";

const HANDSHAKE_CRUD: [u8; 32] = [
    0xf0, 0xee, 0xc2, 0x4a, 0x80, 0x68, 0xbe, 0xe8, 0x2e, 0x00, 0xd0, 0xd1, 0x02, 0x9e, 0x7e,
    0x57, 0x6e, 0xec, 0x5d, 0x2d, 0x29, 0x80, 0x6f, 0xab, 0x93, 0xb8, 0xe6, 0x36, 0xcf, 0xeb,
    0x31, 0xae,
];

const DIGEST_LENGTH: usize = 32;

/// Digest layout chosen by the client inside its C1 block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestFormat {
    /// Digest block located via bytes 8..12
    Scheme1,
    /// Digest block located via bytes 772..776
    Scheme2,
}

/// Result of inspecting a client C1 block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientHandshakeKind {
    /// No verifiable digest; answer with the plain echo handshake
    Plain,
    /// Verified digest at the given layout
    Digest(DigestFormat),
}

fn scheme1_offset(block: &[u8]) -> usize {
    let b = &block[8..12];
    ((b[0] as usize + b[1] as usize + b[2] as usize + b[3] as usize) % 728) + 12
}

fn scheme2_offset(block: &[u8]) -> usize {
    let b = &block[772..776];
    ((b[0] as usize + b[1] as usize + b[2] as usize + b[3] as usize) % 728) + 776
}

/// The block with the digest bytes cut out, the message the digest signs
fn message_without_digest(block: &[u8], offset: usize) -> Vec<u8> {
    let mut msg = Vec::with_capacity(HANDSHAKE_SIZE - DIGEST_LENGTH);
    msg.extend_from_slice(&block[..offset]);
    msg.extend_from_slice(&block[offset + DIGEST_LENGTH..]);
    msg
}

fn verify_digest_at(block: &[u8], offset: usize, key: &[u8]) -> bool {
    if offset + DIGEST_LENGTH > block.len() {
        return false;
    }

    let message = message_without_digest(block, offset);
    let computed = calculate_hmac_sha256(key, &message);
    signatures_match(&computed, &block[offset..offset + DIGEST_LENGTH])
}

/// Inspect a C1 block and classify the handshake the client chose.
///
/// Scheme 2 is probed before scheme 1, matching the order modern encoders
/// pick layouts in; a block verifying under neither is treated as plain.
pub fn detect_client_handshake(c1: &[u8]) -> Result<ClientHandshakeKind> {
    if c1.len() != HANDSHAKE_SIZE {
        return Err(Error::handshake(format!(
            "C1 block has wrong size: {}",
            c1.len()
        )));
    }

    if verify_digest_at(c1, scheme2_offset(c1), GENUINE_FP) {
        return Ok(ClientHandshakeKind::Digest(DigestFormat::Scheme2));
    }

    if verify_digest_at(c1, scheme1_offset(c1), GENUINE_FP) {
        return Ok(ClientHandshakeKind::Digest(DigestFormat::Scheme1));
    }

    Ok(ClientHandshakeKind::Plain)
}

/// Build a digest-signed S1 block for the given layout
pub fn make_digest_s1(format: DigestFormat) -> Vec<u8> {
    let mut block = Vec::with_capacity(HANDSHAKE_SIZE);
    block.extend_from_slice(&[0, 0, 0, 0]);
    // Server version field, any non-zero value marks digest support
    block.extend_from_slice(&[1, 2, 3, 4]);
    block.extend_from_slice(&generate_random_bytes(HANDSHAKE_SIZE - 8));

    let offset = match format {
        DigestFormat::Scheme1 => scheme1_offset(&block),
        DigestFormat::Scheme2 => scheme2_offset(&block),
    };

    let message = message_without_digest(&block, offset);
    let digest = calculate_hmac_sha256(GENUINE_FMS, &message);
    block[offset..offset + DIGEST_LENGTH].copy_from_slice(&digest);

    block
}

/// Build a digest-signed S2 block answering the client digest in `c1`
pub fn make_digest_s2(format: DigestFormat, c1: &[u8]) -> Result<Vec<u8>> {
    if c1.len() != HANDSHAKE_SIZE {
        return Err(Error::handshake(format!(
            "C1 block has wrong size: {}",
            c1.len()
        )));
    }

    let offset = match format {
        DigestFormat::Scheme1 => scheme1_offset(c1),
        DigestFormat::Scheme2 => scheme2_offset(c1),
    };
    let client_digest = &c1[offset..offset + DIGEST_LENGTH];

    let mut signing_key = Vec::with_capacity(GENUINE_FMS.len() + HANDSHAKE_CRUD.len());
    signing_key.extend_from_slice(GENUINE_FMS);
    signing_key.extend_from_slice(&HANDSHAKE_CRUD);

    let challenge = calculate_hmac_sha256(&signing_key, client_digest);

    let mut block = generate_random_bytes(HANDSHAKE_SIZE - DIGEST_LENGTH);
    let signature = calculate_hmac_sha256(&challenge, &block);
    block.extend_from_slice(&signature);

    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a C1 block signed the way a digest-capable client would
    fn make_client_c1(format: DigestFormat) -> Vec<u8> {
        let mut block = Vec::with_capacity(HANDSHAKE_SIZE);
        block.extend_from_slice(&[0, 0, 0, 0]);
        block.extend_from_slice(&[9, 0, 124, 2]);
        block.extend_from_slice(&generate_random_bytes(HANDSHAKE_SIZE - 8));

        let offset = match format {
            DigestFormat::Scheme1 => scheme1_offset(&block),
            DigestFormat::Scheme2 => scheme2_offset(&block),
        };
        let message = message_without_digest(&block, offset);
        let digest = calculate_hmac_sha256(GENUINE_FP, &message);
        block[offset..offset + DIGEST_LENGTH].copy_from_slice(&digest);

        block
    }

    #[test]
    fn test_plain_client_detected() {
        let c1 = generate_random_bytes(HANDSHAKE_SIZE);
        assert_eq!(
            detect_client_handshake(&c1).unwrap(),
            ClientHandshakeKind::Plain
        );
    }

    #[test]
    fn test_digest_client_detected() {
        for format in [DigestFormat::Scheme1, DigestFormat::Scheme2] {
            let c1 = make_client_c1(format);
            assert_eq!(
                detect_client_handshake(&c1).unwrap(),
                ClientHandshakeKind::Digest(format)
            );
        }
    }

    #[test]
    fn test_s1_self_verifies() {
        for format in [DigestFormat::Scheme1, DigestFormat::Scheme2] {
            let s1 = make_digest_s1(format);
            assert_eq!(s1.len(), HANDSHAKE_SIZE);

            let offset = match format {
                DigestFormat::Scheme1 => scheme1_offset(&s1),
                DigestFormat::Scheme2 => scheme2_offset(&s1),
            };
            assert!(verify_digest_at(&s1, offset, GENUINE_FMS));
        }
    }

    #[test]
    fn test_s2_signature_matches_client_digest() {
        let c1 = make_client_c1(DigestFormat::Scheme1);
        let s2 = make_digest_s2(DigestFormat::Scheme1, &c1).unwrap();
        assert_eq!(s2.len(), HANDSHAKE_SIZE);

        // Recompute the signature the way the client validates it
        let offset = scheme1_offset(&c1);
        let mut key = GENUINE_FMS.to_vec();
        key.extend_from_slice(&HANDSHAKE_CRUD);
        let challenge = calculate_hmac_sha256(&key, &c1[offset..offset + DIGEST_LENGTH]);
        let expected =
            calculate_hmac_sha256(&challenge, &s2[..HANDSHAKE_SIZE - DIGEST_LENGTH]);
        assert_eq!(&s2[HANDSHAKE_SIZE - DIGEST_LENGTH..], &expected);
    }

    #[test]
    fn test_wrong_size_rejected() {
        assert!(detect_client_handshake(&[0u8; 100]).is_err());
        assert!(make_digest_s2(DigestFormat::Scheme1, &[0u8; 100]).is_err());
    }
}
