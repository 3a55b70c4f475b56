//! Hashing utilities for document identity.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Deterministic `urn:uuid:` serial number derived from `seed`.
///
/// The first 16 bytes of the seed's SHA256 are laid out as a version 5
/// style UUID, so regenerating a document yields the same serial.
pub fn serial_number(seed: &str) -> String {
    let mut bytes = sha256_bytes(seed.as_bytes());
    bytes.truncate(16);
    bytes[6] = (bytes[6] & 0x0f) | 0x50;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex = hex::encode(&bytes);
    format!(
        "urn:uuid:{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Re-encode a base64 digest (as NuGet stores package hashes) as lowercase hex.
pub fn base64_to_hex(value: &str) -> Option<String> {
    STANDARD.decode(value.trim()).ok().map(hex::encode)
}
