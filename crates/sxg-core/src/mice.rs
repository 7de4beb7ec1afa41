//! Merkle Integrity Content Encoding (`mi-sha256-03`).
//!
//! Frames a payload into fixed-size records with an interleaved SHA-256
//! proof chain:
//! - `proof(n-1) = SHA256(record[n-1] || 0x00)`
//! - `proof(i)   = SHA256(record[i] || proof(i+1) || 0x01)`
//!
//! The encoded stream is the 8-byte big-endian record size, the first
//! record, and then each subsequent record preceded by the proof covering
//! it and everything after it. `proof(0)` is the integrity root carried in
//! the `Digest` header; it never appears in the stream itself.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest as Sha2Digest, Sha256};

use crate::error::{Error, Result};

/// Value of the `Content-Encoding` header for MICE-encoded payloads.
pub const CONTENT_ENCODING: &str = "mi-sha256-03";

/// A MICE-encoded payload plus its integrity root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiceEncoding {
    /// The encoded stream: `be64(record_size)` followed by the interleaved
    /// records and proofs.
    pub body: Vec<u8>,
    /// `proof(0)`, the root of the proof chain.
    pub root: [u8; 32],
}

impl MiceEncoding {
    /// Format the `Digest` header value for this encoding.
    pub fn digest_header_value(&self) -> String {
        format!("{}={}", CONTENT_ENCODING, BASE64.encode(self.root))
    }
}

fn final_proof(record: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record);
    hasher.update([0x00]);
    hasher.finalize().into()
}

fn chained_proof(record: &[u8], next: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record);
    hasher.update(next);
    hasher.update([0x01]);
    hasher.finalize().into()
}

/// Encode `payload` with the given record size.
///
/// For payloads no longer than one record the stream is simply the 8-byte
/// record-size prefix followed by the payload. An empty payload encodes as
/// a single empty record: the bare prefix, with root `SHA256(0x00)`.
///
/// # Examples
///
/// ```rust
/// let encoding = sxg_core::mice::encode(b"hi", 16384).unwrap();
/// assert_eq!(&encoding.body[..8], &16384u64.to_be_bytes());
/// assert_eq!(&encoding.body[8..], b"hi");
/// ```
pub fn encode(payload: &[u8], record_size: u64) -> Result<MiceEncoding> {
    if record_size == 0 {
        return Err(Error::InvalidRecordSize(record_size));
    }

    // A zero-length payload still has one (empty) record.
    let records: Vec<&[u8]> = if payload.is_empty() {
        vec![&[]]
    } else {
        payload.chunks(record_size as usize).collect()
    };

    let mut proofs = vec![[0u8; 32]; records.len()];
    let last = records.len() - 1;
    proofs[last] = final_proof(records[last]);
    for i in (0..last).rev() {
        proofs[i] = chained_proof(records[i], &proofs[i + 1]);
    }

    let mut body =
        Vec::with_capacity(8 + payload.len() + 32 * (records.len().saturating_sub(1)));
    body.extend_from_slice(&record_size.to_be_bytes());
    body.extend_from_slice(records[0]);
    for i in 1..records.len() {
        body.extend_from_slice(&proofs[i]);
        body.extend_from_slice(records[i]);
    }

    Ok(MiceEncoding {
        body,
        root: proofs[0],
    })
}
