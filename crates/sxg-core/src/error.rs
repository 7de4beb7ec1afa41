//! Error types for sxg-core operations

use thiserror::Error;

/// Errors that can occur while building or parsing signed exchanges
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Certificate chain is empty")]
    EmptyCertChain,

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Invalid record size: {0}")]
    InvalidRecordSize(u64),

    #[error("{field} too long for wire format: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("CBOR encoding error: {0}")]
    Cbor(String),

    #[error("Malformed exchange: {0}")]
    MalformedExchange(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Result type for sxg-core operations
pub type Result<T> = std::result::Result<T, Error>;
