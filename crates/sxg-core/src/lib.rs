#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

//! # sxg-core
//!
//! Wire primitives for signed HTTP exchanges.
//!
//! This crate provides:
//! - Merkle Integrity Content Encoding (`mi-sha256-03`) with `Digest` roots
//! - `application/signed-exchange;v=b2` envelope encoding and parsing
//! - ECDSA P-256 exchange signing (deterministic, RFC 6979)
//! - Certificate-chain utilities (`application/cert-chain+cbor`, cert
//!   fingerprints and URL tokens)
//!
//! ## Quick Start
//!
//! ```rust
//! use sxg_core::mice;
//!
//! // Integrity-encode a payload; small bodies just gain an 8-byte prefix.
//! let encoding = mice::encode(b"<html amp></html>", 16384).unwrap();
//! assert_eq!(&encoding.body[..8], &16384u64.to_be_bytes());
//! assert!(encoding.digest_header_value().starts_with("mi-sha256-03="));
//! ```

pub mod certs;
pub mod error;
pub mod exchange;
pub mod mice;

pub use error::{Error, Result};
pub use exchange::{Exchange, ParsedExchange, SignatureParams};
pub use mice::MiceEncoding;
