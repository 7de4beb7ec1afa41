//! Certificate-chain handling for signed exchanges.
//!
//! Loads PEM certificate chains and P-256 signing keys, derives the
//! SHA-256 certificate fingerprint used in signature parameters and
//! cert URLs, and serializes chains as `application/cert-chain+cbor`.

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine;
use p256::ecdsa::SigningKey;
use p256::pkcs8::DecodePrivateKey;
use rustls_pki_types::{pem::PemObject, CertificateDer};
use sha2::{Digest as Sha2Digest, Sha256};
use std::path::Path;

use crate::error::{Error, Result};

/// Media type of an encoded certificate chain.
pub const CERT_CHAIN_CONTENT_TYPE: &str = "application/cert-chain+cbor";

/// Magic first element of the cert-chain CBOR array.
const CERT_CHAIN_MAGIC: &str = "📜⛓";

/// Load a certificate chain from a PEM file, leaf first.
pub fn load_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(path)
        .map_err(|e| Error::InvalidCertificate(format!("{}: {e}", path.display())))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidCertificate(format!("{}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(Error::EmptyCertChain);
    }
    Ok(certs)
}

/// Load a P-256 signing key from a PEM file (PKCS#8 or SEC1).
pub fn load_signing_key(path: &Path) -> Result<SigningKey> {
    let pem = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidPrivateKey(format!("{}: {e}", path.display())))?;
    signing_key_from_pem(&pem)
}

/// Parse a P-256 signing key from PEM text (PKCS#8 or SEC1).
pub fn signing_key_from_pem(pem: &str) -> Result<SigningKey> {
    if let Ok(key) = SigningKey::from_pkcs8_pem(pem) {
        return Ok(key);
    }
    let secret = p256::SecretKey::from_sec1_pem(pem)
        .map_err(|e| Error::InvalidPrivateKey(e.to_string()))?;
    Ok(SigningKey::from(secret))
}

/// SHA-256 fingerprint of a DER certificate.
pub fn cert_sha256(cert: &CertificateDer<'_>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(cert.as_ref());
    hasher.finalize().into()
}

/// The URL path token for a certificate: base64url without padding.
pub fn cert_url_token(sha: &[u8; 32]) -> String {
    BASE64_URL.encode(sha)
}

/// The `cert-sha256` signature parameter value: conventional base64.
pub fn cert_sha256_base64(sha: &[u8; 32]) -> String {
    BASE64.encode(sha)
}

/// Serialize a chain as `application/cert-chain+cbor`: an array of the
/// magic string followed by one map per certificate. An OCSP staple, when
/// present, is attached to the leaf.
pub fn encode_cert_chain(
    certs: &[CertificateDer<'_>],
    ocsp: Option<&[u8]>,
) -> Result<Vec<u8>> {
    use ciborium::Value;

    if certs.is_empty() {
        return Err(Error::EmptyCertChain);
    }

    let mut items = Vec::with_capacity(certs.len() + 1);
    items.push(Value::Text(CERT_CHAIN_MAGIC.to_string()));
    for (i, cert) in certs.iter().enumerate() {
        let mut entry = vec![(
            Value::Text("cert".to_string()),
            Value::Bytes(cert.as_ref().to_vec()),
        )];
        if i == 0 {
            if let Some(staple) = ocsp {
                entry.push((
                    Value::Text("ocsp".to_string()),
                    Value::Bytes(staple.to_vec()),
                ));
            }
        }
        items.push(Value::Map(entry));
    }

    let mut out = Vec::new();
    ciborium::into_writer(&Value::Array(items), &mut out)
        .map_err(|e| Error::Cbor(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_cert(bytes: &[u8]) -> CertificateDer<'static> {
        CertificateDer::from(bytes.to_vec())
    }

    #[test]
    fn token_is_43_chars_unpadded() {
        let sha = cert_sha256(&fake_cert(b"cert-bytes"));
        let token = cert_url_token(&sha);
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn sha_base64_is_padded_standard() {
        let sha = cert_sha256(&fake_cert(b"cert-bytes"));
        let b64 = cert_sha256_base64(&sha);
        assert_eq!(b64.len(), 44);
        assert!(b64.ends_with('='));
    }

    #[test]
    fn token_and_base64_agree_on_bytes() {
        let sha = cert_sha256(&fake_cert(b"abc"));
        let from_token = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(cert_url_token(&sha))
            .unwrap();
        let from_b64 = base64::engine::general_purpose::STANDARD
            .decode(cert_sha256_base64(&sha))
            .unwrap();
        assert_eq!(from_token, from_b64);
    }

    #[test]
    fn chain_roundtrips_through_cbor() {
        let certs = vec![fake_cert(b"leaf"), fake_cert(b"issuer")];
        let encoded = encode_cert_chain(&certs, Some(b"staple")).unwrap();

        let value: ciborium::Value = ciborium::from_reader(encoded.as_slice()).unwrap();
        let items = match value {
            ciborium::Value::Array(items) => items,
            other => panic!("expected array, got {other:?}"),
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], ciborium::Value::Text(CERT_CHAIN_MAGIC.to_string()));

        let leaf = match &items[1] {
            ciborium::Value::Map(entries) => entries,
            other => panic!("expected map, got {other:?}"),
        };
        assert!(leaf
            .iter()
            .any(|(k, v)| k == &ciborium::Value::Text("cert".into())
                && v == &ciborium::Value::Bytes(b"leaf".to_vec())));
        assert!(leaf
            .iter()
            .any(|(k, _)| k == &ciborium::Value::Text("ocsp".into())));

        let issuer = match &items[2] {
            ciborium::Value::Map(entries) => entries,
            other => panic!("expected map, got {other:?}"),
        };
        assert!(issuer
            .iter()
            .all(|(k, _)| k != &ciborium::Value::Text("ocsp".into())));
    }

    #[test]
    fn empty_chain_rejected() {
        assert!(encode_cert_chain(&[], None).is_err());
        assert!(matches!(
            load_cert_chain(Path::new("/nonexistent.pem")),
            Err(Error::InvalidCertificate(_))
        ));
    }
}
