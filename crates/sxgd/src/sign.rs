//! Exchange signing: binds the rewritten response to the certificate.

use chrono::{DateTime, Duration, Utc};
use p256::ecdsa::SigningKey;
use rustls_pki_types::CertificateDer;
use std::path::Path;
use url::Url;

use sxg_core::certs;
use sxg_core::exchange::{sign_and_encode, Exchange, SignatureParams};

/// How far back the signature window opens. Consumers reject exchanges
/// dated in the future, so signing backdates against clock skew.
const DATE_BACKDATE: i64 = 24; // hours

/// Signature lifetime from now.
const EXPIRES_AHEAD: i64 = 6; // days

/// Process-global signing material; read-only after startup.
pub struct ExchangeSigner {
    key: SigningKey,
    certs: Vec<CertificateDer<'static>>,
    cert_sha256: [u8; 32],
    ocsp: Option<Vec<u8>>,
}

impl ExchangeSigner {
    pub fn new(
        certs: Vec<CertificateDer<'static>>,
        key: SigningKey,
        ocsp: Option<Vec<u8>>,
    ) -> sxg_core::Result<Self> {
        let leaf = certs.first().ok_or(sxg_core::Error::EmptyCertChain)?;
        let cert_sha256 = certs::cert_sha256(leaf);
        Ok(Self {
            key,
            certs,
            cert_sha256,
            ocsp,
        })
    }

    pub fn from_files(
        cert_path: &Path,
        key_path: &Path,
        ocsp_path: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let certs = certs::load_cert_chain(cert_path)?;
        let key = certs::load_signing_key(key_path)?;
        let ocsp = ocsp_path.map(std::fs::read).transpose()?;
        Ok(Self::new(certs, key, ocsp)?)
    }

    /// The base64url token naming this chain in cert URLs.
    pub fn cert_url_token(&self) -> String {
        certs::cert_url_token(&self.cert_sha256)
    }

    /// The chain as `application/cert-chain+cbor`.
    pub fn cert_chain_cbor(&self) -> sxg_core::Result<Vec<u8>> {
        certs::encode_cert_chain(&self.certs, self.ocsp.as_deref())
    }

    /// Sign a rewritten 200 response for `sign_url`, valid from
    /// `now - 24h` to `now + 6d`.
    pub fn sign(
        &self,
        sign_url: &Url,
        response_headers: Vec<(String, String)>,
        payload: Vec<u8>,
        now: DateTime<Utc>,
    ) -> sxg_core::Result<Vec<u8>> {
        let origin = sign_url.origin().ascii_serialization();
        let params = SignatureParams {
            cert_sha256: self.cert_sha256,
            cert_url: format!("{origin}/amppkg/cert/{}", self.cert_url_token()),
            validity_url: format!("{origin}/amppkg/validity"),
            date: (now - Duration::hours(DATE_BACKDATE)).timestamp(),
            expires: (now + Duration::days(EXPIRES_AHEAD)).timestamp(),
        };
        let exchange = Exchange {
            request_uri: sign_url.to_string(),
            response_status: 200,
            response_headers,
            payload,
        };
        sign_and_encode(&self.key, &exchange, &params)
    }
}
