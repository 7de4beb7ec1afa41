//! `application/signed-exchange;v=b2` envelope encoding and parsing.
//!
//! Wire layout:
//!
//! ```text
//! "sxg1-b2\0" | be16 urlLen | fallbackUrl | be24 sigLen | be24 headerLen
//!            | signature header value | signed-headers CBOR | payload
//! ```
//!
//! The signed-headers CBOR is a two-element array of canonically-ordered
//! maps: the request headers (exactly `{":method": "GET"}`) and the
//! response headers including `":status"`. Map keys are sorted by length
//! first, then bytewise.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ciborium::Value;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};

use crate::certs::cert_sha256_base64;
use crate::error::{Error, Result};

/// Media type of a serialized exchange.
pub const SXG_CONTENT_TYPE: &str = "application/signed-exchange;v=b2";

/// The `integrity` signature parameter for MICE payloads.
pub const INTEGRITY: &str = "digest/mi-sha256-03";

const MAGIC: &[u8; 8] = b"sxg1-b2\0";
const CONTEXT: &[u8] = b"HTTP Exchange 1 b2";
const SIGNATURE_LABEL: &str = "sig";

/// An exchange ready for signing: GET of `request_uri` answered with
/// `response_status` / `response_headers` / `payload`.
#[derive(Clone, Debug)]
pub struct Exchange {
    pub request_uri: String,
    pub response_status: u16,
    /// Header names are lowercased during encoding; values pass through.
    pub response_headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

/// Signature parameters bound into the signed message and the signature
/// header. `date` and `expires` are unix seconds.
#[derive(Clone, Debug)]
pub struct SignatureParams {
    pub cert_sha256: [u8; 32],
    pub cert_url: String,
    pub validity_url: String,
    pub date: i64,
    pub expires: i64,
}

fn canonical_map(mut entries: Vec<(Vec<u8>, Vec<u8>)>) -> Value {
    entries.sort_by(|a, b| (a.0.len(), &a.0).cmp(&(b.0.len(), &b.0)));
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Bytes(k), Value::Bytes(v)))
            .collect(),
    )
}

/// Canonical CBOR of `[requestHeaders, responseHeaders]`.
pub fn encode_signed_headers(exchange: &Exchange) -> Result<Vec<u8>> {
    let request = canonical_map(vec![(b":method".to_vec(), b"GET".to_vec())]);

    let mut entries: Vec<(Vec<u8>, Vec<u8>)> = vec![(
        b":status".to_vec(),
        exchange.response_status.to_string().into_bytes(),
    )];
    for (name, value) in &exchange.response_headers {
        entries.push((name.to_ascii_lowercase().into_bytes(), value.clone().into_bytes()));
    }
    let response = canonical_map(entries);

    let mut out = Vec::new();
    ciborium::into_writer(&Value::Array(vec![request, response]), &mut out)
        .map_err(|e| Error::Cbor(e.to_string()))?;
    Ok(out)
}

fn push_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// The byte string the ECDSA signature covers. The 64 leading 0x20 bytes
/// match the TLS 1.3 signature format so a key shared with a TLS server
/// cannot be abused across protocols.
pub fn serialize_signed_message(
    params: &SignatureParams,
    fallback_url: &str,
    headers_cbor: &[u8],
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(160 + fallback_url.len() + headers_cbor.len());
    msg.extend_from_slice(&[0x20; 64]);
    msg.extend_from_slice(CONTEXT);
    msg.push(0x00);
    msg.push(32);
    msg.extend_from_slice(&params.cert_sha256);
    push_length_prefixed(&mut msg, params.validity_url.as_bytes());
    msg.extend_from_slice(&(params.date as u64).to_be_bytes());
    msg.extend_from_slice(&(params.expires as u64).to_be_bytes());
    push_length_prefixed(&mut msg, fallback_url.as_bytes());
    push_length_prefixed(&mut msg, headers_cbor);
    msg
}

/// Format the structured signature header. Byte sequences are delimited
/// with `*`; `cert-sha256` uses the conventional base64 alphabet.
pub fn signature_header_value(params: &SignatureParams, sig_der: &[u8]) -> String {
    format!(
        "{label};sig=*{sig}*;integrity=\"{integrity}\";cert-url=\"{cert_url}\";\
cert-sha256=*{cert_sha256}*;validity-url=\"{validity_url}\";date={date};expires={expires}",
        label = SIGNATURE_LABEL,
        sig = BASE64.encode(sig_der),
        integrity = INTEGRITY,
        cert_url = params.cert_url,
        cert_sha256 = cert_sha256_base64(&params.cert_sha256),
        validity_url = params.validity_url,
        date = params.date,
        expires = params.expires,
    )
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(Error::FieldTooLong { field, len, max });
    }
    Ok(())
}

/// Sign `exchange` and serialize the complete `v=b2` envelope.
///
/// ECDSA P-256 here is deterministic (RFC 6979), so identical inputs and
/// dates yield byte-identical envelopes.
pub fn sign_and_encode(
    key: &SigningKey,
    exchange: &Exchange,
    params: &SignatureParams,
) -> Result<Vec<u8>> {
    let headers_cbor = encode_signed_headers(exchange)?;
    let message = serialize_signed_message(params, &exchange.request_uri, &headers_cbor);
    let signature: Signature = key.sign(&message);
    let sig_header = signature_header_value(params, signature.to_der().as_bytes());

    let url = exchange.request_uri.as_bytes();
    check_len("fallback url", url.len(), 0xFFFF)?;
    check_len("signature", sig_header.len(), 0xFF_FFFF)?;
    check_len("signed headers", headers_cbor.len(), 0xFF_FFFF)?;

    let mut out = Vec::with_capacity(
        MAGIC.len() + 8 + url.len() + sig_header.len() + headers_cbor.len()
            + exchange.payload.len(),
    );
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(url.len() as u16).to_be_bytes());
    out.extend_from_slice(url);
    out.extend_from_slice(&(sig_header.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(&(headers_cbor.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(sig_header.as_bytes());
    out.extend_from_slice(&headers_cbor);
    out.extend_from_slice(&exchange.payload);
    Ok(out)
}

/// A decoded envelope, as a consumer (or test) sees it.
#[derive(Clone, Debug)]
pub struct ParsedExchange {
    pub fallback_url: String,
    pub signature_header: String,
    pub request_headers: Vec<(String, String)>,
    pub response_status: u16,
    pub response_headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl ParsedExchange {
    /// Look up a response header by (lowercase) name.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn take<'a>(buf: &mut &'a [u8], n: usize, what: &'static str) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(Error::MalformedExchange(format!("truncated {what}")));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

fn decode_header_map(value: &Value, what: &'static str) -> Result<Vec<(String, String)>> {
    let entries = value
        .as_map()
        .ok_or_else(|| Error::MalformedExchange(format!("{what} is not a map")))?;
    let mut out = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let (k, v) = match (k.as_bytes(), v.as_bytes()) {
            (Some(k), Some(v)) => (k, v),
            _ => {
                return Err(Error::MalformedExchange(format!(
                    "{what} entry is not a byte-string pair"
                )))
            }
        };
        let name = String::from_utf8(k.clone())
            .map_err(|_| Error::MalformedExchange(format!("{what} name is not UTF-8")))?;
        let value = String::from_utf8(v.clone())
            .map_err(|_| Error::MalformedExchange(format!("{what} value is not UTF-8")))?;
        out.push((name, value));
    }
    Ok(out)
}

/// Decode a `v=b2` envelope produced by [`sign_and_encode`]. Does not
/// verify the signature; callers verify against the certificate chain.
pub fn parse(bytes: &[u8]) -> Result<ParsedExchange> {
    let mut rest = bytes;
    let magic = take(&mut rest, MAGIC.len(), "magic")?;
    if magic != MAGIC {
        return Err(Error::MalformedExchange("bad magic".to_string()));
    }

    let url_len = {
        let b = take(&mut rest, 2, "url length")?;
        u16::from_be_bytes([b[0], b[1]])
    };
    let url = take(&mut rest, url_len as usize, "fallback url")?;
    let fallback_url = String::from_utf8(url.to_vec())
        .map_err(|_| Error::MalformedExchange("fallback url is not UTF-8".to_string()))?;

    let sig_len = {
        let b = take(&mut rest, 3, "signature length")?;
        u32::from_be_bytes([0, b[0], b[1], b[2]]) as usize
    };
    let header_len = {
        let b = take(&mut rest, 3, "header length")?;
        u32::from_be_bytes([0, b[0], b[1], b[2]]) as usize
    };

    let signature_header = String::from_utf8(take(&mut rest, sig_len, "signature")?.to_vec())
        .map_err(|_| Error::MalformedExchange("signature is not UTF-8".to_string()))?;
    let headers_cbor = take(&mut rest, header_len, "signed headers")?;
    let payload = rest.to_vec();

    let value: Value = ciborium::from_reader(headers_cbor)
        .map_err(|e| Error::Cbor(e.to_string()))?;
    let parts = value
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| Error::MalformedExchange("signed headers are not a pair".to_string()))?;

    let request_headers = decode_header_map(&parts[0], "request headers")?;
    let mut response_headers = decode_header_map(&parts[1], "response headers")?;

    let status_idx = response_headers
        .iter()
        .position(|(n, _)| n == ":status")
        .ok_or_else(|| Error::MalformedExchange("missing :status".to_string()))?;
    let (_, status) = response_headers.remove(status_idx);
    let response_status: u16 = status
        .parse()
        .map_err(|_| Error::MalformedExchange(format!("bad :status {status:?}")))?;

    Ok(ParsedExchange {
        fallback_url,
        signature_header,
        request_headers,
        response_status,
        response_headers,
        payload,
    })
}
