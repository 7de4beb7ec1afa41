//! Response-header policy for the signing boundary.
//!
//! Headers that imply per-user state disqualify a response from signing
//! entirely; hop-by-hop headers and everything the pipeline recomputes are
//! stripped before the header set crosses into the exchange.

use axum::http::HeaderMap;
use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;

use crate::transformer::Preload;

/// Headers whose presence implies per-user state. A response carrying any
/// of these is never signed.
pub const STATEFUL_HEADERS: [&str; 9] = [
    "authentication-info",
    "clear-site-data",
    "public-key-pins",
    "sec-websocket-accept",
    "set-cookie",
    "set-cookie2",
    "setprofile",
    "strict-transport-security",
    "www-authenticate",
];

/// Hop-by-hop headers, meaningful only on one connection. The whole
/// `Proxy-*` class is hop-by-hop too and is matched by prefix.
const HOP_BY_HOP_HEADERS: [&str; 6] = [
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers the signing pipeline recomputes; upstream values are dropped.
const RECOMPUTED_HEADERS: [&str; 5] = [
    "content-encoding",
    "content-length",
    "date",
    "digest",
    "link",
];

/// Default Content-Security-Policy for signed AMP documents.
const AMP_CSP: &str = "default-src * blob: data:; script-src blob: \
https://cdn.ampproject.org/rtv/ https://cdn.ampproject.org/v0.js \
https://cdn.ampproject.org/v0/ https://cdn.ampproject.org/viewer/; \
object-src 'none'; style-src 'unsafe-inline' https://cdn.ampproject.org/rtv/; \
report-uri https://csp.withgoogle.com/csp/amp";

/// First stateful header present, if any.
pub fn stateful_header(headers: &HeaderMap) -> Option<&'static str> {
    STATEFUL_HEADERS
        .iter()
        .find(|name| headers.contains_key(**name))
        .copied()
}

/// Whether the upstream Cache-Control forbids shared caching.
pub fn forbids_shared_caching(headers: &HeaderMap) -> bool {
    headers
        .get_all("cache-control")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|directive| directive.trim().split('=').next().unwrap_or_default())
        .any(|name| name.eq_ignore_ascii_case("no-store") || name.eq_ignore_ascii_case("private"))
}

/// Whether the Content-Type names an HTML document. Parameters are
/// ignored for the decision but preserved in the signed header.
pub fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case("text/html")
        })
        .unwrap_or(false)
}

fn is_dropped(name: &str, connection_named: &[String]) -> bool {
    STATEFUL_HEADERS.contains(&name)
        || HOP_BY_HOP_HEADERS.contains(&name)
        || name.starts_with("proxy-")
        || RECOMPUTED_HEADERS.contains(&name)
        || connection_named.iter().any(|n| n == name)
}

/// Build the response-header set for signing: upstream headers minus the
/// stateful, hop-by-hop and recomputed sets, plus the injected `Date`,
/// `X-Content-Type-Options`, `Content-Security-Policy` and preload `Link`.
/// `Content-Type` passes through bytewise.
pub fn signed_response_headers(
    upstream: &HeaderMap,
    preloads: &[Preload],
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    // Fields named by Connection are hop-by-hop too.
    let connection_named: Vec<String> = upstream
        .get_all("connection")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut out = Vec::new();
    for (name, value) in upstream.iter() {
        let name = name.as_str().to_ascii_lowercase();
        if is_dropped(&name, &connection_named) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            out.push((name, value.to_string()));
        }
    }

    out.push((
        "date".to_string(),
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
    ));
    out.push(("x-content-type-options".to_string(), "nosniff".to_string()));
    out.push((
        "content-security-policy".to_string(),
        AMP_CSP.to_string(),
    ));
    if let Some(link) = preload_link_value(preloads) {
        out.push(("link".to_string(), link));
    }
    out
}

/// Serialize a preload URL for use inside `<...>`. Absolute URLs are
/// normalized through the URL parser, which percent-encodes the characters
/// that would break the angle-bracket framing; relative URLs are kept as
/// written with the brackets themselves escaped.
fn escape_preload_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => url.to_string(),
        Err(_) => raw
            .replace('<', "%3C")
            .replace('>', "%3E")
            .replace(' ', "%20"),
    }
}

/// The `Link` header value announcing the transformer's preloads, or
/// `None` when there are none.
pub fn preload_link_value(preloads: &[Preload]) -> Option<String> {
    if preloads.is_empty() {
        return None;
    }
    Some(
        preloads
            .iter()
            .map(|p| {
                format!(
                    "<{}>;rel=preload;as={}",
                    escape_preload_url(&p.url),
                    p.destination
                )
            })
            .collect::<Vec<_>>()
            .join(","),
    )
}
