//! The signing handler: `/priv/doc`.
//!
//! A linear pipeline with many fall-through branches: parse → match →
//! fetch → gate → {proxy verbatim | transform → rewrite → encode → sign}.
//! Disqualifications are not errors; the upstream response is echoed to
//! the client unchanged.

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, Method, Response, StatusCode};
use axum::response::IntoResponse;
use url::Url;

use crate::error::RequestError;
use crate::fetch::UpstreamResponse;
use crate::headers;
use crate::state::AppState;
use crate::transformer::TransformRequest;
use crate::urlset::{find_url_set, UrlSet};
use sxg_core::exchange::SXG_CONTENT_TYPE;
use sxg_core::mice;

/// MICE record size for signed payloads.
const MI_RECORD_SIZE: u64 = 16384;

/// Request headers a signing client must send.
const AMP_CACHE_TRANSFORM: &str = "amp-cache-transform";
const ACCEPTED_SXG: &str = "application/signed-exchange;v=b2";

/// Parsed request parameters: where to fetch and what URL to assert.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct DocParams {
    pub sign: Url,
    pub fetch: Url,
}

fn parse_sign_url(raw: &str) -> Result<Url, RequestError> {
    let url = Url::parse(raw).map_err(|e| RequestError::InvalidUrl {
        field: "sign",
        reason: e.to_string(),
    })?;
    if url.scheme() != "https" {
        return Err(RequestError::InvalidUrl {
            field: "sign",
            reason: format!("scheme must be https, got {:?}", url.scheme()),
        });
    }
    Ok(url)
}

fn parse_fetch_url(raw: &str) -> Result<Url, RequestError> {
    let url = Url::parse(raw).map_err(|e| RequestError::InvalidUrl {
        field: "fetch",
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(RequestError::InvalidUrl {
            field: "fetch",
            reason: format!("scheme must be http or https, got {:?}", url.scheme()),
        });
    }
    Ok(url)
}

fn form_params(encoded: &[u8]) -> (Option<String>, Option<String>) {
    let mut sign = None;
    let mut fetch = None;
    for (name, value) in url::form_urlencoded::parse(encoded) {
        match name.as_ref() {
            "sign" if sign.is_none() => sign = Some(value.into_owned()),
            "fetch" if fetch.is_none() => fetch = Some(value.into_owned()),
            _ => {}
        }
    }
    (sign, fetch)
}

/// Resolve the sign/fetch pair from the recognized request shapes, in
/// order: path parameter, query string, then form body.
pub(crate) fn parse_doc_params(
    path_sign: Option<&str>,
    query: Option<&str>,
    body: Option<&[u8]>,
) -> Result<DocParams, RequestError> {
    if let Some(raw) = path_sign {
        let raw = raw.trim_start_matches('/');
        let sign = parse_sign_url(raw)?;
        return Ok(DocParams {
            fetch: sign.clone(),
            sign,
        });
    }

    let (mut sign, mut fetch) = query
        .map(|q| form_params(q.as_bytes()))
        .unwrap_or((None, None));
    if sign.is_none() {
        if let Some(body) = body {
            (sign, fetch) = form_params(body);
        }
    }

    let sign = parse_sign_url(&sign.ok_or(RequestError::MissingSign)?)?;
    let fetch = match fetch {
        Some(raw) => parse_fetch_url(&raw)?,
        None => sign.clone(),
    };
    Ok(DocParams { sign, fetch })
}

/// `GET|POST /priv/doc`
pub async fn signed_doc(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    client_headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let form_body = (method == Method::POST
        && client_headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false))
    .then_some(body.as_ref());

    match parse_doc_params(None, query.as_deref(), form_body) {
        Ok(params) => handle(&state, params, &client_headers).await,
        Err(e) => e.into_response(),
    }
}

/// `GET /priv/doc/{*signURL}`
pub async fn signed_doc_path(
    State(state): State<AppState>,
    Path(sign): Path<String>,
    client_headers: HeaderMap,
) -> axum::response::Response {
    match parse_doc_params(Some(&sign), None, None) {
        Ok(params) => handle(&state, params, &client_headers).await,
        Err(e) => e.into_response(),
    }
}

async fn handle(
    state: &AppState,
    params: DocParams,
    client_headers: &HeaderMap,
) -> axum::response::Response {
    let Some(set) = find_url_set(&state.url_sets, &params.sign, &params.fetch) else {
        return RequestError::NotAllowed.into_response();
    };

    let upstream = match state.fetcher.fetch(&params.fetch).await {
        Ok(upstream) => upstream,
        Err(e) => return RequestError::Fetch(e.to_string()).into_response(),
    };

    if let Some(reason) = proxy_reason(state, set, client_headers, &upstream) {
        tracing::debug!(sign = %params.sign, reason, "proxying unsigned");
        return proxy_verbatim(upstream);
    }

    match sign_response(state, &params, upstream) {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn client_accepts_sxg(client_headers: &HeaderMap) -> bool {
    let transform = client_headers
        .get(AMP_CACHE_TRANSFORM)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "google")
        .unwrap_or(false);
    let accept = client_headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains(ACCEPTED_SXG))
        .unwrap_or(false);
    transform && accept
}

/// First disqualifying condition, or `None` when the response is signable.
fn proxy_reason(
    state: &AppState,
    set: &UrlSet,
    client_headers: &HeaderMap,
    upstream: &UpstreamResponse,
) -> Option<&'static str> {
    if !client_accepts_sxg(client_headers) {
        return Some("client did not request a signed exchange");
    }
    if !(state.should_package)() {
        return Some("packaging disabled");
    }
    if upstream.status != StatusCode::OK {
        return Some("upstream status not 200");
    }
    if headers::forbids_shared_caching(&upstream.headers) {
        return Some("upstream cache-control forbids shared caching");
    }
    if !headers::is_html(&upstream.headers) {
        return Some("upstream content-type is not html");
    }
    if let Some(name) = headers::stateful_header(&upstream.headers) {
        if set.sign.error_on_stateful_headers {
            tracing::warn!(header = name, "stateful header blocks signing");
        }
        return Some("stateful response header");
    }
    if upstream.body.len() > state.config.fetch.max_body_bytes {
        return Some("upstream body exceeds signing cap");
    }
    if !crate::amp::is_amp_document(&String::from_utf8_lossy(&upstream.body)) {
        return Some("document does not declare amp");
    }
    None
}

/// Echo the upstream response unchanged. Only connection-level framing
/// headers are dropped; stateful headers and everything else pass through.
fn proxy_verbatim(upstream: UpstreamResponse) -> axum::response::Response {
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    for (name, value) in upstream.headers.iter() {
        if name == header::TRANSFER_ENCODING || name == header::CONNECTION {
            continue;
        }
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}

fn sign_response(
    state: &AppState,
    params: &DocParams,
    upstream: UpstreamResponse,
) -> Result<axum::response::Response, RequestError> {
    let html = String::from_utf8_lossy(&upstream.body);
    let rtv = state.rtv.current();
    let request = TransformRequest {
        html: &html,
        document_url: &params.sign,
        rtv: &rtv,
    };
    let transformed = match state.transformer.transform(&request) {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!(sign = %params.sign, error = %e, "transform failed, proxying unsigned");
            return Ok(proxy_verbatim(upstream));
        }
    };

    let now = (state.clock)();
    let mut response_headers =
        headers::signed_response_headers(&upstream.headers, &transformed.preloads, now);

    let encoding = mice::encode(transformed.html.as_bytes(), MI_RECORD_SIZE)
        .map_err(RequestError::Sign)?;
    response_headers.push((
        "content-encoding".to_string(),
        mice::CONTENT_ENCODING.to_string(),
    ));
    response_headers.push(("digest".to_string(), encoding.digest_header_value()));
    response_headers.push(("content-length".to_string(), encoding.body.len().to_string()));

    let artifact = state
        .signer
        .sign(&params.sign, response_headers, encoding.body, now)?;

    tracing::info!(sign = %params.sign, bytes = artifact.len(), "signed exchange produced");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, SXG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-transform"),
            (header::VARY, "AMP-Cache-Transform, Accept"),
            (header::HeaderName::from_static(AMP_CACHE_TRANSFORM), "google"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        artifact,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_param_strips_leading_slash_and_doubles_as_fetch() {
        let params =
            parse_doc_params(Some("/https://a.com/amp/x.html"), None, None).unwrap();
        assert_eq!(params.sign.as_str(), "https://a.com/amp/x.html");
        assert_eq!(params.fetch, params.sign);
    }

    #[test]
    fn query_params_with_fetch_default() {
        let params =
            parse_doc_params(None, Some("sign=https%3A%2F%2Fa.com%2Famp%2Fx"), None).unwrap();
        assert_eq!(params.fetch, params.sign);

        let params = parse_doc_params(
            None,
            Some("fetch=http%3A%2F%2Fa.com%2Famp%2Fx&sign=https%3A%2F%2Fa.com%2Famp%2Fx"),
            None,
        )
        .unwrap();
        assert_eq!(params.fetch.scheme(), "http");
        assert_eq!(params.sign.scheme(), "https");
    }

    #[test]
    fn body_used_when_query_has_no_sign() {
        let body = b"fetch=http%3A%2F%2Fa.com%2Fx&sign=https%3A%2F%2Fa.com%2Fx";
        let params = parse_doc_params(None, None, Some(body)).unwrap();
        assert_eq!(params.sign.as_str(), "https://a.com/x");
        assert_eq!(params.fetch.as_str(), "http://a.com/x");
    }

    #[test]
    fn missing_sign_is_an_error() {
        assert!(matches!(
            parse_doc_params(None, Some("fetch=http%3A%2F%2Fa.com%2Fx"), None),
            Err(RequestError::MissingSign)
        ));
        assert!(matches!(
            parse_doc_params(None, None, None),
            Err(RequestError::MissingSign)
        ));
    }

    #[test]
    fn sign_must_be_https() {
        assert!(matches!(
            parse_doc_params(None, Some("sign=http%3A%2F%2Fa.com%2Fx"), None),
            Err(RequestError::InvalidUrl { field: "sign", .. })
        ));
    }

    #[test]
    fn fetch_scheme_restricted() {
        let query = "sign=https%3A%2F%2Fa.com%2Fx&fetch=ftp%3A%2F%2Fa.com%2Fx";
        assert!(matches!(
            parse_doc_params(None, Some(query), None),
            Err(RequestError::InvalidUrl { field: "fetch", .. })
        ));
    }

    #[test]
    fn client_header_negotiation() {
        let mut headers = HeaderMap::new();
        assert!(!client_accepts_sxg(&headers));

        headers.insert(AMP_CACHE_TRANSFORM, "google".parse().unwrap());
        assert!(!client_accepts_sxg(&headers));

        headers.insert(
            header::ACCEPT,
            "application/signed-exchange;v=b2".parse().unwrap(),
        );
        assert!(client_accepts_sxg(&headers));

        headers.insert(AMP_CACHE_TRANSFORM, "other".parse().unwrap());
        assert!(!client_accepts_sxg(&headers));
    }
}
