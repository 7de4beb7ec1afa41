//! Certificate-chain endpoint: `/amppkg/cert/{token}`.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;
use sxg_core::certs::CERT_CHAIN_CONTENT_TYPE;

/// Serve the configured chain as `application/cert-chain+cbor`. The token
/// must name this chain; anything else is a 404 so stale cert URLs age out
/// of caches.
pub async fn cert_chain(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    if token != state.signer.cert_url_token() {
        return (StatusCode::NOT_FOUND, "unknown certificate\n").into_response();
    }

    match state.signer.cert_chain_cbor() {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, CERT_CHAIN_CONTENT_TYPE),
                (header::CACHE_CONTROL, "public, max-age=604800"),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode certificate chain");
            (StatusCode::INTERNAL_SERVER_ERROR, "certificate unavailable\n").into_response()
        }
    }
}
