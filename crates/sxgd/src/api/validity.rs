//! Validity endpoint: `/amppkg/validity`.

use axum::http::header;
use axum::response::IntoResponse;

/// An empty CBOR map: no update available, signatures stand as issued.
const EMPTY_VALIDITY_MAP: [u8; 1] = [0xA0];

pub async fn validity() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/cbor"),
            (header::CACHE_CONTROL, "public, max-age=604800"),
        ],
        EMPTY_VALIDITY_MAP.to_vec(),
    )
}
