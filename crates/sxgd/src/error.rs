//! Request-level errors and their wire mapping.
//!
//! Only genuinely broken requests and infrastructure failures surface as
//! error statuses; every content-shaped disqualification (non-HTML,
//! non-AMP, stateful headers, transform failure) is a verbatim proxy and
//! never reaches this type.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("missing required sign parameter")]
    MissingSign,

    #[error("invalid {field} url: {reason}")]
    InvalidUrl {
        field: &'static str,
        reason: String,
    },

    #[error("sign/fetch urls not covered by any url set")]
    NotAllowed,

    #[error("upstream fetch failed: {0}")]
    Fetch(String),

    #[error("exchange signing failed: {0}")]
    Sign(#[from] sxg_core::Error),
}

impl RequestError {
    fn status(&self) -> StatusCode {
        match self {
            RequestError::MissingSign
            | RequestError::InvalidUrl { .. }
            | RequestError::NotAllowed => StatusCode::BAD_REQUEST,
            RequestError::Fetch(_) | RequestError::Sign(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::warn!(error = %message, "request failed");
        } else {
            tracing::debug!(error = %message, "request rejected");
        }
        (
            status,
            [(header::CACHE_CONTROL, "no-store")],
            message,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_requests_are_400_no_store() {
        let resp = RequestError::MissingSign.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
    }

    #[test]
    fn fetch_and_sign_failures_are_502_no_store() {
        for err in [
            RequestError::Fetch("boom".to_string()),
            RequestError::Sign(sxg_core::Error::EmptyCertChain),
        ] {
            let resp = err.into_response();
            assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
            assert_eq!(
                resp.headers().get(header::CACHE_CONTROL).unwrap(),
                "no-store"
            );
        }
    }
}
