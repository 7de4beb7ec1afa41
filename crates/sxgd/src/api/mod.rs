//! HTTP API for the sxgd daemon

pub mod cert;
pub mod doc;
pub mod health;
pub mod validity;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health))
        .route("/priv/doc", get(doc::signed_doc).post(doc::signed_doc))
        .route("/priv/doc/{*sign}", get(doc::signed_doc_path))
        .route("/amppkg/cert/{token}", get(cert::cert_chain))
        .route("/amppkg/validity", get(validity::validity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
