//! Document transformer seam.
//!
//! The handler only knows this trait; the concrete transformer is chosen
//! at construction time, so tests can substitute one without touching any
//! process-wide state.

use thiserror::Error;
use url::Url;

use crate::amp;

/// A subresource the document's renderer should fetch early.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preload {
    pub url: String,
    /// The `as` value of the preload link: `script`, `style`, ...
    pub destination: String,
}

/// Input to a transform: the fetched document plus the URL the exchange
/// will assert and the current AMP runtime version.
#[derive(Debug)]
pub struct TransformRequest<'a> {
    pub html: &'a str,
    pub document_url: &'a Url,
    pub rtv: &'a str,
}

/// A transformed document plus its extracted preloads.
#[derive(Clone, Debug)]
pub struct TransformResult {
    pub html: String,
    pub preloads: Vec<Preload>,
}

#[derive(Debug, Error)]
#[error("transform failed: {0}")]
pub struct TransformError(pub String);

/// Content-preserving document transformation. Implementations must be
/// callable from many request tasks at once.
pub trait Transformer: Send + Sync {
    fn transform(&self, request: &TransformRequest<'_>) -> Result<TransformResult, TransformError>;
}

/// The in-process transformer: passes the document through unchanged and
/// extracts preloadable subresources.
#[derive(Default)]
pub struct LocalTransformer;

impl Transformer for LocalTransformer {
    fn transform(&self, request: &TransformRequest<'_>) -> Result<TransformResult, TransformError> {
        Ok(TransformResult {
            html: request.html.to_string(),
            preloads: amp::extract_preloads(request.html),
        })
    }
}
