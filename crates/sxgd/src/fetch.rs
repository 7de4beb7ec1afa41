//! Upstream fetcher: one non-redirect-following GET per request.

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, StatusCode};
use url::Url;

use crate::config::FetchConfig;

const USER_AGENT: &str = concat!("sxgd/", env!("CARGO_PKG_VERSION"));

/// A buffered upstream response, owned by the request task.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FetchError(pub String);

/// Issues upstream GETs. Redirects are never followed; 3xx responses go
/// back to the packaging gate, which proxies them. No cookie store.
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &FetchConfig, forward_proxy: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(USER_AGENT);
        if let Some(proxy) = forward_proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    /// Wrap an existing client. Tests use this to point at servers with
    /// self-signed certificates.
    pub fn from_client(client: reqwest::Client, config: &FetchConfig) -> Self {
        Self {
            client,
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    pub async fn fetch(&self, url: &Url) -> Result<UpstreamResponse, FetchError> {
        let start = Instant::now();
        tracing::debug!(url = %url, "upstream fetch");

        let resp = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(
                    url = %url,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "upstream fetch failed"
                );
                FetchError(e.to_string())
            })?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError(format!("read body: {e}")))?
            .to_vec();

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "upstream response"
        );

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
