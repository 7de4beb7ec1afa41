//! Shared application state for the daemon.
//!
//! Everything here is immutable after startup except the RTV cache, which
//! synchronizes internally. The transformer, clock and packaging predicate
//! are injected at construction so tests can swap them without any
//! process-wide mutation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::fetch::Fetcher;
use crate::rtv::RtvCache;
use crate::sign::ExchangeSigner;
use crate::transformer::{LocalTransformer, Transformer};
use crate::urlset::UrlSet;

/// Time source for signature windows.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub url_sets: Arc<Vec<UrlSet>>,
    pub fetcher: Arc<Fetcher>,
    pub transformer: Arc<dyn Transformer>,
    pub signer: Arc<ExchangeSigner>,
    pub rtv: Arc<RtvCache>,
    /// Whether signing is currently enabled; checked once per request.
    pub should_package: Arc<dyn Fn() -> bool + Send + Sync>,
    pub clock: Clock,
}

impl AppState {
    /// Create application state from configuration, loading the signing
    /// material from disk.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let url_sets = config
            .url_sets
            .iter()
            .map(UrlSet::compile)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let signer = ExchangeSigner::from_files(
            &config.cert_path,
            &config.key_path,
            config.ocsp_path.as_deref(),
        )?;
        tracing::info!(
            cert = %config.cert_path.display(),
            token = %signer.cert_url_token(),
            "Loaded signing certificate"
        );

        let fetcher = Fetcher::new(&config.fetch, config.forward_proxy.as_deref())?;
        let rtv = RtvCache::new(config.rtv.clone().unwrap_or_default());

        let enabled = Arc::new(AtomicBool::new(config.packaging_enabled));
        let should_package: Arc<dyn Fn() -> bool + Send + Sync> = {
            let enabled = enabled.clone();
            Arc::new(move || enabled.load(Ordering::Relaxed))
        };

        Ok(Self {
            config: Arc::new(config),
            url_sets: Arc::new(url_sets),
            fetcher: Arc::new(fetcher),
            transformer: Arc::new(LocalTransformer),
            signer: Arc::new(signer),
            rtv: Arc::new(rtv),
            should_package,
            clock: Arc::new(Utc::now),
        })
    }
}
