//! Configuration for the sxgd daemon

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    1_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

/// Upstream fetch limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// TCP connect timeout (TLS handshake counts against the request timeout).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Wall-clock budget for the whole upstream exchange.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bodies larger than this are never signed; they are proxied unsigned.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// One URL policy entry. `sign` is what the produced exchange asserts;
/// `fetch` (when present) is where the document is actually retrieved.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlSetConfig {
    pub sign: UrlPatternConfig,
    #[serde(default)]
    pub fetch: Option<UrlPatternConfig>,
}

/// Shape of a single URL pattern before compilation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlPatternConfig {
    /// Allowed schemes. Must be non-empty.
    pub schemes: Vec<String>,
    /// Required registrable domain; the URL host must be it or a subdomain.
    #[serde(default)]
    pub domain: Option<String>,
    /// Exact authority (`host[:port]`), compared case-insensitively.
    #[serde(default)]
    pub host: Option<String>,
    /// Anchored regex the URL path must match.
    #[serde(default)]
    pub path_regex: Option<String>,
    /// Query parameter names that disqualify a URL when present.
    #[serde(default)]
    pub disallowed_query_params: Vec<String>,
    /// Anchored regex the raw query string must match.
    #[serde(default)]
    pub query_regex: Option<String>,
    /// Raise the log level when a stateful header blocks signing.
    #[serde(default)]
    pub error_on_stateful_headers: bool,
    /// Require the fetch URL's path+query to equal the sign URL's.
    #[serde(default)]
    pub same_path: Option<bool>,
}

/// Daemon configuration, loaded from YAML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listen address, `HOST:PORT`.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// PEM certificate chain, leaf first. Must be valid for signed exchanges.
    pub cert_path: PathBuf,
    /// PEM P-256 private key for the leaf certificate.
    pub key_path: PathBuf,
    /// Optional DER OCSP staple for the leaf.
    #[serde(default)]
    pub ocsp_path: Option<PathBuf>,
    /// Optional forward proxy for upstream fetches.
    #[serde(default)]
    pub forward_proxy: Option<String>,
    /// Master signing switch; backs the packaging predicate.
    #[serde(default = "default_true")]
    pub packaging_enabled: bool,
    /// Initial AMP runtime version served to the transformer.
    #[serde(default)]
    pub rtv: Option<String>,
    #[serde(default)]
    pub fetch: FetchConfig,
    /// URL policy. At least one set is required.
    pub url_sets: Vec<UrlSetConfig>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Validate cross-field invariants that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url_sets.is_empty() {
            anyhow::bail!("config must define at least one url set");
        }
        for (i, set) in self.url_sets.iter().enumerate() {
            if set.sign.schemes.is_empty() {
                anyhow::bail!("url set {i}: sign pattern must list at least one scheme");
            }
            if let Some(fetch) = &set.fetch {
                if fetch.schemes.is_empty() {
                    anyhow::bail!("url set {i}: fetch pattern must list at least one scheme");
                }
            }
        }
        if self.fetch.max_body_bytes == 0 {
            anyhow::bail!("fetch.max_body_bytes must be positive");
        }
        Ok(())
    }

    /// Effective tracing level for the fmt subscriber.
    pub fn tracing_level(&self) -> tracing::Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }
}
