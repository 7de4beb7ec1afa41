//! URL policy: which sign/fetch URLs this instance will package.
//!
//! Patterns are compiled once at startup; evaluation is read-only and
//! shared across request tasks.

use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::config::{UrlPatternConfig, UrlSetConfig};

/// Why a URL failed a pattern.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Mismatch {
    #[error("scheme {0:?} not allowed")]
    Scheme(String),
    #[error("host {0:?} outside required domain")]
    Domain(String),
    #[error("host {0:?} does not match")]
    Host(String),
    #[error("path does not match")]
    Path,
    #[error("disallowed query parameter {0:?}")]
    QueryParam(String),
    #[error("query does not match")]
    Query,
}

/// A compiled URL pattern.
#[derive(Debug)]
pub struct UrlPattern {
    schemes: Vec<String>,
    domain: Option<String>,
    host: Option<String>,
    path_re: Option<Regex>,
    disallowed_query_params: Vec<String>,
    query_re: Option<Regex>,
    pub error_on_stateful_headers: bool,
    pub same_path: bool,
}

fn compile_anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

impl UrlPattern {
    pub fn compile(config: &UrlPatternConfig) -> anyhow::Result<Self> {
        let path_re = config
            .path_regex
            .as_deref()
            .map(compile_anchored)
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid path_regex: {e}"))?;
        let query_re = config
            .query_regex
            .as_deref()
            .map(compile_anchored)
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid query_regex: {e}"))?;

        Ok(Self {
            schemes: config.schemes.clone(),
            domain: config.domain.as_ref().map(|d| d.to_ascii_lowercase()),
            host: config.host.as_ref().map(|h| h.to_ascii_lowercase()),
            path_re,
            disallowed_query_params: config.disallowed_query_params.clone(),
            query_re,
            error_on_stateful_headers: config.error_on_stateful_headers,
            same_path: config.same_path.unwrap_or(false),
        })
    }

    /// Check a URL against this pattern. Paths and queries are matched
    /// case-sensitively; hosts case-insensitively.
    pub fn matches(&self, url: &Url) -> Result<(), Mismatch> {
        if !self.schemes.iter().any(|s| s == url.scheme()) {
            return Err(Mismatch::Scheme(url.scheme().to_string()));
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if let Some(domain) = &self.domain {
            if host != *domain && !host.ends_with(&format!(".{domain}")) {
                return Err(Mismatch::Domain(host));
            }
        }
        if let Some(expected) = &self.host {
            if authority(url) != *expected {
                return Err(Mismatch::Host(authority(url)));
            }
        }

        if let Some(re) = &self.path_re {
            if !re.is_match(url.path()) {
                return Err(Mismatch::Path);
            }
        }

        for (name, _) in url.query_pairs() {
            if self.disallowed_query_params.iter().any(|p| *p == name) {
                return Err(Mismatch::QueryParam(name.into_owned()));
            }
        }
        if let Some(re) = &self.query_re {
            if !re.is_match(url.query().unwrap_or_default()) {
                return Err(Mismatch::Query);
            }
        }

        Ok(())
    }
}

/// A sign/fetch pattern pair. Without a fetch pattern the sign URL also
/// names the upstream, so the two must be identical.
#[derive(Debug)]
pub struct UrlSet {
    pub sign: UrlPattern,
    pub fetch: Option<UrlPattern>,
}

impl UrlSet {
    pub fn compile(config: &UrlSetConfig) -> anyhow::Result<Self> {
        Ok(Self {
            sign: UrlPattern::compile(&config.sign)?,
            fetch: config.fetch.as_ref().map(UrlPattern::compile).transpose()?,
        })
    }

    fn admits(&self, sign: &Url, fetch: &Url) -> bool {
        if self.sign.matches(sign).is_err() {
            return false;
        }
        match &self.fetch {
            Some(pattern) => {
                if pattern.matches(fetch).is_err() {
                    return false;
                }
                if pattern.same_path
                    && (fetch.path() != sign.path() || fetch.query() != sign.query())
                {
                    return false;
                }
                true
            }
            None => fetch.as_str() == sign.as_str(),
        }
    }
}

/// Find the first URL set admitting the pair, if any.
pub fn find_url_set<'a>(sets: &'a [UrlSet], sign: &Url, fetch: &Url) -> Option<&'a UrlSet> {
    sets.iter().find(|set| set.admits(sign, fetch))
}
