//! Shared plumbing handed to every driver: parsers, SQL access, the HTTP
//! client and request defaults.

use std::sync::Arc;
use std::time::Duration;

use ::url::Url;
use feedhub_core::traits::SqlExecutor;
use feedhub_core::types::{config_str, config_u64};
use feedhub_core::{Error, Result, SourceConfig};
use feedhub_parse::ParserRegistry;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FORMAT: &str = "json";

#[derive(Clone)]
pub struct DriverContext {
    pub parsers: Arc<ParserRegistry>,
    pub sql: Arc<dyn SqlExecutor>,
    pub http: reqwest::Client,
    pub default_timeout: Duration,
}

impl DriverContext {
    pub fn new(parsers: Arc<ParserRegistry>, sql: Arc<dyn SqlExecutor>) -> Self {
        Self { parsers, sql, http: reqwest::Client::new(), default_timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// `config.timeout` in seconds, else the context default.
    pub(crate) fn timeout_for(&self, config: &SourceConfig) -> Result<Duration> {
        Ok(config_u64(config, "timeout")?.map_or(self.default_timeout, Duration::from_secs))
    }

    /// An explicit `config.format` must name a registered parser.
    pub(crate) fn check_format(&self, config: &SourceConfig) -> Result<()> {
        match config_str(config, "format") {
            Some(format) if !self.parsers.supports(format) => {
                Err(Error::Config(format!("Unsupported format: {format}")))
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverContext")
            .field("parsers", &self.parsers)
            .field("default_connection", &self.sql.default_connection())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// `config.url` must be present and an absolute http(s) URL with a host.
pub(crate) fn require_url(config: &SourceConfig, kind: &str) -> Result<Url> {
    let raw = config_str(config, "url")
        .ok_or_else(|| Error::Config(format!("{kind} source requires 'url' in config")))?;
    let url = Url::parse(raw).map_err(|_| Error::Config("Invalid URL format".to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::Config("Invalid URL format".to_string()));
    }
    Ok(url)
}

/// Body and content type of a successful response.
pub(crate) struct Payload {
    pub content_type: Option<String>,
    pub body: String,
}

/// Send `request`, failing on transport errors and non-2xx statuses.
/// `label` names the request in the status message, e.g. `HTTP request`.
pub(crate) async fn send(request: reqwest::RequestBuilder, label: &str) -> Result<Payload> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Fetch(format!("{label} failed with status: {}", status.as_u16())));
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.map_err(transport_error)?;
    Ok(Payload { content_type, body })
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Fetch("request timed out".to_string())
    } else {
        Error::Fetch(e.to_string())
    }
}

/// Pick a parser format from the response content type, then the URL's file
/// extension, then fall back to JSON.
pub fn detect_format(content_type: Option<&str>, url: &Url, parsers: &ParserRegistry) -> String {
    let content_type = content_type.map(str::to_ascii_lowercase).unwrap_or_default();
    for (needle, format) in [("json", "json"), ("rss", "rss"), ("xml", "xml"), ("csv", "csv")] {
        if content_type.contains(needle) {
            return format.to_string();
        }
    }

    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    if let Some(ext) = extension.filter(|ext| parsers.supports(ext)) {
        return ext;
    }

    if content_type.starts_with("text/plain") {
        return "text".to_string();
    }
    DEFAULT_FORMAT.to_string()
}
