use thiserror::Error;

/// Failure taxonomy shared by parsers, drivers, stores and the orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid driver configuration. Never retried.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Payload is malformed for the claimed format.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Upstream I/O, HTTP status, query or subprocess failure. The message
    /// carries the driver context, e.g. `URL fetch failed: ...`.
    #[error("{0}")]
    Fetch(String),

    #[error("Unknown data source type: {0}")]
    UnknownType(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl Error {
    /// Wrap any failure as a fetch error under `context`, leaving
    /// configuration errors untouched so callers still see them as such.
    pub fn into_fetch(self, context: &str) -> Self {
        match self {
            Error::Config(_) => self,
            Error::Fetch(msg) if msg.starts_with(context) => Error::Fetch(msg),
            other => Error::Fetch(format!("{context}: {other}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
