//! Domain types shared by parsers, drivers and the orchestrator.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub use serde_json::{Map, Value};

pub type SourceId = i64;

/// One normalized item of fetched data. Field order follows the payload.
pub type Record = Map<String, Value>;

/// Driver-specific configuration of a source (`url`, `query`, `auth_type`, ...).
pub type SourceConfig = Map<String, Value>;

/// Provenance keys attached to records in an aggregate feed.
pub const PROVENANCE_ID: &str = "_source_id";
pub const PROVENANCE_NAME: &str = "_source_name";
pub const PROVENANCE_TYPE: &str = "_source_type";

/// Key used when a scalar payload has to be carried as a record.
pub const SCALAR_KEY: &str = "value";

/// Kind of external origin. The three built-in kinds have dedicated drivers;
/// anything else must be registered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    Database,
    Url,
    Api,
    Custom(String),
}

impl SourceType {
    pub fn as_str(&self) -> &str {
        match self {
            SourceType::Database => "database",
            SourceType::Url => "url",
            SourceType::Api => "api",
            SourceType::Custom(name) => name,
        }
    }
}

impl From<&str> for SourceType {
    fn from(value: &str) -> Self {
        match value {
            "database" => SourceType::Database,
            "url" => SourceType::Url,
            "api" => SourceType::Api,
            other => SourceType::Custom(other.to_string()),
        }
    }
}

impl From<String> for SourceType {
    fn from(value: String) -> Self {
        SourceType::from(value.as_str())
    }
}

impl From<SourceType> for String {
    fn from(value: SourceType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication scheme of an API source (`config.auth_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    ApiKey,
    Basic,
    OAuth2,
}

impl FromStr for AuthType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(AuthType::None),
            "bearer" => Ok(AuthType::Bearer),
            "api_key" => Ok(AuthType::ApiKey),
            "basic" => Ok(AuthType::Basic),
            "oauth2" => Ok(AuthType::OAuth2),
            other => Err(Error::Config(format!("Unsupported auth_type: {other}"))),
        }
    }
}

/// A configured external origin plus its cache state.
///
/// `cached_data` and `last_cached_at` only change together, through
/// `SourceStore::update_cache`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: SourceId,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub config: SourceConfig,
    pub cache_ttl: u64,
    pub last_cached_at: Option<DateTime<Utc>>,
    pub cached_data: Option<Vec<Record>>,
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl DataSource {
    /// Id carried by sources that were never persisted.
    pub const UNSAVED_ID: SourceId = 0;

    /// Throwaway source used to probe a configuration; never cached.
    pub fn ephemeral(source_type: SourceType, config: SourceConfig) -> Self {
        Self {
            id: Self::UNSAVED_ID,
            name: format!("{source_type} connection test"),
            source_type,
            config,
            cache_ttl: 0,
            last_cached_at: None,
            cached_data: None,
            enabled: false,
            description: None,
        }
    }

    /// `None` when the source was never cached.
    pub fn cache_expires_at(&self) -> Option<DateTime<Utc>> {
        let cached_at = self.last_cached_at?;
        let expiry = i64::try_from(self.cache_ttl)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| cached_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(expiry)
    }

    pub fn is_cache_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.cached_data.is_none() {
            return false;
        }
        match self.cache_expires_at() {
            Some(expires_at) => now < expires_at,
            None => false,
        }
    }

    pub fn is_cache_valid(&self) -> bool {
        self.is_cache_valid_at(Utc::now())
    }

    pub fn cached_item_count(&self) -> usize {
        self.cached_data.as_ref().map_or(0, Vec::len)
    }
}

/// Input for registering a source. `cache_ttl` falls back to the configured
/// default when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDataSource {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub config: SourceConfig,
    #[serde(default)]
    pub cache_ttl: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl NewDataSource {
    pub fn new(name: impl Into<String>, source_type: SourceType, config: SourceConfig) -> Self {
        Self {
            name: name.into(),
            source_type,
            config,
            cache_ttl: None,
            enabled: true,
            description: None,
        }
    }

    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl = Some(seconds);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn into_source(self, default_ttl: u64) -> DataSource {
        DataSource {
            id: DataSource::UNSAVED_ID,
            name: self.name,
            source_type: self.source_type,
            config: self.config,
            cache_ttl: self.cache_ttl.unwrap_or(default_ttl),
            last_cached_at: None,
            cached_data: None,
            enabled: self.enabled,
            description: self.description,
        }
    }
}

/// Verdict of a trial fetch against an unsaved configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<Record>>,
}

impl ConnectionTest {
    pub const SAMPLE_SIZE: usize = 3;

    pub fn passed(records: &[Record]) -> Self {
        Self {
            success: true,
            message: "Connection successful".to_string(),
            sample_count: Some(records.len()),
            sample: Some(records.iter().take(Self::SAMPLE_SIZE).cloned().collect()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), sample_count: None, sample: None }
    }
}

/// One hit returned by the ranking process. `rank` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub score: f64,
    pub record: Record,
    pub rank: usize,
}

/// Normalize a decoded payload into records: a mapping becomes a one-element
/// list, a list keeps its mappings, and scalars are carried under `value`.
pub fn into_records(value: Value) -> Vec<Record> {
    match value {
        Value::Null => Vec::new(),
        Value::Object(map) => vec![map],
        Value::Array(items) => items.into_iter().map(scalar_or_record).collect(),
        scalar => vec![scalar_or_record(scalar)],
    }
}

fn scalar_or_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut record = Record::new();
            record.insert(SCALAR_KEY.to_string(), other);
            record
        }
    }
}

/// Non-empty string field of a config mapping. Missing, null and blank
/// values all count as absent.
pub fn config_str<'a>(config: &'a SourceConfig, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Positive integer field, accepting both `30` and `"30"`.
pub fn config_u64(config: &SourceConfig, key: &str) -> Result<Option<u64>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|v| *v > 0)
            .map(Some)
            .ok_or_else(|| Error::Config(format!("'{key}' must be a positive integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|v| *v > 0)
            .map(Some)
            .ok_or_else(|| Error::Config(format!("'{key}' must be a positive integer"))),
        Some(_) => Err(Error::Config(format!("'{key}' must be a positive integer"))),
    }
}
