use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    ConnectionTest, DataSource, RankedResult, Record, SourceConfig, SourceId,
    SourceType, Value,
};

/// Converts a raw textual payload into records.
pub trait Parser: Send + Sync {
    fn parse(&self, content: &str) -> Result<Vec<Record>>;

    /// Structural view of the payload before it is flattened into records.
    /// Used to navigate nested response paths.
    fn parse_document(&self, content: &str) -> Result<Value> {
        Ok(Value::Array(self.parse(content)?.into_iter().map(Value::Object).collect()))
    }
}

/// Reaches one kind of external origin.
///
/// Drivers never touch the cache fields of the source they fetch; persisting
/// results is the orchestrator's job.
#[async_trait]
pub trait Driver: Send + Sync {
    fn source_type(&self) -> SourceType;

    fn validate_config(&self, config: &SourceConfig) -> Result<()>;

    async fn fetch(&self, source: &DataSource) -> Result<Vec<Record>>;

    /// Trial fetch with an unsaved source. Failures are reported, not raised.
    async fn test_connection(&self, config: &SourceConfig) -> ConnectionTest {
        if let Err(e) = self.validate_config(config) {
            return ConnectionTest::failed(e.to_string());
        }
        let probe = DataSource::ephemeral(self.source_type(), config.clone());
        match self.fetch(&probe).await {
            Ok(records) => ConnectionTest::passed(&records),
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}

/// Runs raw read queries against named connections.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    fn default_connection(&self) -> &str;
    async fn select(&self, connection: &str, query: &str) -> Result<Vec<Record>>;
}

/// Persistent home of source rows.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Persist a new source and return it with its assigned id.
    async fn insert(&self, source: DataSource) -> Result<DataSource>;
    async fn get(&self, id: SourceId) -> Result<Option<DataSource>>;
    /// All sources in id order.
    async fn all(&self) -> Result<Vec<DataSource>>;
    /// Overwrite the editable fields (name, type, config, ttl, enabled,
    /// description). Cache fields are left alone.
    async fn update(&self, source: &DataSource) -> Result<()>;
    async fn set_enabled(&self, id: SourceId, enabled: bool) -> Result<()>;
    /// Write `cached_data` and `last_cached_at` in one step.
    async fn update_cache(&self, id: SourceId, records: &[Record], at: DateTime<Utc>) -> Result<()>;
    async fn delete(&self, id: SourceId) -> Result<bool>;

    async fn enabled(&self) -> Result<Vec<DataSource>> {
        Ok(self.all().await?.into_iter().filter(|s| s.enabled).collect())
    }

    /// Enabled sources whose cache is missing or expired at `now`.
    async fn needs_caching(&self, now: DateTime<Utc>) -> Result<Vec<DataSource>> {
        Ok(self.enabled().await?.into_iter().filter(|s| !s.is_cache_valid_at(now)).collect())
    }
}

/// External semantic ranking capability.
#[async_trait]
pub trait Ranker: Send + Sync {
    async fn rank(&self, records: &[Record], query: &str, limit: usize) -> Result<Vec<RankedResult>>;
}

/// Stored documents merged into the feed next to source records.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn documents(&self) -> Result<Vec<Record>>;
}

#[async_trait]
impl DocumentProvider for Vec<Record> {
    async fn documents(&self) -> Result<Vec<Record>> {
        Ok(self.clone())
    }
}
