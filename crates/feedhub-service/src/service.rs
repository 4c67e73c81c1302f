//! The cache/fetch orchestrator.

use std::sync::Arc;

use chrono::Utc;
use feedhub_core::config::SourceSettings;
use feedhub_core::traits::SourceStore;
use feedhub_core::types::{PROVENANCE_ID, PROVENANCE_NAME, PROVENANCE_TYPE};
use feedhub_core::{
    ConnectionTest, DataSource, NewDataSource, Record, Result, SourceConfig, SourceId, Value,
};
use feedhub_drivers::DriverRegistry;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::locks::SourceLocks;
use crate::store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Seconds; used for new sources that omit `cache_ttl`.
    pub default_cache_ttl: u64,
    /// Fetch results are truncated to this many records before caching.
    pub max_items_per_source: Option<usize>,
    pub max_concurrent_fetches: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from(&SourceSettings::default())
    }
}

impl From<&SourceSettings> for ServiceOptions {
    fn from(settings: &SourceSettings) -> Self {
        Self {
            default_cache_ttl: settings.default_cache_ttl,
            max_items_per_source: settings.max_items_per_source,
            max_concurrent_fetches: settings.max_concurrent_fetches.max(1),
        }
    }
}

/// A source that failed during an aggregate read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source_id: SourceId,
    pub source_name: String,
    pub message: String,
}

/// Records of every enabled source that could be read, tagged with their
/// origin, plus the sources that could not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub records: Vec<Record>,
    pub failures: Vec<SourceFailure>,
}

/// The first records of one source and how many it holds in total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub records: Vec<Record>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub enabled_sources: usize,
    pub cached_items: usize,
}

/// Decides between cached data and a driver call, persists refreshed
/// results and aggregates across sources.
pub struct DataSourceService {
    store: Arc<dyn SourceStore>,
    drivers: Arc<DriverRegistry>,
    options: ServiceOptions,
    locks: SourceLocks,
}

impl DataSourceService {
    pub const DEFAULT_PREVIEW: usize = 5;

    pub fn new(store: Arc<dyn SourceStore>, drivers: Arc<DriverRegistry>) -> Self {
        Self::with_options(store, drivers, ServiceOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn SourceStore>,
        drivers: Arc<DriverRegistry>,
        options: ServiceOptions,
    ) -> Self {
        Self { store, drivers, options, locks: SourceLocks::default() }
    }

    pub fn store(&self) -> &Arc<dyn SourceStore> {
        &self.store
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Records of `source`, served from its cache when `use_cache` is set and
    /// the cache is still valid, fetched through its driver otherwise.
    ///
    /// A successful fetch is written back to the store (and to `source`) as
    /// one cache update. A failed fetch leaves any earlier cache in place.
    pub async fn fetch_data(&self, source: &mut DataSource, use_cache: bool) -> Result<Vec<Record>> {
        if use_cache {
            if let Some(cached) = valid_cache(source) {
                debug!(source = source.id, items = cached.len(), "cache hit");
                return Ok(cached.clone());
            }
        }

        if source.id == DataSource::UNSAVED_ID {
            let records = self.fetch_fresh(source).await?;
            remember(source, &records, Utc::now());
            return Ok(records);
        }

        let lock = self.locks.for_source(source.id);
        let _guard = lock.lock().await;

        // another caller may have refreshed this source while we waited
        if use_cache {
            if let Some(stored) = self.store.get(source.id).await? {
                if valid_cache(&stored).is_some() {
                    debug!(source = source.id, "cache filled while waiting");
                    *source = stored;
                    return Ok(source.cached_data.clone().unwrap_or_default());
                }
            }
        }

        let records = self.fetch_fresh(source).await?;
        let at = Utc::now();
        self.store.update_cache(source.id, &records, at).await?;
        remember(source, &records, at);
        Ok(records)
    }

    /// Driver call plus truncation. Does not touch the cache.
    async fn fetch_fresh(&self, source: &DataSource) -> Result<Vec<Record>> {
        debug!(source = source.id, kind = %source.source_type, "cache miss, fetching");
        let driver = self.drivers.driver(source.source_type.as_str())?;
        let mut records = driver.fetch(source).await?;
        if let Some(max) = self.options.max_items_per_source {
            records.truncate(max);
        }
        Ok(records)
    }

    /// Trial fetch of an unsaved configuration. Never fails; problems are
    /// reported in the verdict.
    pub async fn test_connection(&self, source_type: &str, config: &SourceConfig) -> ConnectionTest {
        match self.drivers.driver(source_type) {
            Ok(driver) => driver.test_connection(config).await,
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }

    /// Every enabled source's records in source-then-record order. Failing
    /// sources are logged and skipped.
    pub async fn get_all_sources_data(&self, use_cache: bool) -> Result<Vec<Record>> {
        Ok(self.aggregate(use_cache).await?.records)
    }

    pub async fn aggregate(&self, use_cache: bool) -> Result<Aggregate> {
        let sources = self.store.enabled().await?;
        let results = self.fetch_many(sources, use_cache).await;

        let mut aggregate = Aggregate::default();
        for (source, result) in results {
            match result {
                Ok(records) => {
                    aggregate.records.extend(records.into_iter().map(|mut record| {
                        tag_provenance(&mut record, &source);
                        record
                    }));
                }
                Err(e) => {
                    error!(source = source.id, name = %source.name, "Failed to fetch data from source: {e}");
                    aggregate.failures.push(SourceFailure {
                        source_id: source.id,
                        source_name: source.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(aggregate)
    }

    /// Fetch `sources` with bounded concurrency; results keep input order.
    async fn fetch_many(
        &self,
        sources: Vec<DataSource>,
        use_cache: bool,
    ) -> Vec<(DataSource, Result<Vec<Record>>)> {
        stream::iter(sources)
            .map(|mut source| async move {
                let result = self.fetch_data(&mut source, use_cache).await;
                (source, result)
            })
            .buffered(self.options.max_concurrent_fetches.max(1))
            .collect()
            .await
    }

    pub async fn source_stats(&self) -> Result<SourceStats> {
        let enabled = self.store.enabled().await?;
        Ok(SourceStats {
            enabled_sources: enabled.len(),
            cached_items: enabled.iter().map(DataSource::cached_item_count).sum(),
        })
    }

    pub async fn sources(&self) -> Result<Vec<DataSource>> {
        self.store.all().await
    }

    pub async fn source(&self, id: SourceId) -> Result<DataSource> {
        self.store.get(id).await?.ok_or_else(|| store::missing(id))
    }

    /// Validate through the type's driver, then persist.
    pub async fn create_source(&self, new: NewDataSource) -> Result<DataSource> {
        self.drivers.driver(new.source_type.as_str())?.validate_config(&new.config)?;
        let source = self.store.insert(new.into_source(self.options.default_cache_ttl)).await?;
        info!(source = source.id, name = %source.name, kind = %source.source_type, "data source created");
        Ok(source)
    }

    /// Replace the editable fields of an existing source. Cache state is kept.
    pub async fn update_source(&self, source: &DataSource) -> Result<DataSource> {
        self.drivers.driver(source.source_type.as_str())?.validate_config(&source.config)?;
        self.source(source.id).await?;
        self.store.update(source).await?;
        self.source(source.id).await
    }

    pub async fn delete_source(&self, id: SourceId) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            self.locks.forget(id);
            info!(source = id, "data source deleted");
        }
        Ok(deleted)
    }

    pub async fn set_enabled(&self, id: SourceId, enabled: bool) -> Result<()> {
        self.store.set_enabled(id, enabled).await?;
        info!(source = id, enabled, "data source toggled");
        Ok(())
    }

    /// Flip `enabled` and return the new state.
    pub async fn toggle(&self, id: SourceId) -> Result<bool> {
        let enabled = !self.source(id).await?.enabled;
        self.set_enabled(id, enabled).await?;
        Ok(enabled)
    }

    /// Fetch bypassing the cache.
    pub async fn refresh_source(&self, id: SourceId) -> Result<Vec<Record>> {
        let mut source = self.source(id).await?;
        self.fetch_data(&mut source, false).await
    }

    pub async fn source_data(&self, id: SourceId) -> Result<Vec<Record>> {
        let mut source = self.source(id).await?;
        self.fetch_data(&mut source, true).await
    }

    pub async fn preview(&self, id: SourceId, limit: usize) -> Result<Preview> {
        let records = self.source_data(id).await?;
        let total = records.len();
        Ok(Preview { records: records.into_iter().take(limit).collect(), total })
    }
}

impl std::fmt::Debug for DataSourceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceService")
            .field("drivers", &self.drivers)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn remember(source: &mut DataSource, records: &[Record], at: chrono::DateTime<Utc>) {
    source.cached_data = Some(records.to_vec());
    source.last_cached_at = Some(at);
}

fn valid_cache(source: &DataSource) -> Option<&Vec<Record>> {
    if source.is_cache_valid() {
        source.cached_data.as_ref()
    } else {
        None
    }
}

/// Add origin fields without touching fields the record already has.
pub fn tag_provenance(record: &mut Record, source: &DataSource) {
    record.entry(PROVENANCE_ID).or_insert_with(|| Value::from(source.id));
    record.entry(PROVENANCE_NAME).or_insert_with(|| Value::from(source.name.clone()));
    record.entry(PROVENANCE_TYPE).or_insert_with(|| Value::from(source.source_type.as_str()));
}
