use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedhub_core::traits::SourceStore;
use feedhub_core::{DataSource, Record, Result, SourceId};

use super::missing;

/// Process-local store; ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MemorySourceStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    last_id: SourceId,
    sources: BTreeMap<SourceId, DataSource>,
}

impl MemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn insert(&self, mut source: DataSource) -> Result<DataSource> {
        let mut state = self.state();
        state.last_id += 1;
        source.id = state.last_id;
        state.sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn get(&self, id: SourceId) -> Result<Option<DataSource>> {
        Ok(self.state().sources.get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<DataSource>> {
        Ok(self.state().sources.values().cloned().collect())
    }

    async fn update(&self, source: &DataSource) -> Result<()> {
        let mut state = self.state();
        let stored = state.sources.get_mut(&source.id).ok_or_else(|| missing(source.id))?;
        stored.name.clone_from(&source.name);
        stored.source_type = source.source_type.clone();
        stored.config.clone_from(&source.config);
        stored.cache_ttl = source.cache_ttl;
        stored.enabled = source.enabled;
        stored.description.clone_from(&source.description);
        Ok(())
    }

    async fn set_enabled(&self, id: SourceId, enabled: bool) -> Result<()> {
        let mut state = self.state();
        state.sources.get_mut(&id).ok_or_else(|| missing(id))?.enabled = enabled;
        Ok(())
    }

    async fn update_cache(&self, id: SourceId, records: &[Record], at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state();
        let stored = state.sources.get_mut(&id).ok_or_else(|| missing(id))?;
        stored.cached_data = Some(records.to_vec());
        stored.last_cached_at = Some(at);
        Ok(())
    }

    async fn delete(&self, id: SourceId) -> Result<bool> {
        Ok(self.state().sources.remove(&id).is_some())
    }
}
