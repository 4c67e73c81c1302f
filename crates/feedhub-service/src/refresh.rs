//! Refresh runs: re-fetch sources bypassing the cache and report per source.

use chrono::Utc;
use feedhub_core::{DataSource, Result, SourceId};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info};

use crate::service::DataSourceService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RefreshScope {
    /// Enabled sources whose cache is missing or expired.
    #[default]
    Expired,
    /// Every enabled source.
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceOutcome {
    pub source_id: SourceId,
    pub name: String,
    pub items: usize,
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub scope: RefreshScope,
    pub outcomes: Vec<SourceOutcome>,
}

impl RefreshReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

impl DataSourceService {
    pub async fn refresh(&self, scope: RefreshScope) -> Result<RefreshReport> {
        let targets = self.refresh_targets(scope).await?;
        Ok(self.refresh_sources(scope, targets, |_| {}).await)
    }

    pub async fn refresh_targets(&self, scope: RefreshScope) -> Result<Vec<DataSource>> {
        match scope {
            RefreshScope::All => self.store().enabled().await,
            RefreshScope::Expired => self.store().needs_caching(Utc::now()).await,
        }
    }

    /// Fetch every source in `targets` with the cache bypassed. `on_done` sees
    /// each outcome as it completes, in `targets` order.
    pub async fn refresh_sources<F>(
        &self,
        scope: RefreshScope,
        targets: Vec<DataSource>,
        on_done: F,
    ) -> RefreshReport
    where
        F: Fn(&SourceOutcome) + Send + Sync,
    {
        info!(count = targets.len(), ?scope, "Starting data sources refresh");
        let concurrency = self.options().max_concurrent_fetches.max(1);
        let outcomes: Vec<SourceOutcome> = stream::iter(targets)
            .map(|mut source| async move {
                let result = self.fetch_data(&mut source, false).await;
                outcome(&source, result)
            })
            .buffered(concurrency)
            .inspect(|outcome| on_done(outcome))
            .collect()
            .await;

        let report = RefreshReport { scope, outcomes };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Data sources refresh completed"
        );
        report
    }
}

fn outcome(source: &DataSource, result: Result<Vec<feedhub_core::Record>>) -> SourceOutcome {
    match result {
        Ok(records) => {
            info!(source = source.id, name = %source.name, items = records.len(), "source refreshed");
            SourceOutcome { source_id: source.id, name: source.name.clone(), items: records.len(), error: None }
        }
        Err(e) => {
            error!(source = source.id, name = %source.name, "Failed to refresh data source: {e}");
            SourceOutcome {
                source_id: source.id,
                name: source.name.clone(),
                items: 0,
                error: Some(e.to_string()),
            }
        }
    }
}
