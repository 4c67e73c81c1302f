use std::sync::Arc;

use feedhub_core::traits::DocumentProvider;
use feedhub_core::types::{PROVENANCE_NAME, PROVENANCE_TYPE};
use feedhub_core::{Record, Result, Value};
use feedhub_service::{DataSourceService, SourceFailure};
use serde::Serialize;

pub const DOCUMENT_SOURCE_TYPE: &str = "document";
pub const DOCUMENT_SOURCE_NAME: &str = "Database Documents";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    pub include_documents: bool,
    pub include_data_sources: bool,
    pub use_cache: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self { include_documents: true, include_data_sources: true, use_cache: true }
    }
}

/// Documents first, then source records in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Feed {
    pub records: Vec<Record>,
    pub failures: Vec<SourceFailure>,
}

impl Feed {
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub total_documents: usize,
    pub total_data_sources: usize,
    pub total_source_items: usize,
    pub total_items: usize,
}

/// Merges stored documents with the records of every enabled source.
pub struct FeedService {
    sources: Arc<DataSourceService>,
    documents: Option<Arc<dyn DocumentProvider>>,
}

impl FeedService {
    pub fn new(sources: Arc<DataSourceService>) -> Self {
        Self { sources, documents: None }
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentProvider>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn sources(&self) -> &DataSourceService {
        &self.sources
    }

    pub async fn feed(&self, options: FeedOptions) -> Result<Feed> {
        let mut feed = Feed::default();
        if options.include_documents {
            feed.records.extend(self.documents().await?);
        }
        if options.include_data_sources {
            let aggregate = self.sources.aggregate(options.use_cache).await?;
            feed.records.extend(aggregate.records);
            feed.failures = aggregate.failures;
        }
        Ok(feed)
    }

    /// Counts from cached state only; nothing is fetched.
    pub async fn stats(&self) -> Result<FeedStats> {
        let total_documents = match &self.documents {
            Some(provider) => provider.documents().await?.len(),
            None => 0,
        };
        let sources = self.sources.source_stats().await?;
        Ok(FeedStats {
            total_documents,
            total_data_sources: sources.enabled_sources,
            total_source_items: sources.cached_items,
            total_items: total_documents + sources.cached_items,
        })
    }

    async fn documents(&self) -> Result<Vec<Record>> {
        let Some(provider) = &self.documents else {
            return Ok(Vec::new());
        };
        let mut documents = provider.documents().await?;
        for document in &mut documents {
            document.entry(PROVENANCE_TYPE).or_insert_with(|| Value::from(DOCUMENT_SOURCE_TYPE));
            document.entry(PROVENANCE_NAME).or_insert_with(|| Value::from(DOCUMENT_SOURCE_NAME));
        }
        Ok(documents)
    }
}
