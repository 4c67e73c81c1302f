use std::sync::Arc;

use feedhub_core::traits::Ranker;
use feedhub_core::{Error, RankedResult, Result};
use serde::Serialize;
use tracing::info;

use crate::feed::{FeedOptions, FeedService};

pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_LIMIT: usize = 5;

/// Field dropped from every ranked record before it is returned.
const BULKY_FIELD: &str = "body";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// `1..=100`; the service default when `None`.
    pub limit: Option<usize>,
    pub include_documents: bool,
    pub include_data_sources: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { limit: None, include_documents: true, include_data_sources: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<RankedResult>,
    pub total_items_searched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct SearchService {
    feed: Arc<FeedService>,
    ranker: Arc<dyn Ranker>,
    default_limit: usize,
}

impl SearchService {
    pub fn new(feed: Arc<FeedService>, ranker: Arc<dyn Ranker>) -> Self {
        Self { feed, ranker, default_limit: DEFAULT_LIMIT }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    /// Rank the cached feed against `query`.
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Config("query must not be empty".to_string()));
        }
        let limit = options.limit.unwrap_or(self.default_limit);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(Error::Config(format!("limit must be between 1 and {MAX_LIMIT}")));
        }

        let feed = self
            .feed
            .feed(FeedOptions {
                include_documents: options.include_documents,
                include_data_sources: options.include_data_sources,
                use_cache: true,
            })
            .await?;
        if feed.records.is_empty() {
            return Ok(SearchResponse {
                query: query.to_string(),
                results: Vec::new(),
                total_items_searched: 0,
                message: Some("No data available".to_string()),
            });
        }

        let mut results = self.ranker.rank(&feed.records, query, limit).await?;
        for result in &mut results {
            result.record.shift_remove(BULKY_FIELD);
        }
        info!(query, hits = results.len(), searched = feed.count(), "search complete");
        Ok(SearchResponse {
            query: query.to_string(),
            results,
            total_items_searched: feed.count(),
            message: None,
        })
    }
}
