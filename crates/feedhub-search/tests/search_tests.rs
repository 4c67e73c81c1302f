use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feedhub_core::traits::{Driver, Ranker};
use feedhub_core::{
    into_records, DataSource, Error, NewDataSource, RankedResult, Record, Result, SourceConfig,
    SourceType, Value,
};
use feedhub_drivers::{DriverContext, DriverRegistry, SqliteExecutor};
use feedhub_parse::ParserRegistry;
use feedhub_search::{FeedOptions, FeedService, SearchOptions, SearchService};
use feedhub_service::{DataSourceService, MemorySourceStore};
use serde_json::json;

struct StaticDriver;

#[async_trait]
impl Driver for StaticDriver {
    fn source_type(&self) -> SourceType {
        SourceType::from("static")
    }

    fn validate_config(&self, _config: &SourceConfig) -> Result<()> {
        Ok(())
    }

    async fn fetch(&self, source: &DataSource) -> Result<Vec<Record>> {
        match source.config.get("fail").and_then(Value::as_str) {
            Some(message) => Err(Error::Fetch(message.to_string())),
            None => Ok(into_records(source.config.get("items").cloned().unwrap_or(Value::Null))),
        }
    }
}

/// Returns the first `limit` records it was given.
#[derive(Default)]
struct TakeRanker {
    seen: Mutex<Vec<(usize, String, usize)>>,
}

#[async_trait]
impl Ranker for TakeRanker {
    async fn rank(&self, records: &[Record], query: &str, limit: usize) -> Result<Vec<RankedResult>> {
        self.seen.lock().unwrap().push((records.len(), query.to_string(), limit));
        Ok(records
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, record)| RankedResult { score: 1.0 / (i as f64 + 1.0), record: record.clone(), rank: i + 1 })
            .collect())
    }
}

fn documents() -> Vec<Record> {
    into_records(json!([
        {"id": 1, "title": "Rust ownership", "body": "long text", "tags": ["rust"]},
        {"id": 2, "title": "Async IO", "body": "more text", "tags": []},
    ]))
}

async fn sources() -> Arc<DataSourceService> {
    let context = DriverContext::new(Arc::new(ParserRegistry::new()), Arc::new(SqliteExecutor::new("main")));
    let drivers = DriverRegistry::new(context);
    drivers.register("static", |_| Box::new(StaticDriver));
    let service = DataSourceService::new(Arc::new(MemorySourceStore::new()), Arc::new(drivers));

    let items = json!({"items": [{"title": "HN item", "body": "b", "link": "https://x.io"}]});
    let source = NewDataSource::new("HN", SourceType::from("static"), items.as_object().cloned().unwrap());
    service.create_source(source).await.unwrap();
    let broken = json!({"fail": "offline"});
    let broken = NewDataSource::new("Broken", SourceType::from("static"), broken.as_object().cloned().unwrap());
    service.create_source(broken).await.unwrap();
    Arc::new(service)
}

async fn feed_service() -> Arc<FeedService> {
    Arc::new(FeedService::new(sources().await).with_documents(Arc::new(documents())))
}

#[tokio::test]
async fn feed_merges_documents_then_sources() {
    let feed = feed_service().await.feed(FeedOptions::default()).await.unwrap();
    assert_eq!(feed.count(), 3);
    assert_eq!(feed.records[0]["_source_type"], json!("document"));
    assert_eq!(feed.records[0]["_source_name"], json!("Database Documents"));
    assert_eq!(feed.records[2]["_source_name"], json!("HN"));
    assert_eq!(feed.records[2]["_source_type"], json!("static"));
    assert_eq!(feed.failures.len(), 1);
    assert_eq!(feed.failures[0].source_name, "Broken");
}

#[tokio::test]
async fn feed_sections_can_be_excluded() {
    let service = feed_service().await;
    let only_docs = service
        .feed(FeedOptions { include_data_sources: false, ..FeedOptions::default() })
        .await
        .unwrap();
    assert_eq!(only_docs.count(), 2);
    assert!(only_docs.failures.is_empty());

    let only_sources = service
        .feed(FeedOptions { include_documents: false, ..FeedOptions::default() })
        .await
        .unwrap();
    assert_eq!(only_sources.count(), 1);
}

#[tokio::test]
async fn stats_count_cached_items() {
    let service = feed_service().await;
    let before = service.stats().await.unwrap();
    assert_eq!((before.total_documents, before.total_data_sources, before.total_source_items), (2, 2, 0));

    service.feed(FeedOptions::default()).await.unwrap();
    let after = service.stats().await.unwrap();
    assert_eq!(after.total_source_items, 1);
    assert_eq!(after.total_items, 3);
}

#[tokio::test]
async fn search_ranks_the_feed_and_strips_bodies() {
    let ranker = Arc::new(TakeRanker::default());
    let search = SearchService::new(feed_service().await, ranker.clone());

    let response = search
        .search("  ownership ", SearchOptions { limit: Some(2), ..SearchOptions::default() })
        .await
        .unwrap();
    assert_eq!(response.query, "ownership");
    assert_eq!(response.total_items_searched, 3);
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].rank, 1);
    assert!(response.results.iter().all(|r| !r.record.contains_key("body")));
    assert_eq!(response.results[0].record["title"], json!("Rust ownership"));
    assert_eq!(ranker.seen.lock().unwrap()[0], (3, "ownership".to_string(), 2));
}

#[tokio::test]
async fn search_uses_default_limit() {
    let ranker = Arc::new(TakeRanker::default());
    let search = SearchService::new(feed_service().await, ranker.clone()).with_default_limit(1);
    let response = search.search("rust", SearchOptions::default()).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(ranker.seen.lock().unwrap()[0].2, 1);
}

#[tokio::test]
async fn search_with_nothing_to_rank() {
    let ranker = Arc::new(TakeRanker::default());
    let feed = Arc::new(FeedService::new(sources().await));
    let search = SearchService::new(feed, ranker.clone());
    let options = SearchOptions { include_data_sources: false, ..SearchOptions::default() };
    let response = search.search("rust", options).await.unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.message.as_deref(), Some("No data available"));
    assert!(ranker.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn search_rejects_bad_input() {
    let search = SearchService::new(feed_service().await, Arc::new(TakeRanker::default()));
    assert!(matches!(search.search("   ", SearchOptions::default()).await, Err(Error::Config(_))));
    for limit in [0, 101] {
        let options = SearchOptions { limit: Some(limit), ..SearchOptions::default() };
        assert!(matches!(search.search("rust", options).await, Err(Error::Config(_))));
    }
}
