#![cfg(unix)]

use std::time::Duration;

use feedhub_core::traits::Ranker;
use feedhub_core::{into_records, Error, Value};
use feedhub_search::SubprocessRanker;
use serde_json::json;

fn sh(script: &str) -> SubprocessRanker {
    SubprocessRanker::new("sh").arg("-c").arg(script).with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn parses_ranked_results() {
    let ranker = sh(r#"cat >/dev/null; echo '[{"score":0.87,"record":{"title":"a"},"rank":1}]'"#);
    let records = into_records(json!([{"title": "a"}, {"title": "b"}]));
    let results = ranker.rank(&records, "a", 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].rank, 1);
    assert!((results[0].score - 0.87).abs() < f64::EPSILON);
    assert_eq!(results[0].record["title"], json!("a"));
}

#[tokio::test]
async fn sends_data_query_and_limit_on_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("request.json");
    let ranker = sh(&format!("cat > '{}'; echo '[]'", capture.display()));
    let records = into_records(json!([{"title": "x"}]));
    assert!(ranker.rank(&records, "find x", 3).await.unwrap().is_empty());

    let sent: Value = serde_json::from_str(&std::fs::read_to_string(&capture).unwrap()).unwrap();
    assert_eq!(sent, json!({"data": [{"title": "x"}], "query": "find x", "limit": 3}));
}

#[tokio::test]
async fn reports_error_printed_by_the_process() {
    let ranker = sh(r#"cat >/dev/null; echo '{"error": "Search error: index empty"}'; exit 1"#);
    let err = ranker.rank(&[], "q", 5).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
    assert_eq!(err.to_string(), "Ranking process failed: Search error: index empty");
}

#[tokio::test]
async fn falls_back_to_stderr() {
    let ranker = sh("echo 'module not found' >&2; exit 3");
    let err = ranker.rank(&[], "q", 5).await.unwrap_err();
    assert_eq!(err.to_string(), "Ranking process failed: module not found");
}

#[tokio::test]
async fn rejects_malformed_output() {
    let ranker = sh("cat >/dev/null; echo 'not json'");
    let err = ranker.rank(&[], "q", 5).await.unwrap_err();
    assert!(err.to_string().starts_with("Invalid JSON from ranking process"), "{err}");
}

#[tokio::test]
async fn kills_slow_processes() {
    let ranker = sh("sleep 10").with_timeout(Duration::from_millis(300));
    let err = ranker.rank(&[], "q", 5).await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[tokio::test]
async fn missing_program_is_a_fetch_error() {
    let ranker = SubprocessRanker::new("/nonexistent/bin/python3").arg("search.py");
    let err = ranker.rank(&[], "q", 5).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to start ranking process"), "{err}");
}
