//! SQLite-backed source store.
//!
//! One `data_sources` table; `config` and `cached_data` are JSON text and
//! timestamps are RFC 3339. Every call runs on the blocking pool against a
//! single shared connection.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use feedhub_core::traits::SourceStore;
use feedhub_core::{DataSource, Error, Record, Result, SourceId, SourceType};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::missing;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS data_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    config TEXT NOT NULL DEFAULT '{}',
    cache_ttl INTEGER NOT NULL DEFAULT 3600,
    last_cached_at TEXT,
    cached_data TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS data_sources_enabled ON data_sources (enabled);
";

const COLUMNS: &str =
    "id, name, type, config, cache_ttl, last_cached_at, cached_data, enabled, description";

#[derive(Clone)]
pub struct SqliteSourceStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSourceStore {
    /// Open (creating parent directories and the table when missing).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Store(format!("cannot create {}: {e}", parent.display())))?;
        }
        Self::migrate(Connection::open(path).map_err(store_error)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::migrate(Connection::open_in_memory().map_err(store_error)?)
    }

    fn migrate(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(store_error)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await
        .map_err(|e| Error::Store(format!("store task failed: {e}")))?
    }
}

impl std::fmt::Debug for SqliteSourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSourceStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceStore for SqliteSourceStore {
    async fn insert(&self, mut source: DataSource) -> Result<DataSource> {
        self.with_conn(move |conn| {
            let now = timestamp(Utc::now());
            conn.execute(
                "INSERT INTO data_sources
                   (name, type, config, cache_ttl, last_cached_at, cached_data, enabled, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    source.name,
                    source.source_type.as_str(),
                    to_json(&source.config)?,
                    ttl_column(source.cache_ttl)?,
                    source.last_cached_at.map(timestamp),
                    source.cached_data.as_ref().map(to_json).transpose()?,
                    source.enabled,
                    source.description,
                    now,
                ],
            )
            .map_err(store_error)?;
            source.id = conn.last_insert_rowid();
            Ok(source)
        })
        .await
    }

    async fn get(&self, id: SourceId) -> Result<Option<DataSource>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM data_sources WHERE id = ?1"),
                params![id],
                read_row,
            )
            .optional()
            .map_err(store_error)?
            .map(StoredRow::decode)
            .transpose()
        })
        .await
    }

    async fn all(&self) -> Result<Vec<DataSource>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {COLUMNS} FROM data_sources ORDER BY id"))
                .map_err(store_error)?;
            let rows = stmt
                .query_map([], read_row)
                .map_err(store_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(store_error)?;
            rows.into_iter().map(StoredRow::decode).collect()
        })
        .await
    }

    async fn update(&self, source: &DataSource) -> Result<()> {
        let source = source.clone();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE data_sources
                     SET name = ?1, type = ?2, config = ?3, cache_ttl = ?4, enabled = ?5,
                         description = ?6, updated_at = ?7
                     WHERE id = ?8",
                    params![
                        source.name,
                        source.source_type.as_str(),
                        to_json(&source.config)?,
                        ttl_column(source.cache_ttl)?,
                        source.enabled,
                        source.description,
                        timestamp(Utc::now()),
                        source.id,
                    ],
                )
                .map_err(store_error)?;
            ensure_changed(changed, source.id)
        })
        .await
    }

    async fn set_enabled(&self, id: SourceId, enabled: bool) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE data_sources SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
                    params![enabled, timestamp(Utc::now()), id],
                )
                .map_err(store_error)?;
            ensure_changed(changed, id)
        })
        .await
    }

    async fn update_cache(&self, id: SourceId, records: &[Record], at: DateTime<Utc>) -> Result<()> {
        let data = to_json(records)?;
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE data_sources
                     SET cached_data = ?1, last_cached_at = ?2, updated_at = ?2
                     WHERE id = ?3",
                    params![data, timestamp(at), id],
                )
                .map_err(store_error)?;
            ensure_changed(changed, id)
        })
        .await
    }

    async fn delete(&self, id: SourceId) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM data_sources WHERE id = ?1", params![id])
                .map_err(store_error)?;
            Ok(deleted > 0)
        })
        .await
    }
}

/// Raw column values, decoded outside the rusqlite row callback.
struct StoredRow {
    id: SourceId,
    name: String,
    source_type: String,
    config: String,
    cache_ttl: i64,
    last_cached_at: Option<String>,
    cached_data: Option<String>,
    enabled: bool,
    description: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: row.get(0)?,
        name: row.get(1)?,
        source_type: row.get(2)?,
        config: row.get(3)?,
        cache_ttl: row.get(4)?,
        last_cached_at: row.get(5)?,
        cached_data: row.get(6)?,
        enabled: row.get(7)?,
        description: row.get(8)?,
    })
}

impl StoredRow {
    fn decode(self) -> Result<DataSource> {
        Ok(DataSource {
            id: self.id,
            name: self.name,
            source_type: SourceType::from(self.source_type),
            config: from_json(&self.config)?,
            cache_ttl: u64::try_from(self.cache_ttl).unwrap_or_default(),
            last_cached_at: self.last_cached_at.as_deref().map(parse_timestamp).transpose()?,
            cached_data: self.cached_data.as_deref().map(from_json).transpose()?,
            enabled: self.enabled,
            description: self.description,
        })
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("bad timestamp {raw:?}: {e}")))
}

fn ttl_column(ttl: u64) -> Result<i64> {
    i64::try_from(ttl).map_err(|_| Error::Store(format!("cache_ttl {ttl} is out of range")))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Store(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::Store(e.to_string()))
}

fn ensure_changed(changed: usize, id: SourceId) -> Result<()> {
    if changed == 0 {
        Err(missing(id))
    } else {
        Ok(())
    }
}

fn store_error(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedhub_core::NewDataSource;
    use serde_json::json;

    fn source(name: &str) -> DataSource {
        let config = json!({"url": "https://example.com/feed.json", "timeout": 5});
        NewDataSource::new(name, SourceType::Url, config.as_object().cloned().unwrap()).into_source(60)
    }

    #[tokio::test]
    async fn rows_round_trip_with_cache_columns() {
        let store = SqliteSourceStore::open_in_memory().unwrap();
        let saved = store.insert(source("feed")).await.unwrap();
        assert_eq!(saved.id, 1);

        let at = Utc::now();
        let records = vec![json!({"b": 1, "a": [1, 2]}).as_object().cloned().unwrap()];
        store.update_cache(saved.id, &records, at).await.unwrap();

        let loaded = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.cached_data.as_deref(), Some(records.as_slice()));
        assert_eq!(loaded.last_cached_at, Some(at));
        assert_eq!(loaded.config, saved.config);
        assert_eq!(loaded.source_type, SourceType::Url);
    }

    #[tokio::test]
    async fn missing_rows() {
        let store = SqliteSourceStore::open_in_memory().unwrap();
        assert!(store.get(9).await.unwrap().is_none());
        assert!(matches!(store.set_enabled(9, false).await, Err(Error::NotFound(_))));
        assert!(matches!(store.update_cache(9, &[], Utc::now()).await, Err(Error::NotFound(_))));
        assert!(!store.delete(9).await.unwrap());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("feedhub.sqlite");
        {
            let store = SqliteSourceStore::open(&path).unwrap();
            store.insert(source("a")).await.unwrap();
            store.insert(source("b")).await.unwrap();
        }
        let store = SqliteSourceStore::open(&path).unwrap();
        let names: Vec<String> = store.all().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
