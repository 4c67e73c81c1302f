//! SQLite-backed SQL execution for the database driver.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use feedhub_core::config::{resolve_with_base, DatabaseSettings};
use feedhub_core::traits::SqlExecutor;
use feedhub_core::{Error, Record, Result, Value};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

/// Named SQLite files opened read-only per query.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    default: String,
    connections: HashMap<String, PathBuf>,
}

impl SqliteExecutor {
    pub fn new(default: impl Into<String>) -> Self {
        Self { default: default.into(), connections: HashMap::new() }
    }

    pub fn with_connection(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.connections.insert(name.into(), path.into());
        self
    }

    /// Relative connection paths are resolved against `base`.
    pub fn from_settings(settings: &DatabaseSettings, base: &Path) -> Self {
        settings
            .connections
            .iter()
            .fold(Self::new(settings.default.clone()), |executor, (name, path)| {
                executor.with_connection(name.clone(), resolve_with_base(base, path))
            })
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    fn default_connection(&self) -> &str {
        &self.default
    }

    async fn select(&self, connection: &str, query: &str) -> Result<Vec<Record>> {
        let path = self
            .connections
            .get(connection)
            .cloned()
            .ok_or_else(|| Error::Fetch(format!("Unknown database connection: {connection}")))?;
        debug!(connection, path = %path.display(), "running query");
        let query = query.to_string();
        tokio::task::spawn_blocking(move || select_rows(&path, &query))
            .await
            .map_err(|e| Error::Fetch(format!("query task failed: {e}")))?
    }
}

fn select_rows(path: &Path, query: &str) -> Result<Vec<Record>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(sql_error)?;
    let mut stmt = conn.prepare(query).map_err(sql_error)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([]).map_err(sql_error)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(sql_error)? {
        let mut record = Record::new();
        for (index, name) in columns.iter().enumerate() {
            let value = row.get_ref(index).map_err(sql_error)?;
            record.insert(name.clone(), column_value(value));
        }
        records.push(record);
    }
    Ok(records)
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

fn sql_error(e: rusqlite::Error) -> Error {
    Error::Fetch(e.to_string())
}
