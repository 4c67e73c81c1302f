use std::sync::Arc;

use async_trait::async_trait;
use feedhub_core::traits::{Driver, SqlExecutor};
use feedhub_core::types::config_str;
use feedhub_core::{DataSource, Error, Record, Result, SourceConfig, SourceType};
use tracing::debug;

use crate::context::DriverContext;

const FAILURE: &str = "Database query failed";

/// Runs `config.query` against `config.connection` (or the executor's
/// default connection) and returns one record per row.
pub struct DatabaseDriver {
    sql: Arc<dyn SqlExecutor>,
}

impl DatabaseDriver {
    pub fn new(context: &DriverContext) -> Self {
        Self { sql: Arc::clone(&context.sql) }
    }
}

#[async_trait]
impl Driver for DatabaseDriver {
    fn source_type(&self) -> SourceType {
        SourceType::Database
    }

    fn validate_config(&self, config: &SourceConfig) -> Result<()> {
        if config_str(config, "query").is_none() {
            return Err(Error::Config("Database source requires 'query' in config".to_string()));
        }
        match config.get("connection") {
            None | Some(serde_json::Value::Null | serde_json::Value::String(_)) => Ok(()),
            Some(_) => Err(Error::Config("'connection' must be a string".to_string())),
        }
    }

    async fn fetch(&self, source: &DataSource) -> Result<Vec<Record>> {
        self.validate_config(&source.config)?;
        let query = config_str(&source.config, "query").unwrap_or_default();
        let connection =
            config_str(&source.config, "connection").unwrap_or_else(|| self.sql.default_connection());
        debug!(source = source.id, connection, "database fetch");
        self.sql.select(connection, query).await.map_err(|e| e.into_fetch(FAILURE))
    }
}
