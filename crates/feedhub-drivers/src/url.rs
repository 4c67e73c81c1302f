use async_trait::async_trait;
use feedhub_core::traits::Driver;
use feedhub_core::types::config_str;
use feedhub_core::{DataSource, Record, Result, SourceConfig, SourceType};
use tracing::debug;

use crate::context::{detect_format, require_url, send, DriverContext};

const FAILURE: &str = "URL fetch failed";

/// Plain GET of `config.url`, parsed by `config.format` or by whatever the
/// response looks like.
pub struct UrlDriver {
    context: DriverContext,
}

impl UrlDriver {
    pub fn new(context: &DriverContext) -> Self {
        Self { context: context.clone() }
    }
}

#[async_trait]
impl Driver for UrlDriver {
    fn source_type(&self) -> SourceType {
        SourceType::Url
    }

    fn validate_config(&self, config: &SourceConfig) -> Result<()> {
        require_url(config, "URL")?;
        self.context.timeout_for(config)?;
        self.context.check_format(config)
    }

    async fn fetch(&self, source: &DataSource) -> Result<Vec<Record>> {
        self.validate_config(&source.config)?;
        let url = require_url(&source.config, "URL")?;
        let timeout = self.context.timeout_for(&source.config)?;
        debug!(source = source.id, %url, "url fetch");

        let request = self.context.http.get(url.clone()).timeout(timeout);
        let payload = send(request, "HTTP request").await.map_err(|e| e.into_fetch(FAILURE))?;

        let format = config_str(&source.config, "format").map_or_else(
            || detect_format(payload.content_type.as_deref(), &url, &self.context.parsers),
            str::to_string,
        );
        let parser = self.context.parsers.make(&format).map_err(|e| e.into_fetch(FAILURE))?;
        parser.parse(&payload.body).map_err(|e| e.into_fetch(FAILURE))
    }
}
