//! Authenticated API driver.
//!
//! Supports `method`, `params` (query string for GET), `body` (JSON for
//! POST/PUT), verbatim `headers`, `auth_type` with its credentials, `format`
//! (default json) and a dot-separated `data_path` locating the record list
//! inside the response.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use feedhub_core::traits::Driver;
use feedhub_core::types::{config_str, into_records};
use feedhub_core::{AuthType, DataSource, Error, Record, Result, SourceConfig, SourceType, Value};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use tracing::debug;

use crate::context::{require_url, send, DriverContext, DEFAULT_FORMAT};

const FAILURE: &str = "API fetch failed";
const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

pub struct ApiDriver {
    context: DriverContext,
}

impl ApiDriver {
    pub fn new(context: &DriverContext) -> Self {
        Self { context: context.clone() }
    }

    fn request(&self, config: &SourceConfig) -> Result<RequestBuilder> {
        let url = require_url(config, "API")?;
        let method = method(config)?;
        let timeout = self.context.timeout_for(config)?;

        let mut request = self
            .context
            .http
            .request(method.clone(), url)
            .timeout(timeout)
            .headers(headers(config)?);
        if let Some((name, value)) = credential(auth_type(config)?, config)? {
            request = request.header(name, value);
        }

        if method == Method::GET {
            if let Some(params) = config.get("params").and_then(Value::as_object) {
                let pairs: Vec<(&str, String)> =
                    params.iter().map(|(k, v)| (k.as_str(), plain_text(v))).collect();
                request = request.query(&pairs);
            }
        } else if method == Method::POST || method == Method::PUT {
            let body = config.get("body").cloned().unwrap_or_else(|| Value::Object(Record::new()));
            request = request.json(&body);
        }
        Ok(request)
    }
}

#[async_trait]
impl Driver for ApiDriver {
    fn source_type(&self) -> SourceType {
        SourceType::Api
    }

    fn validate_config(&self, config: &SourceConfig) -> Result<()> {
        require_url(config, "API")?;
        method(config)?;
        credential(auth_type(config)?, config)?;
        headers(config)?;
        self.context.timeout_for(config)?;
        self.context.check_format(config)
    }

    async fn fetch(&self, source: &DataSource) -> Result<Vec<Record>> {
        self.validate_config(&source.config)?;
        let request = self.request(&source.config)?;
        debug!(source = source.id, "api fetch");

        let payload = send(request, "API request").await.map_err(|e| e.into_fetch(FAILURE))?;
        let format = config_str(&source.config, "format").unwrap_or(DEFAULT_FORMAT);
        let parser = self.context.parsers.make(format).map_err(|e| e.into_fetch(FAILURE))?;

        match config_str(&source.config, "data_path") {
            None => parser.parse(&payload.body).map_err(|e| e.into_fetch(FAILURE)),
            Some(path) => {
                let document =
                    parser.parse_document(&payload.body).map_err(|e| e.into_fetch(FAILURE))?;
                let located = extract_path(document, path).map_err(|e| e.into_fetch(FAILURE))?;
                Ok(into_records(located))
            }
        }
    }
}

fn method(config: &SourceConfig) -> Result<Method> {
    match config_str(config, "method").map(str::to_ascii_lowercase).as_deref() {
        None | Some("get") => Ok(Method::GET),
        Some("post") => Ok(Method::POST),
        Some("put") => Ok(Method::PUT),
        Some("delete") => Ok(Method::DELETE),
        Some(other) => Err(Error::Config(format!("Unsupported HTTP method: {other}"))),
    }
}

fn auth_type(config: &SourceConfig) -> Result<AuthType> {
    config_str(config, "auth_type").map_or(Ok(AuthType::None), str::parse)
}

/// Header carrying the credentials of `auth`. Absent credentials are sent empty.
fn credential(auth: AuthType, config: &SourceConfig) -> Result<Option<(HeaderName, HeaderValue)>> {
    let field = |key: &str| config_str(config, key).unwrap_or_default();
    let (name, value, key) = match auth {
        AuthType::None => return Ok(None),
        AuthType::Bearer => (AUTHORIZATION, format!("Bearer {}", field("token")), "token"),
        AuthType::OAuth2 => (AUTHORIZATION, format!("Bearer {}", field("access_token")), "access_token"),
        AuthType::Basic => {
            let pair = format!("{}:{}", field("username"), field("password"));
            (AUTHORIZATION, format!("Basic {}", BASE64.encode(pair)), "username")
        }
        AuthType::ApiKey => {
            let header = config_str(config, "api_key_header").unwrap_or(DEFAULT_API_KEY_HEADER);
            let name = HeaderName::from_bytes(header.as_bytes())
                .map_err(|_| Error::Config(format!("Invalid api_key_header: {header}")))?;
            (name, field("api_key").to_string(), "api_key")
        }
    };
    let mut value = HeaderValue::from_str(&value)
        .map_err(|_| Error::Config(format!("Invalid value for '{key}'")))?;
    value.set_sensitive(true);
    Ok(Some((name, value)))
}

fn headers(config: &SourceConfig) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    let Some(headers) = config.get("headers").filter(|v| !v.is_null()) else {
        return Ok(map);
    };
    let headers = headers
        .as_object()
        .ok_or_else(|| Error::Config("'headers' must be an object".to_string()))?;
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::Config(format!("Invalid header name: {name}")))?;
        let value = HeaderValue::from_str(&plain_text(value))
            .map_err(|_| Error::Config(format!("Invalid value for header {name}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Strings as-is, everything else in its JSON spelling.
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Walk `path` (dot-separated; numeric segments index arrays) into `document`.
fn extract_path(document: Value, path: &str) -> Result<Value> {
    let mut current = document;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(mut map) => map.remove(segment),
            Value::Array(mut items) => segment
                .parse::<usize>()
                .ok()
                .filter(|index| *index < items.len())
                .map(|index| items.swap_remove(index)),
            _ => return Err(Error::Fetch(format!("Invalid data path: {path}"))),
        };
        current = match next {
            Some(value) if !value.is_null() => value,
            _ => return Err(Error::Fetch(format!("Data path not found: {path}"))),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> SourceConfig {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn path_navigation() {
        let doc = json!({"data": {"items": [{"x": 1}, {"x": 2}], "total": 2, "none": null}});
        assert_eq!(extract_path(doc.clone(), "data.items").unwrap(), json!([{"x": 1}, {"x": 2}]));
        assert_eq!(extract_path(doc.clone(), "data.items.1").unwrap(), json!({"x": 2}));
        let missing = extract_path(doc.clone(), "data.missing").unwrap_err();
        assert_eq!(missing.to_string(), "Data path not found: data.missing");
        let null = extract_path(doc.clone(), "data.none").unwrap_err();
        assert_eq!(null.to_string(), "Data path not found: data.none");
        let scalar = extract_path(doc, "data.total.value").unwrap_err();
        assert_eq!(scalar.to_string(), "Invalid data path: data.total.value");
    }

    #[test]
    fn methods_are_case_insensitive() {
        assert_eq!(method(&config(json!({}))).unwrap(), Method::GET);
        assert_eq!(method(&config(json!({"method": "POST"}))).unwrap(), Method::POST);
        assert_eq!(method(&config(json!({"method": "delete"}))).unwrap(), Method::DELETE);
        assert!(matches!(method(&config(json!({"method": "patch"}))), Err(Error::Config(_))));
    }

    #[test]
    fn headers_are_validated() {
        let map = headers(&config(json!({"headers": {"Accept": "application/json", "X-Page": 2}}))).unwrap();
        assert_eq!(map["accept"], "application/json");
        assert_eq!(map["x-page"], "2");
        assert!(headers(&config(json!({"headers": ["Accept"]}))).is_err());
        assert!(headers(&config(json!({"headers": {"bad header": "x"}}))).is_err());
    }

    #[test]
    fn unknown_auth_type_is_rejected() {
        assert_eq!(auth_type(&config(json!({}))).unwrap(), AuthType::None);
        assert_eq!(auth_type(&config(json!({"auth_type": "API_KEY"}))).unwrap(), AuthType::ApiKey);
        assert!(matches!(auth_type(&config(json!({"auth_type": "digest"}))), Err(Error::Config(_))));
    }

    #[test]
    fn credentials_become_headers() {
        let (name, value) = credential(AuthType::Basic, &config(json!({"username": "user", "password": "pass"})))
            .unwrap()
            .unwrap();
        assert_eq!(name, AUTHORIZATION);
        assert_eq!(value, "Basic dXNlcjpwYXNz");
        let (name, value) = credential(AuthType::ApiKey, &config(json!({}))).unwrap().unwrap();
        assert_eq!(name.as_str(), "x-api-key");
        assert_eq!(value, "");
        assert!(credential(AuthType::None, &config(json!({"token": "t"}))).unwrap().is_none());
    }

    #[test]
    fn malformed_credentials_are_config_errors() {
        let err = credential(AuthType::ApiKey, &config(json!({"api_key": "k", "api_key_header": "bad header"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: Invalid api_key_header: bad header");
        let err = credential(AuthType::Bearer, &config(json!({"token": "line\nbreak"}))).unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: Invalid value for 'token'");
        let err = credential(AuthType::ApiKey, &config(json!({"api_key": "a\r\nb"}))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
