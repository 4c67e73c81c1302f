//! Layered configuration and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env
//! vars (`__` separates nested keys, e.g. `APP_SOURCES__HTTP_TIMEOUT=10`).
//! Keys missing from every layer take the defaults of [`Settings`].
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Build from an inline TOML document, without file or env layers.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let config = Self { figment: Figment::new().merge(Toml::string(toml)) };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.validate()?;
        match env {
            "prod" | "production" => {
                if settings.sources.max_items_per_source.is_none() {
                    return Err(anyhow::anyhow!(
                        "Prod config must cap sources.max_items_per_source"
                    ));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

/// Typed view over the merged configuration. Every key has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sources: SourceSettings,
    pub database: DatabaseSettings,
    pub store: StoreSettings,
    pub search: SearchSettings,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sources.http_timeout == 0 {
            return Err(anyhow::anyhow!("sources.http_timeout must be at least 1 second"));
        }
        if self.sources.max_concurrent_fetches == 0 {
            return Err(anyhow::anyhow!("sources.max_concurrent_fetches must be at least 1"));
        }
        if self.search.timeout == 0 {
            return Err(anyhow::anyhow!("search.timeout must be at least 1 second"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Seconds; applied to new sources that omit `cache_ttl`.
    pub default_cache_ttl: u64,
    /// Seconds; default request timeout of the url and api drivers.
    pub http_timeout: u64,
    pub max_items_per_source: Option<usize>,
    pub max_concurrent_fetches: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            default_cache_ttl: 3600,
            http_timeout: 30,
            max_items_per_source: None,
            max_concurrent_fetches: 8,
        }
    }
}

/// Named SQLite connections for the database driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub default: String,
    pub connections: BTreeMap<String, String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { default: "main".to_string(), connections: BTreeMap::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { path: "~/.feedhub/feedhub.sqlite".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub python: String,
    /// Virtual environment whose `bin/python3` runs the script.
    pub venv_path: Option<String>,
    pub script_path: String,
    pub timeout: u64,
    pub default_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            venv_path: None,
            script_path: "scripts/ai_search_api.py".to_string(),
            timeout: 60,
            default_limit: 5,
        }
    }
}

impl SearchSettings {
    pub fn python_command(&self, base: &Path) -> PathBuf {
        match self.venv_path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(venv) => resolve_with_base(base, venv).join("bin").join("python3"),
            None => PathBuf::from(&self.python),
        }
    }

    pub fn script(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.script_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
