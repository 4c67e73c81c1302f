//! Format name to parser resolution.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use feedhub_core::traits::Parser;
use feedhub_core::{Error, Result};

use crate::{CsvParser, JsonParser, RssParser, TextParser, XmlParser};

pub type ParserFactory = Arc<dyn Fn() -> Box<dyn Parser> + Send + Sync>;

/// Registry of parser factories keyed by lowercase format name.
///
/// Registration is additive and the last registration for a name wins.
/// Lookups are case-insensitive.
pub struct ParserRegistry {
    factories: RwLock<HashMap<String, ParserFactory>>,
}

impl ParserRegistry {
    /// Registry without any formats.
    pub fn empty() -> Self {
        Self { factories: RwLock::new(HashMap::new()) }
    }

    /// Registry with json, xml, csv, rss, text and txt.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register("json", || Box::new(JsonParser::new()));
        registry.register("xml", || Box::new(XmlParser::new()));
        registry.register("csv", || Box::new(CsvParser::new()));
        registry.register("rss", || Box::new(RssParser::new()));
        registry.register("text", || Box::new(TextParser::new()));
        registry.register("txt", || Box::new(TextParser::new()));
        registry
    }

    pub fn register<F>(&self, format: &str, factory: F)
    where
        F: Fn() -> Box<dyn Parser> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(format.to_lowercase(), Arc::new(factory));
    }

    pub fn make(&self, format: &str) -> Result<Box<dyn Parser>> {
        let key = format.to_lowercase();
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or(Error::UnsupportedFormat(key))?;
        Ok(factory())
    }

    pub fn supports(&self, format: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&format.to_lowercase())
    }

    pub fn supported_formats(&self) -> BTreeSet<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry").field("formats", &self.supported_formats()).finish()
    }
}
