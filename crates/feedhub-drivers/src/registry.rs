//! Source type to driver resolution.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use feedhub_core::traits::Driver;
use feedhub_core::{Error, Result};
use feedhub_parse::ParserRegistry;

use crate::context::DriverContext;
use crate::{ApiDriver, DatabaseDriver, UrlDriver};

pub type DriverFactory = Arc<dyn Fn(&DriverContext) -> Box<dyn Driver> + Send + Sync>;

/// Driver factories keyed by source type. Every lookup builds a fresh driver
/// from the shared context; the last registration for a type wins.
pub struct DriverRegistry {
    context: DriverContext,
    factories: RwLock<HashMap<String, DriverFactory>>,
}

impl DriverRegistry {
    /// Registry without any drivers.
    pub fn empty(context: DriverContext) -> Self {
        Self { context, factories: RwLock::new(HashMap::new()) }
    }

    /// Registry with the database, url and api drivers.
    pub fn new(context: DriverContext) -> Self {
        let registry = Self::empty(context);
        registry.register("database", |ctx| Box::new(DatabaseDriver::new(ctx)));
        registry.register("url", |ctx| Box::new(UrlDriver::new(ctx)));
        registry.register("api", |ctx| Box::new(ApiDriver::new(ctx)));
        registry
    }

    pub fn register<F>(&self, source_type: &str, factory: F)
    where
        F: Fn(&DriverContext) -> Box<dyn Driver> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source_type.to_string(), Arc::new(factory));
    }

    pub fn driver(&self, source_type: &str) -> Result<Box<dyn Driver>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_type)
            .cloned()
            .ok_or_else(|| Error::UnknownType(source_type.to_string()))?;
        Ok(factory(&self.context))
    }

    pub fn available_types(&self) -> BTreeSet<String> {
        self.factories.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    pub fn context(&self) -> &DriverContext {
        &self.context
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.context.parsers
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry").field("types", &self.available_types()).finish()
    }
}
