//! feedhub-drivers
//!
//! Drivers for the built-in source kinds (SQL query, URL, authenticated API)
//! and the registry resolving a source type to a driver.
pub mod api;
pub mod context;
pub mod database;
pub mod registry;
pub mod sql;
pub mod url;

pub use api::ApiDriver;
pub use context::DriverContext;
pub use database::DatabaseDriver;
pub use registry::{DriverFactory, DriverRegistry};
pub use sql::SqliteExecutor;
pub use self::url::UrlDriver;
