//! feedhub-service
//!
//! Cache-aware fetching of configured sources: single-source reads, the
//! aggregate feed across enabled sources, refresh runs and the stores that
//! keep source rows.
mod locks;
pub mod refresh;
pub mod service;
pub mod store;

pub use refresh::{RefreshReport, RefreshScope, SourceOutcome};
pub use service::{Aggregate, DataSourceService, Preview, ServiceOptions, SourceFailure, SourceStats};
pub use store::{MemorySourceStore, SqliteSourceStore};
