//! `SourceStore` implementations.
mod memory;
mod sqlite;

pub use memory::MemorySourceStore;
pub use sqlite::SqliteSourceStore;

use feedhub_core::{Error, SourceId};

pub(crate) fn missing(id: SourceId) -> Error {
    Error::NotFound(format!("data source {id}"))
}
