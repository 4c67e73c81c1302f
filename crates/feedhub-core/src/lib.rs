//! feedhub-core
//!
//! Shared vocabulary of the feedhub crates: records and data sources with
//! their cache rules, the error type, the parser/driver/store/ranker traits
//! and the layered configuration.

#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    into_records, AuthType, ConnectionTest, DataSource, Map, NewDataSource, RankedResult,
    Record, SourceConfig, SourceId, SourceType, Value,
};
