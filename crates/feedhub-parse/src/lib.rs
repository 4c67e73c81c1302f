//! feedhub-parse
//!
//! Format parsers turning raw payloads into records, and the registry that
//! resolves a format name to a parser.
pub mod csv;
pub mod json;
pub mod registry;
pub mod rss;
pub mod text;
pub mod xml;

pub use self::csv::CsvParser;
pub use json::JsonParser;
pub use registry::{ParserFactory, ParserRegistry};
pub use rss::RssParser;
pub use text::TextParser;
pub use xml::XmlParser;
