use feedhub_core::traits::Parser;
use feedhub_core::{into_records, Error, Record, Result, Value};

/// JSON payloads. A bare object becomes a one-record list.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self { Self }
}

impl Parser for JsonParser {
    fn parse(&self, content: &str) -> Result<Vec<Record>> {
        Ok(into_records(self.parse_document(content)?))
    }

    fn parse_document(&self, content: &str) -> Result<Value> {
        serde_json::from_str(content).map_err(|e| Error::Parse(format!("Invalid JSON: {e}")))
    }
}
