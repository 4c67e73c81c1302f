use ::csv::{ReaderBuilder, StringRecord};
use feedhub_core::traits::Parser;
use feedhub_core::{Error, Record, Result, Value};
use tracing::debug;

/// Comma separated rows keyed by the first non-blank line.
///
/// Rows are matched to headers by position; a row whose field count differs
/// from the header is dropped. Quoted fields may not span lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self { Self }
}

impl Parser for CsvParser {
    fn parse(&self, content: &str) -> Result<Vec<Record>> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        let joined = lines.join("\n");
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(joined.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| Error::Parse(format!("Invalid CSV header: {e}")))?
            .clone();

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|e| Error::Parse(format!("Invalid CSV row {}: {e}", index + 1)))?;
            if row.len() != headers.len() {
                debug!(row = index + 1, expected = headers.len(), got = row.len(), "dropping CSV row with mismatched field count");
                continue;
            }
            records.push(zip_row(&headers, &row));
        }
        Ok(records)
    }
}

fn zip_row(headers: &StringRecord, row: &StringRecord) -> Record {
    headers
        .iter()
        .zip(row.iter())
        .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
        .collect()
}
