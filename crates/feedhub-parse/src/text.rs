use feedhub_core::traits::Parser;
use feedhub_core::{Record, Result, Value};

/// One `{"text": line}` record per non-blank line, trimmed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self { Self }
}

impl Parser for TextParser {
    fn parse(&self, content: &str) -> Result<Vec<Record>> {
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let mut record = Record::new();
                record.insert("text".to_string(), Value::String(line.to_string()));
                record
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_skipped_and_content_trimmed() {
        let records = TextParser.parse("  first \n\n   \r\nsecond\r\n").unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r["text"].as_str().unwrap()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(TextParser.parse("").unwrap().is_empty());
    }
}
