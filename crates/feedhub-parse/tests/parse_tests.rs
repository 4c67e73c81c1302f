use feedhub_core::traits::Parser;
use feedhub_core::{Record, Result, Value};
use feedhub_parse::ParserRegistry;
use serde_json::json;

fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object")
}

#[test]
fn json_round_trip_through_registry() {
    let parser = ParserRegistry::new().make("json").expect("json parser");
    let list = serde_json::to_string(&json!([{"a": 1}])).unwrap();
    let bare = serde_json::to_string(&json!({"a": 1})).unwrap();
    assert_eq!(parser.parse(&list).unwrap(), vec![record(json!({"a": 1}))]);
    assert_eq!(parser.parse(&bare).unwrap(), vec![record(json!({"a": 1}))]);
}

#[test]
fn csv_through_registry() {
    let parser = ParserRegistry::new().make("CSV").expect("csv parser");
    let records = parser.parse("title,body\nHello,World\n").unwrap();
    assert_eq!(records, vec![record(json!({"title": "Hello", "body": "World"}))]);
}

#[test]
fn txt_and_text_share_behaviour() {
    let registry = ParserRegistry::new();
    let a = registry.make("txt").unwrap().parse("x\ny").unwrap();
    let b = registry.make("text").unwrap().parse("x\ny").unwrap();
    assert_eq!(a, b);
}

struct PipeParser;

impl Parser for PipeParser {
    fn parse(&self, content: &str) -> Result<Vec<Record>> {
        Ok(content
            .lines()
            .filter_map(|line| line.split_once('|'))
            .map(|(k, v)| {
                let mut r = Record::new();
                r.insert(k.to_string(), json!(v));
                r
            })
            .collect())
    }
}

#[test]
fn custom_format_can_be_registered_and_replaced() {
    let registry = ParserRegistry::new();
    registry.register("Pipe", || Box::new(PipeParser));
    assert!(registry.supported_formats().contains("pipe"));
    let records = registry.make("pipe").unwrap().parse("k|v").unwrap();
    assert_eq!(records[0]["k"], json!("v"));

    // last registration wins, including for built-in names
    registry.register("json", || Box::new(PipeParser));
    let records = registry.make("json").unwrap().parse("a|b").unwrap();
    assert_eq!(records[0]["a"], json!("b"));
}

#[test]
fn default_document_view_is_a_list_of_records() {
    let doc = ParserRegistry::new().make("text").unwrap().parse_document("one\ntwo").unwrap();
    assert_eq!(doc, json!([{"text": "one"}, {"text": "two"}]));
}
