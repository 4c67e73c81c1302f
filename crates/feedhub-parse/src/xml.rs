use feedhub_core::traits::Parser;
use feedhub_core::{into_records, Error, Map, Record, Result, Value};
use roxmltree::{Document, Node, ParsingOptions};

pub(crate) const ATTRIBUTES_KEY: &str = "@attributes";
pub(crate) const TEXT_KEY: &str = "#text";

/// Parse with DTDs allowed; feeds in the wild still ship doctype lines.
pub(crate) fn parse_tree(content: &str) -> std::result::Result<Document<'_>, roxmltree::Error> {
    let options = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    Document::parse_with_options(content, options)
}

/// Generic XML. The root element becomes one record whose fields are its
/// children: repeated child names collect into a list, attributes sit under
/// `@attributes`, and leaf elements become their text.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlParser;

impl XmlParser {
    pub fn new() -> Self { Self }
}

impl Parser for XmlParser {
    fn parse(&self, content: &str) -> Result<Vec<Record>> {
        Ok(into_records(self.parse_document(content)?))
    }

    fn parse_document(&self, content: &str) -> Result<Value> {
        let doc = parse_tree(content).map_err(|e| Error::Parse(format!("XML parsing failed: {e}")))?;
        Ok(element_to_value(doc.root_element()))
    }
}

fn element_to_value(node: Node<'_, '_>) -> Value {
    let mut fields = Map::new();

    let attributes: Map<String, Value> = node
        .attributes()
        .map(|a| (a.name().to_string(), Value::String(a.value().to_string())))
        .collect();
    if !attributes.is_empty() {
        fields.insert(ATTRIBUTES_KEY.to_string(), Value::Object(attributes));
    }

    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            push_child(&mut fields, child.tag_name().name(), element_to_value(child));
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }

    let text = text.trim();
    if fields.is_empty() {
        return if text.is_empty() { Value::Object(fields) } else { Value::String(text.to_string()) };
    }
    if !text.is_empty() {
        fields.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }
    Value::Object(fields)
}

// Element values are never arrays themselves, so an existing array means
// the name has already repeated.
fn push_child(fields: &mut Map<String, Value>, name: &str, value: Value) {
    match fields.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name.to_string(), value);
        }
    }
}
