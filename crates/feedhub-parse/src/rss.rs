use feedhub_core::traits::Parser;
use feedhub_core::{Error, Record, Result, Value};
use roxmltree::Node;

use crate::xml::parse_tree;

const ITEM_FIELDS: [&str; 4] = ["title", "description", "link", "pubDate"];

/// RSS 2.0 channel items. Every record has all four item fields; absent ones
/// are empty strings. A document without a channel yields no records.
#[derive(Debug, Default, Clone, Copy)]
pub struct RssParser;

impl RssParser {
    pub fn new() -> Self { Self }
}

impl Parser for RssParser {
    fn parse(&self, content: &str) -> Result<Vec<Record>> {
        let doc = parse_tree(content).map_err(|e| Error::Parse(format!("RSS parsing failed: {e}")))?;
        let Some(channel) = doc.root_element().children().find(|n| n.has_tag_name("channel")) else {
            return Ok(Vec::new());
        };
        Ok(channel.children().filter(|n| n.has_tag_name("item")).map(item_record).collect())
    }
}

fn item_record(item: Node<'_, '_>) -> Record {
    ITEM_FIELDS
        .iter()
        .map(|field| (field.to_string(), Value::String(child_text(item, field))))
        .collect()
}

fn child_text(node: Node<'_, '_>, name: &str) -> String {
    node.children()
        .find(|n| n.has_tag_name(name))
        .map(|n| n.descendants().filter(Node::is_text).filter_map(|t| t.text()).collect())
        .unwrap_or_default()
}
