// src/xml/parse.rs

use std::path::Path;

use crate::errors::{Result, SpoolError};
use crate::xml::Element;

/// Parse `data` and return its root element.
///
/// `path` is only used for error messages.
pub fn parse_element(data: &str, path: &Path) -> Result<Element> {
    let doc = roxmltree::Document::parse(data).map_err(|err| SpoolError::InitError {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    Ok(convert(doc.root_element()))
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    let mut element = Element::new(node.tag_name().name());
    element.namespace = node.tag_name().namespace().map(str::to_string);
    for attr in node.attributes() {
        element.set(attr.name(), attr.value());
    }
    element.text = node
        .text()
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string);
    element.children = node
        .children()
        .filter(|child| child.is_element())
        .map(convert)
        .collect();
    element
}
