// src/predicate/structure.rs

//! Traversals that return XML rather than an attribute index.

use crate::types::ClientMetadata;
use crate::xml::Element;

fn is_structural(element: &Element) -> bool {
    element.tag == "Group" || element.tag == "Client"
}

/// Whether `item` survives for `metadata`: non-structural elements always
/// do, `Group`/`Client` only when membership (optionally negated) holds.
pub fn include_element(item: &Element, metadata: &ClientMetadata) -> bool {
    let negate = item.is_negated();
    match item.tag.as_str() {
        "Group" => negate != item.name().is_some_and(|g| metadata.in_group(g)),
        "Client" => negate != (item.name() == Some(metadata.hostname.as_str())),
        _ => true,
    }
}

/// Matching fragments of the document's top-level `entries`.
///
/// Structural wrappers that accept the client are flattened away; every
/// other accepted element is returned as a copy whose children are
/// themselves filtered the same way.
pub fn match_fragments(entries: &[Element], metadata: &ClientMetadata) -> Vec<Element> {
    entries
        .iter()
        .flat_map(|child| fragment(child, metadata))
        .collect()
}

fn fragment(item: &Element, metadata: &ClientMetadata) -> Vec<Element> {
    if !include_element(item, metadata) {
        return Vec::new();
    }
    if is_structural(item) {
        return match_fragments(&item.children, metadata);
    }
    let mut copy = item.shallow_copy();
    copy.children = match_fragments(&item.children, metadata);
    vec![copy]
}

/// A copy of the whole document pruned to what applies to `metadata`.
///
/// Rejected subtrees disappear; accepted `Group`/`Client` wrappers are
/// replaced in place by their (filtered) children.
pub fn xml_match(root: &Element, metadata: &ClientMetadata) -> Element {
    let mut pruned = root.shallow_copy();
    pruned.children = match_fragments(&root.children, metadata);
    pruned
}
