// src/predicate/mod.rs

//! Group/Client/Path predicates over client metadata.
//!
//! A document's nested `<Group>`/`<Client>` (and, for per-path metadata,
//! `<Path>`) elements compile into a [`PredicateTree`]; evaluating it for a
//! client yields the leaf items that apply ([`MatchSet`]). The functions in
//! [`structure`] walk the XML directly instead and return matching
//! fragments or a pruned document.

pub mod structure;
pub mod tree;

pub use structure::{include_element, match_fragments, xml_match};
pub use tree::{ItemData, ItemKey, MatchSet, NodeId, PredicateNode, PredicateTree, TreeKind};

use crate::errors::{Result, SpoolError};
use crate::types::ClientMetadata;
use crate::xml::Element;

/// Boolean test over (client, target entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    True,
    GroupIs(String),
    ClientIs(String),
    /// Target entry's `name` or `realname` equals the value.
    PathIs(String),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Compile one structural container into its own test.
    ///
    /// Fails with [`SpoolError::UnknownTag`] if `tag` is not a container of
    /// the given tree kind.
    pub fn container(tag: &str, name: &str, negate: bool, kind: TreeKind) -> Result<Self> {
        if !kind.containers().contains(&tag) {
            return Err(SpoolError::UnknownTag(tag.to_string()));
        }
        let test = match tag {
            "Group" => Predicate::GroupIs(name.to_string()),
            "Client" => Predicate::ClientIs(name.to_string()),
            "Path" => Predicate::PathIs(name.to_string()),
            other => return Err(SpoolError::UnknownTag(other.to_string())),
        };
        Ok(if negate {
            Predicate::Not(Box::new(test))
        } else {
            test
        })
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::True => other,
            this => Predicate::And(Box::new(this), Box::new(other)),
        }
    }

    pub fn evaluate(&self, metadata: &ClientMetadata, entry: Option<&Element>) -> bool {
        match self {
            Predicate::True => true,
            Predicate::GroupIs(group) => metadata.in_group(group),
            Predicate::ClientIs(host) => metadata.hostname == *host,
            Predicate::PathIs(path) => entry.is_some_and(|e| {
                e.name() == Some(path.as_str()) || e.get("realname") == Some(path.as_str())
            }),
            Predicate::Not(inner) => !inner.evaluate(metadata, entry),
            Predicate::And(lhs, rhs) => {
                lhs.evaluate(metadata, entry) && rhs.evaluate(metadata, entry)
            }
        }
    }
}
