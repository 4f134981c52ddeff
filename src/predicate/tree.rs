// src/predicate/tree.rs

use std::collections::BTreeMap;

use tracing::trace;

use crate::errors::{Result, SpoolError};
use crate::predicate::Predicate;
use crate::types::ClientMetadata;
use crate::xml::Element;

/// Index of a node inside a [`PredicateTree`].
pub type NodeId = usize;

/// Leaf items are keyed by their `name` attribute, which may be absent
/// (e.g. `<Info owner="root"/>`).
pub type ItemKey = Option<String>;

/// `tag → name → data` for every leaf item that applies.
pub type MatchSet = BTreeMap<String, BTreeMap<ItemKey, ItemData>>;

/// Everything a leaf item carries over to the entry it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemData {
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl ItemData {
    fn from_element(element: &Element) -> Self {
        Self {
            attributes: element.attributes.clone(),
            text: element.text.clone(),
            children: element.children.clone(),
        }
    }
}

/// Which element tags act as structural containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    /// `Group` and `Client`.
    Standard,
    /// `Group`, `Client` and `Path` (per-path metadata documents).
    PathAware,
}

impl TreeKind {
    pub fn containers(self) -> &'static [&'static str] {
        match self {
            TreeKind::Standard => &["Group", "Client"],
            TreeKind::PathAware => &["Group", "Client", "Path"],
        }
    }

    pub fn is_container(self, tag: &str) -> bool {
        self.containers().contains(&tag)
    }
}

#[derive(Debug, Clone)]
pub struct PredicateNode {
    /// `None` for the document root.
    pub tag: Option<String>,
    pub target: Option<String>,
    pub negate: bool,
    /// This node's test AND every ancestor's.
    pub predicate: Predicate,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub contents: MatchSet,
}

/// Compiled container hierarchy of one document.
///
/// Nodes live in a flat arena; each stores its parent's id. The tree is
/// immutable once built and rebuilt wholesale whenever the document is
/// reloaded.
#[derive(Debug, Clone)]
pub struct PredicateTree {
    kind: TreeKind,
    nodes: Vec<PredicateNode>,
    /// Every item name seen, per tag, in document order.
    items: BTreeMap<String, Vec<ItemKey>>,
}

impl PredicateTree {
    pub const ROOT: NodeId = 0;

    /// Compile `root` (the document element) depth-first.
    pub fn build(root: &Element, kind: TreeKind) -> Result<Self> {
        let mut tree = Self {
            kind,
            nodes: vec![PredicateNode {
                tag: None,
                target: None,
                negate: false,
                predicate: Predicate::True,
                parent: None,
                children: Vec::new(),
                contents: MatchSet::new(),
            }],
            items: BTreeMap::new(),
        };
        tree.load_children(Self::ROOT, root)?;
        Ok(tree)
    }

    fn add_container(&mut self, parent: NodeId, element: &Element) -> Result<NodeId> {
        let Some(name) = element.name() else {
            return Err(SpoolError::InitError {
                path: element.to_string(),
                message: format!("<{}> container without a name attribute", element.tag),
            });
        };
        let negate = element.is_negated();
        let own = Predicate::container(&element.tag, name, negate, self.kind)?;
        let predicate = self.nodes[parent].predicate.clone().and(own);

        let id = self.nodes.len();
        self.nodes.push(PredicateNode {
            tag: Some(element.tag.clone()),
            target: Some(name.to_string()),
            negate,
            predicate,
            parent: Some(parent),
            children: Vec::new(),
            contents: MatchSet::new(),
        });
        self.nodes[parent].children.push(id);
        self.load_children(id, element)?;
        Ok(id)
    }

    fn load_children(&mut self, id: NodeId, element: &Element) -> Result<()> {
        for item in &element.children {
            if self.kind.is_container(&item.tag) {
                self.add_container(id, item)?;
                continue;
            }
            let key: ItemKey = item.name().map(str::to_string);
            self.nodes[id]
                .contents
                .entry(item.tag.clone())
                .or_default()
                .insert(key.clone(), ItemData::from_element(item));
            self.items.entry(item.tag.clone()).or_default().push(key);
        }
        Ok(())
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    pub fn node(&self, id: NodeId) -> Option<&PredicateNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1 && self.nodes[Self::ROOT].contents.is_empty()
    }

    pub fn items(&self) -> &BTreeMap<String, Vec<ItemKey>> {
        &self.items
    }

    /// Container chain from `id` up to (excluding) the root.
    pub fn ancestry(&self, id: NodeId) -> Vec<&PredicateNode> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|i| self.nodes.get(i)) {
            if node.tag.is_some() {
                chain.push(node);
            }
            current = node.parent;
        }
        chain
    }

    /// Collect all items that apply to `metadata` (and `entry`, for `Path`
    /// containers). Items from deeper containers overwrite same-named items
    /// from their ancestors.
    pub fn evaluate(&self, metadata: &ClientMetadata, entry: Option<&Element>) -> MatchSet {
        let mut out = MatchSet::new();
        self.evaluate_node(Self::ROOT, metadata, entry, &mut out);
        out
    }

    fn evaluate_node(
        &self,
        id: NodeId,
        metadata: &ClientMetadata,
        entry: Option<&Element>,
        out: &mut MatchSet,
    ) {
        let node = &self.nodes[id];
        if !node.predicate.evaluate(metadata, entry) {
            trace!(node = id, "predicate rejected");
            return;
        }
        for (tag, items) in &node.contents {
            let merged = out.entry(tag.clone()).or_default();
            for (name, data) in items {
                merged.insert(name.clone(), data.clone());
            }
        }
        for child in &node.children {
            self.evaluate_node(*child, metadata, entry, out);
        }
    }
}
