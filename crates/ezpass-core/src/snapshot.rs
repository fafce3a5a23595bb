//! A page snapshot that implements the DOM surface.
//!
//! Snapshots are plain JSON:
//!
//! ```json
//! {
//!   "url": "https://example.com/login",
//!   "body": {
//!     "tag": "body",
//!     "children": [
//!       { "tag": "input", "attributes": { "id": "u" }, "value": "" }
//!     ]
//!   }
//! }
//! ```
//!
//! Queries understand the four locator shapes the synthesizer emits.
//! Structural paths follow CSS child-combinator semantics: each level must
//! match the element's parent chain, and an element may carry more classes
//! than the locator lists.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use ezpass_protocols::{Document, Element, ElementRef, FieldLocator, LocatorShape, PathSegment};

/// Serialized page: address plus the body subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub body: SnapshotNode,
}

/// Serialized element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub tag: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    value: Mutex<String>,
    parent: Option<usize>,
    children: Vec<usize>,
    input_events: AtomicUsize,
}

/// Nodes in document order; index 0 is the body.
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn build(body: SnapshotNode) -> Self {
        let mut nodes = Vec::new();
        Self::push(body, None, &mut nodes);
        Self { nodes }
    }

    fn push(node: SnapshotNode, parent: Option<usize>, nodes: &mut Vec<Node>) -> usize {
        let index = nodes.len();
        nodes.push(Node {
            tag: node.tag.to_ascii_lowercase(),
            attributes: node.attributes,
            classes: node.classes,
            value: Mutex::new(node.value),
            parent,
            children: Vec::new(),
            input_events: AtomicUsize::new(0),
        });
        for child in node.children {
            let child_index = Self::push(child, Some(index), nodes);
            nodes[index].children.push(child_index);
        }
        index
    }

    fn snapshot(&self, index: usize) -> SnapshotNode {
        let node = &self.nodes[index];
        SnapshotNode {
            tag: node.tag.clone(),
            attributes: node.attributes.clone(),
            classes: node.classes.clone(),
            value: node.value.lock().clone(),
            children: node.children.iter().map(|&c| self.snapshot(c)).collect(),
        }
    }

    fn is_input(&self, index: usize) -> bool {
        self.nodes[index].tag == "input"
    }

    fn attribute(&self, index: usize, name: &str) -> Option<&str> {
        self.nodes[index].attributes.get(name).map(String::as_str)
    }

    fn matches(&self, index: usize, shape: &LocatorShape) -> bool {
        match shape {
            LocatorShape::Name(name) => {
                self.is_input(index) && self.attribute(index, "name") == Some(name.as_str())
            }
            LocatorShape::Id(id) => self.attribute(index, "id") == Some(id.as_str()),
            LocatorShape::PasswordInput => {
                self.is_input(index)
                    && self
                        .attribute(index, "type")
                        .is_some_and(|t| t.eq_ignore_ascii_case("password"))
            }
            LocatorShape::Path(segments) => self.matches_path(index, segments),
        }
    }

    fn matches_path(&self, index: usize, segments: &[PathSegment]) -> bool {
        let mut current = Some(index);
        for segment in segments.iter().rev() {
            let Some(idx) = current else {
                return false;
            };
            let node = &self.nodes[idx];
            if !node.tag.eq_ignore_ascii_case(&segment.tag)
                || !segment.classes.iter().all(|c| node.classes.contains(c))
            {
                return false;
            }
            current = node.parent;
        }
        true
    }
}

/// In-memory document built from a [`PageSnapshot`].
pub struct SnapshotDocument {
    url: Mutex<String>,
    tree: Arc<Tree>,
}

impl SnapshotDocument {
    pub fn from_snapshot(snapshot: PageSnapshot) -> Self {
        Self {
            url: Mutex::new(snapshot.url),
            tree: Arc::new(Tree::build(snapshot.body)),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    /// Current state, including values written since loading.
    pub fn to_snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            url: self.url.lock().clone(),
            body: self.tree.snapshot(0),
        }
    }

    /// Simulate a navigation that keeps the DOM (single-page-app route change).
    pub fn set_location(&self, url: impl Into<String>) {
        *self.url.lock() = url.into();
    }

    /// Every input element, in document order.
    pub fn inputs(&self) -> Vec<ElementRef> {
        (0..self.tree.nodes.len())
            .filter(|&i| self.tree.is_input(i))
            .map(|i| self.element(i))
            .collect()
    }

    /// Every input in document order, flagged when one of `locators`
    /// resolves to it.
    pub fn inputs_flagged(&self, locators: &[FieldLocator]) -> Vec<(ElementRef, bool)> {
        let flagged: Vec<usize> = locators.iter().filter_map(|l| self.find(l)).collect();
        (0..self.tree.nodes.len())
            .filter(|&i| self.tree.is_input(i))
            .map(|i| (self.element(i), flagged.contains(&i)))
            .collect()
    }

    /// Number of `input` events fired on the element `locator` resolves to.
    pub fn input_events(&self, locator: &FieldLocator) -> usize {
        self.find(locator)
            .map(|i| self.tree.nodes[i].input_events.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn find(&self, locator: &FieldLocator) -> Option<usize> {
        let shape = match locator.shape() {
            Ok(shape) => shape,
            Err(e) => {
                warn!("Cannot resolve locator: {}", e);
                return None;
            }
        };
        (0..self.tree.nodes.len()).find(|&i| self.tree.matches(i, &shape))
    }

    fn element(&self, index: usize) -> ElementRef {
        Arc::new(SnapshotElement {
            tree: Arc::clone(&self.tree),
            index,
        })
    }
}

impl Document for SnapshotDocument {
    fn location(&self) -> String {
        self.url.lock().clone()
    }

    fn query(&self, locator: &FieldLocator) -> Option<ElementRef> {
        self.find(locator).map(|i| self.element(i))
    }
}

struct SnapshotElement {
    tree: Arc<Tree>,
    index: usize,
}

impl SnapshotElement {
    fn node(&self) -> &Node {
        &self.tree.nodes[self.index]
    }
}

impl Element for SnapshotElement {
    fn tag_name(&self) -> String {
        self.node().tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.node().attributes.get(name).cloned()
    }

    fn class_list(&self) -> Vec<String> {
        self.node().classes.clone()
    }

    fn is_body(&self) -> bool {
        self.index == 0
    }

    fn parent(&self) -> Option<ElementRef> {
        self.node().parent.map(|index| {
            Arc::new(SnapshotElement {
                tree: Arc::clone(&self.tree),
                index,
            }) as ElementRef
        })
    }

    fn value(&self) -> String {
        self.node().value.lock().clone()
    }

    fn set_value(&self, value: &str) {
        *self.node().value.lock() = value.to_string();
    }

    fn dispatch_input_event(&self) {
        let count = self.node().input_events.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("input event on <{}> #{} (total {})", self.node().tag, self.index, count);
    }
}
