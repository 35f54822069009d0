//! In-memory page model.
//!
//! An arena of element nodes rooted at a synthetic document node. It is the
//! surface the locator resolves against and the simulated page agent mutates,
//! so it carries just enough state to replay interactions: attributes, form
//! values, checked state, selection, focus, scroll offset and a log of the
//! events dispatched into it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Document shared between a simulated tab and its page agent
pub type SharedDocument = Arc<Mutex<Document>>;

/// Handle to a node inside one [`Document`]. Never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Mirror of `document.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// Kinds of events the page has seen dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEventKind {
    Click,
    Input,
    Change,
    Submit,
    Focus,
}

/// One dispatched event and its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub kind: DomEventKind,
    pub target: NodeId,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag_name: String,
    pub attrs: BTreeMap<String, String>,
    pub value: String,
    pub checked: bool,
    pub selection: usize,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    element: Element,
}

const DOCUMENT_TAG: &str = "#document";

#[derive(Debug, Clone)]
pub struct Document {
    url: String,
    nodes: Vec<Node>,
    id_index: HashMap<String, NodeId>,
    ready_state: ReadyState,
    agent_installed: bool,
    scroll: (f64, f64),
    focused: Option<NodeId>,
    events: Vec<DomEvent>,
}

impl Document {
    /// Create a loaded document with `<html>`, `<head>` and `<body>`
    pub fn new(url: &str) -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            element: Element::new(DOCUMENT_TAG),
        };
        let mut doc = Self {
            url: url.to_string(),
            nodes: vec![root],
            id_index: HashMap::new(),
            ready_state: ReadyState::Complete,
            agent_installed: true,
            scroll: (0.0, 0.0),
            focused: None,
            events: Vec::new(),
        };
        let html = doc.append(doc.document_node(), "html");
        doc.append(html, "head");
        doc.append(html, "body");
        doc
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Same-document URL change (history.pushState, hash change)
    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    /// Whether an in-page agent can run on this document
    pub fn agent_installed(&self) -> bool {
        self.agent_installed
    }

    pub fn set_agent_installed(&mut self, installed: bool) {
        self.agent_installed = installed;
    }

    pub(crate) fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    pub fn html(&self) -> NodeId {
        self.nodes[0].children[0]
    }

    pub fn body(&self) -> NodeId {
        self.child_by_tag(self.html(), "body", 0)
            .unwrap_or_else(|| self.html())
    }

    /// Append a new element as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, tag_name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            element: Element::new(tag_name),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append an element and set its attributes in one call
    pub fn append_with(&mut self, parent: NodeId, tag_name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.append(parent, tag_name);
        for (name, value) in attrs {
            self.set_attr(id, name, value);
        }
        id
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if name == "id" {
            if let Some(old) = self.nodes[node.0].element.attrs.get("id").cloned() {
                self.id_index.remove(&old);
            }
            if !value.is_empty() {
                self.id_index.entry(value.to_string()).or_insert(node);
            }
        }
        if name == "value" {
            self.nodes[node.0].element.value = value.to_string();
        }
        if name == "checked" {
            self.nodes[node.0].element.checked = true;
        }
        self.nodes[node.0]
            .element
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn element(&self, node: NodeId) -> &Element {
        &self.nodes[node.0].element
    }

    pub fn tag_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].element.tag_name
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0]
            .element
            .attrs
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn id(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "id")
    }

    pub fn class_name(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "class")
    }

    pub fn element_type(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "type")
    }

    /// Parent element, `None` for `<html>`
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0]
            .parent
            .filter(|p| *p != self.document_node())
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Number of preceding siblings sharing this element's tag
    pub fn same_tag_index(&self, node: NodeId) -> usize {
        let Some(parent) = self.nodes[node.0].parent else {
            return 0;
        };
        let tag = self.tag_name(node);
        self.children(parent)
            .iter()
            .take_while(|sibling| **sibling != node)
            .filter(|sibling| self.tag_name(**sibling) == tag)
            .count()
    }

    /// The `index`-th child of `parent` with the given tag
    pub fn child_by_tag(&self, parent: NodeId, tag_name: &str, index: usize) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|child| self.tag_name(*child).eq_ignore_ascii_case(tag_name))
            .nth(index)
    }

    /// `document.getElementById`
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    /// All elements in document order
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.document_node()];
        while let Some(node) = stack.pop() {
            if node != self.document_node() {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// `document.getElementsByTagName`
    pub fn by_tag(&self, tag_name: &str) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|node| self.tag_name(*node).eq_ignore_ascii_case(tag_name))
            .collect()
    }

    /// `document.getElementsByClassName`: every class token must be present
    pub fn by_class(&self, class_name: &str) -> Vec<NodeId> {
        let wanted: Vec<&str> = class_name.split_whitespace().collect();
        if wanted.is_empty() {
            return Vec::new();
        }
        self.elements()
            .into_iter()
            .filter(|node| {
                let classes: Vec<&str> = self
                    .class_name(*node)
                    .map(|c| c.split_whitespace().collect())
                    .unwrap_or_default();
                wanted.iter().all(|w| classes.contains(w))
            })
            .collect()
    }

    pub fn value(&self, node: NodeId) -> &str {
        &self.nodes[node.0].element.value
    }

    /// Value the markup declared, before any edits
    pub fn default_value(&self, node: NodeId) -> &str {
        self.attr(node, "value").unwrap_or("")
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) {
        let element = &mut self.nodes[node.0].element;
        element.value = value.to_string();
        element.selection = value.chars().count();
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.nodes[node.0].element.checked
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        self.nodes[node.0].element.checked = checked;
    }

    /// Caret position in characters
    pub fn selection(&self, node: NodeId) -> usize {
        self.nodes[node.0].element.selection
    }

    pub fn set_selection(&mut self, node: NodeId, position: usize) {
        let element = &mut self.nodes[node.0].element;
        element.selection = position.min(element.value.chars().count());
    }

    pub fn focus(&mut self, node: NodeId) {
        self.focused = Some(node);
        self.dispatch(DomEventKind::Focus, node);
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn scroll_position(&self) -> (f64, f64) {
        self.scroll
    }

    pub fn scroll_to(&mut self, x: f64, y: f64) {
        self.scroll = (x.max(0.0), y.max(0.0));
    }

    pub fn dispatch(&mut self, kind: DomEventKind, target: NodeId) {
        self.events.push(DomEvent { kind, target });
    }

    pub fn events(&self) -> &[DomEvent] {
        &self.events
    }

    /// Closest ancestor-or-self with the given tag
    pub fn closest(&self, node: NodeId, tag_name: &str) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.tag_name(current).eq_ignore_ascii_case(tag_name) {
                return Some(current);
            }
            cursor = self.parent_element(current);
        }
        None
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }
}

impl Element {
    fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            value: String::new(),
            checked: false,
            selection: 0,
        }
    }
}

#[cfg(test)]
#[path = "dom_test.rs"]
mod dom_test;
