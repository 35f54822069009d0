//! Durable element identifiers.
//!
//! A [`Locator`] names an element either by its id or by the tag/sibling-index
//! path from the document root. [`ParentContext`] snapshots the first few
//! ancestors as plain data so replay can disambiguate candidates when the
//! direct locator no longer resolves.
//!
//! Resolution order (see [`resolve_element`]):
//!
//! 1. the recorded locator (`byId` lookup or structural walk)
//! 2. the recorded element id
//! 3. same tag + same class candidates whose ancestors match the parent context
//! 4. same tag + same `type` attribute, ignoring context
//!
//! Parent-context matching is a strict AND at every level: a wrong element
//! executed is worse than a skipped action.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::types::ElementHints;

/// Number of ancestor levels captured into a [`ParentContext`] list
pub const PARENT_CONTEXT_DEPTH: usize = 3;

/// Durable description of an element's position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum Locator {
    /// Authored id, preferred since it is position independent
    ById { id: String },
    /// Path from the document root, one step per element
    ByStructuralPath { steps: Vec<PathStep> },
}

/// One step of a structural path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStep {
    /// Lowercase tag name
    pub tag_name: String,
    /// Count of preceding siblings with the same tag (0-based)
    pub index: usize,
}

/// Read-only snapshot of one ancestor level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentContext {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Same-tag sibling index of this ancestor
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_context: Option<ListContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_context: Option<TableContext>,
}

/// Cardinality hint for `<ul>`/`<ol>` ancestors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContext {
    pub item_count: usize,
    /// `UL` or `OL`
    pub list_type: String,
}

/// Cardinality hint for `<table>` ancestors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableContext {
    pub rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<usize>,
}

impl Locator {
    pub fn by_id(id: impl Into<String>) -> Self {
        Locator::ById { id: id.into() }
    }

    /// Locator for a live element: its id when it has one, else its path
    pub fn capture(doc: &Document, node: NodeId) -> Self {
        match doc.id(node) {
            Some(id) => Locator::by_id(id),
            None => Self::structural_path(doc, node),
        }
    }

    /// Structural path from the document root down to `node`
    pub fn structural_path(doc: &Document, node: NodeId) -> Self {
        let mut steps = Vec::new();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            steps.push(PathStep {
                tag_name: doc.tag_name(current).to_string(),
                index: doc.same_tag_index(current),
            });
            cursor = doc.parent_element(current);
        }
        steps.reverse();
        Locator::ByStructuralPath { steps }
    }

    /// Direct resolution without any fallback
    pub fn resolve(&self, doc: &Document) -> Option<NodeId> {
        match self {
            Locator::ById { id } => doc.by_id(id),
            Locator::ByStructuralPath { steps } => {
                if steps.is_empty() {
                    return None;
                }
                let mut cursor = doc.document_node();
                for step in steps {
                    cursor = doc.child_by_tag(cursor, &step.tag_name, step.index)?;
                }
                Some(cursor)
            }
        }
    }

    /// XPath equivalent, for pages reached through WebDriver
    pub fn to_xpath(&self) -> String {
        match self {
            Locator::ById { id } => format!("//*[@id={}]", xpath_literal(id)),
            Locator::ByStructuralPath { steps } => steps
                .iter()
                .map(|step| format!("/{}[{}]", step.tag_name, step.index + 1))
                .collect(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::ById { id } => write!(f, "#{}", id),
            Locator::ByStructuralPath { .. } => write!(f, "{}", self.to_xpath()),
        }
    }
}

/// Snapshot up to [`PARENT_CONTEXT_DEPTH`] ancestors of `node`
pub fn parent_context(doc: &Document, node: NodeId) -> Vec<ParentContext> {
    let mut context = Vec::new();
    let mut parent = doc.parent_element(node);
    while let Some(current) = parent {
        if context.len() == PARENT_CONTEXT_DEPTH {
            break;
        }
        let tag_name = doc.tag_name(current).to_string();
        let list_context = matches!(tag_name.as_str(), "ul" | "ol").then(|| ListContext {
            item_count: doc.children(current).len(),
            list_type: tag_name.to_ascii_uppercase(),
        });
        let table_context = (tag_name == "table").then(|| table_shape(doc, current));
        context.push(ParentContext {
            id: doc.id(current).map(str::to_string),
            class_name: doc.class_name(current).map(str::to_string),
            index: doc.same_tag_index(current),
            tag_name,
            list_context,
            table_context,
        });
        parent = doc.parent_element(current);
    }
    context
}

fn table_shape(doc: &Document, table: NodeId) -> TableContext {
    let rows: Vec<NodeId> = doc
        .children(table)
        .iter()
        .flat_map(|child| match doc.tag_name(*child) {
            "tr" => vec![*child],
            "thead" | "tbody" | "tfoot" => doc
                .children(*child)
                .iter()
                .copied()
                .filter(|row| doc.tag_name(*row) == "tr")
                .collect(),
            _ => Vec::new(),
        })
        .collect();
    let cols = rows.first().map(|row| {
        doc.children(*row)
            .iter()
            .filter(|cell| matches!(doc.tag_name(**cell), "td" | "th"))
            .count()
    });
    TableContext {
        rows: rows.len(),
        cols,
    }
}

/// Whether `node`'s ancestors agree with every recorded context level
pub fn matches_parent_context(doc: &Document, node: NodeId, context: &[ParentContext]) -> bool {
    let mut ancestor = doc.parent_element(node);
    for level in context {
        let Some(current) = ancestor else {
            return false;
        };
        if doc.tag_name(current) != level.tag_name
            || level.id.as_deref().is_some_and(|id| doc.id(current) != Some(id))
            || level
                .class_name
                .as_deref()
                .is_some_and(|class| doc.class_name(current) != Some(class))
            || doc.same_tag_index(current) != level.index
        {
            return false;
        }
        ancestor = doc.parent_element(current);
    }
    true
}

/// Resolve an element through the full fallback chain
pub fn resolve_element(
    doc: &Document,
    locator: Option<&Locator>,
    hints: &ElementHints<'_>,
) -> Option<NodeId> {
    if let Some(node) = locator.and_then(|l| l.resolve(doc)) {
        return Some(node);
    }

    if let Some(node) = hints.element_id.and_then(|id| doc.by_id(id)) {
        debug!("Resolved element by recorded id");
        return Some(node);
    }

    let tag = hints.tag_name?;

    // With no recorded context every candidate passes the context filter
    if hints.class_name.is_some() || !hints.parent_context.is_empty() {
        let candidates: Vec<NodeId> = match hints.class_name {
            Some(class) => doc
                .by_class(class)
                .into_iter()
                .filter(|node| doc.tag_name(*node).eq_ignore_ascii_case(tag))
                .collect(),
            None => doc.by_tag(tag),
        };
        if let Some(node) = candidates
            .into_iter()
            .find(|node| matches_parent_context(doc, *node, hints.parent_context))
        {
            debug!("Resolved element by class and parent context");
            return Some(node);
        }
    }

    let element_type = hints.element_type?;
    let node = doc
        .by_tag(tag)
        .into_iter()
        .find(|node| doc.element_type(*node) == Some(element_type))?;
    debug!("Resolved element by tag and type");
    Some(node)
}

/// XPath selecting same tag/class candidates, constrained by parent context
/// when one was recorded
pub fn context_xpath(hints: &ElementHints<'_>) -> Option<String> {
    let tag = hints.tag_name?;
    if hints.class_name.is_none() && hints.parent_context.is_empty() {
        return None;
    }

    let mut predicate = String::new();
    for level in hints.parent_context.iter().rev() {
        let mut step = format!(
            "{tag}[count(preceding-sibling::{tag})={index}]",
            tag = level.tag_name,
            index = level.index
        );
        if let Some(id) = &level.id {
            step.push_str(&format!("[@id={}]", xpath_literal(id)));
        }
        if let Some(class) = &level.class_name {
            step.push_str(&format!("[@class={}]", xpath_literal(class)));
        }
        if !predicate.is_empty() {
            step.push_str(&format!("[{}]", predicate));
        }
        predicate = format!("parent::{}", step);
    }

    let mut xpath = format!("//{}", tag.to_ascii_lowercase());
    if let Some(class) = hints.class_name {
        for token in class.split_whitespace() {
            xpath.push_str(&format!(
                "[contains(concat(' ', normalize-space(@class), ' '), {})]",
                xpath_literal(&format!(" {} ", token))
            ));
        }
    }
    if !predicate.is_empty() {
        xpath.push_str(&format!("[{}]", predicate));
    }
    Some(xpath)
}

/// XPath selecting the first element with the recorded tag and `type`
pub fn type_xpath(hints: &ElementHints<'_>) -> Option<String> {
    let tag = hints.tag_name?;
    let element_type = hints.element_type?;
    Some(format!(
        "//{}[@type={}]",
        tag.to_ascii_lowercase(),
        xpath_literal(element_type)
    ))
}

/// Quote a string as an XPath 1.0 literal
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
#[path = "locator_test.rs"]
mod locator_test;
