use serde::{Deserialize, Serialize};
use std::fmt;

use crate::delta::Delta;
use crate::locator::{Locator, ParentContext};

/// Output format for CLI results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format for programmatic consumption
    #[default]
    Json,
    /// One line per action
    Simple,
}

/// Identifier of a browser tab, as reported by the host that owns it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        TabId(value.to_string())
    }
}

/// One recorded user interaction
///
/// Serialized as a flat object: the kind tag and kind-specific fields sit
/// next to the common `locator`, `capturedAtMs` and `pageUrl` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    /// Monotonic capture time, only used to derive inter-action delay
    pub captured_at_ms: f64,
    /// URL of the page the action was observed on
    pub page_url: String,
}

/// Kind-specific payload of an [`Action`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionKind {
    Click {
        tag_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class_name: Option<String>,
        #[serde(default)]
        parent_context: Vec<ParentContext>,
    },
    Input {
        tag_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class_name: Option<String>,
        /// Serialized inline as `deltaKind` + `deltaPayload`
        #[serde(flatten)]
        delta: Delta,
        /// Caret position after the edit, in characters
        cursor_position: usize,
    },
    Change {
        tag_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_type: Option<String>,
        value: ChangeValue,
    },
    Scroll {
        x: f64,
        y: f64,
    },
    Navigation {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_url: Option<String>,
    },
    FormSubmit,
    TabCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Recording-time id of the created tab
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_ref: Option<TabId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opener_tab_ref: Option<TabId>,
    },
    TabFocus {
        tab_ref: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_tab_ref: Option<TabId>,
    },
}

/// Committed value of a `change` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeValue {
    /// Checkbox and radio state
    Checked(bool),
    /// Select, text and everything else
    Text(String),
}

impl ChangeValue {
    pub fn as_checked(&self) -> bool {
        match self {
            ChangeValue::Checked(checked) => *checked,
            ChangeValue::Text(text) => text == "true" || text == "on",
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ChangeValue::Checked(checked) => checked.to_string(),
            ChangeValue::Text(text) => text.clone(),
        }
    }
}

/// The element fields of an action that feed the locator fallback chain
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementHints<'a> {
    pub tag_name: Option<&'a str>,
    pub element_id: Option<&'a str>,
    pub class_name: Option<&'a str>,
    pub element_type: Option<&'a str>,
    pub parent_context: &'a [ParentContext],
}

impl Action {
    pub fn new(kind: ActionKind, locator: Option<Locator>, captured_at_ms: f64, page_url: &str) -> Self {
        Self {
            kind,
            locator,
            captured_at_ms,
            page_url: page_url.to_string(),
        }
    }

    /// Wire name of the action kind
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ActionKind::Click { .. } => "click",
            ActionKind::Input { .. } => "input",
            ActionKind::Change { .. } => "change",
            ActionKind::Scroll { .. } => "scroll",
            ActionKind::Navigation { .. } => "navigation",
            ActionKind::FormSubmit => "formSubmit",
            ActionKind::TabCreate { .. } => "tabCreate",
            ActionKind::TabFocus { .. } => "tabFocus",
        }
    }

    /// Tab actions are carried out by the host, never by the page agent
    pub fn is_tab_action(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::TabCreate { .. } | ActionKind::TabFocus { .. }
        )
    }

    /// Actions after which the page is expected to load a new document
    pub fn starts_navigation(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::Navigation { .. } | ActionKind::FormSubmit
        )
    }

    /// URL the playback tab must show before this action is dispatched
    pub fn destination(&self) -> &str {
        match &self.kind {
            ActionKind::Navigation { url, .. } => url,
            _ => &self.page_url,
        }
    }

    /// One-line human summary used by `--format simple`
    pub fn summary(&self) -> String {
        let target = match (&self.kind, &self.locator) {
            (ActionKind::Navigation { url, .. }, _) => url.clone(),
            (ActionKind::Scroll { x, y }, _) => format!("({}, {})", x, y),
            (ActionKind::TabCreate { url, .. }, _) => url.clone().unwrap_or_default(),
            (ActionKind::TabFocus { tab_ref, .. }, _) => tab_ref.to_string(),
            (_, Some(locator)) => locator.to_string(),
            (_, None) => String::new(),
        };
        format!("{:>10.1}ms  {:<10} {}", self.captured_at_ms, self.kind_name(), target)
            .trim_end()
            .to_string()
    }

    pub fn hints(&self) -> ElementHints<'_> {
        match &self.kind {
            ActionKind::Click {
                tag_name,
                element_type,
                element_id,
                class_name,
                parent_context,
            } => ElementHints {
                tag_name: Some(tag_name),
                element_id: element_id.as_deref(),
                class_name: class_name.as_deref(),
                element_type: element_type.as_deref(),
                parent_context,
            },
            ActionKind::Input {
                tag_name,
                element_id,
                class_name,
                ..
            } => ElementHints {
                tag_name: Some(tag_name),
                element_id: element_id.as_deref(),
                class_name: class_name.as_deref(),
                ..Default::default()
            },
            ActionKind::Change {
                tag_name,
                element_type,
                ..
            } => ElementHints {
                tag_name: Some(tag_name),
                element_type: element_type.as_deref(),
                ..Default::default()
            },
            ActionKind::FormSubmit => ElementHints {
                tag_name: Some("form"),
                ..Default::default()
            },
            _ => ElementHints::default(),
        }
    }
}

/// Numbered listing of `actions`, one [`Action::summary`] per line
pub fn render_script(actions: &[Action]) -> String {
    actions
        .iter()
        .enumerate()
        .map(|(i, action)| format!("{:>3}. {}", i + 1, action.summary()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
