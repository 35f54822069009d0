//! Capture pipeline.
//!
//! Turns raw page events into [`Action`]s. Raw events carry an
//! [`ElementSnapshot`] taken page-side at the instant the event fired, so
//! nothing here holds a live DOM handle: the parent context is plain data
//! from the start and needs no sanitizing before it is persisted.
//!
//! Scroll events are debounced: positions accumulate until movement pauses
//! for [`CaptureConfig::scroll_debounce`], then one `scroll` action is emitted
//! if the displacement from the last recorded position exceeds the threshold
//! on either axis. Same-document URL changes arrive as `urlChanged` events in
//! page order; the live URL is also compared on every observation tick, which
//! catches full document loads.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::delta::{self, Delta};
use crate::dom::{Document, NodeId};
use crate::locator::{self, Locator, ParentContext};
use crate::types::{Action, ActionKind, ChangeValue, TabId};

/// Tunables for the capture pipeline
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Minimum displacement on either axis for a scroll to be recorded
    pub scroll_threshold_px: f64,
    /// Quiet period after the last scroll movement
    pub scroll_debounce: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            scroll_threshold_px: 50.0,
            scroll_debounce: Duration::from_millis(150),
        }
    }
}

/// Plain-data view of the event target, taken when the event fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub locator: Locator,
    pub tag_name: String,
    #[serde(default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub parent_context: Vec<ParentContext>,
    #[serde(default)]
    pub value: Option<String>,
    /// Value the field held before this edit began (at focus, or the
    /// markup default)
    #[serde(default)]
    pub previous_value: Option<String>,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default)]
    pub cursor_position: Option<usize>,
}

impl ElementSnapshot {
    /// Snapshot an element of an in-memory document
    pub fn capture(doc: &Document, node: NodeId) -> Self {
        Self {
            locator: Locator::capture(doc, node),
            tag_name: doc.tag_name(node).to_string(),
            element_type: doc.element_type(node).map(str::to_string),
            element_id: doc.id(node).map(str::to_string),
            class_name: doc.class_name(node).map(str::to_string),
            parent_context: locator::parent_context(doc, node),
            value: Some(doc.value(node).to_string()),
            previous_value: Some(doc.default_value(node).to_string()),
            checked: Some(doc.checked(node)),
            cursor_position: Some(doc.selection(node)),
        }
    }

    fn is_text_field(&self) -> bool {
        matches!(self.tag_name.as_str(), "input" | "textarea") && !self.is_toggle()
    }

    fn is_toggle(&self) -> bool {
        matches!(self.element_type.as_deref(), Some("checkbox" | "radio"))
    }
}

/// Raw event as observed in the page (or by the host for tab events)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RawEvent {
    Click { target: ElementSnapshot },
    Input { target: ElementSnapshot },
    Change { target: ElementSnapshot },
    Scroll { x: f64, y: f64 },
    Submit { target: ElementSnapshot },
    TabCreated {
        tab: TabId,
        #[serde(default)]
        opener: Option<TabId>,
        #[serde(default)]
        url: Option<String>,
    },
    TabFocused { tab: TabId },
    /// Same-document URL change reported by the page
    UrlChanged { url: String },
}

#[derive(Debug, Clone)]
struct PendingScroll {
    x: f64,
    y: f64,
    last_movement_ms: f64,
    page_url: String,
}

/// Monotonic millisecond clock anchored at recording start
#[derive(Debug, Clone, Copy)]
pub struct CaptureClock {
    origin: Instant,
    offset_ms: f64,
}

impl CaptureClock {
    pub fn start() -> Self {
        Self::resume_at(0.0)
    }

    /// Clock that continues a recording whose last action was stamped at
    /// `offset_ms`
    pub fn resume_at(offset_ms: f64) -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: offset_ms.max(0.0),
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.offset_ms + self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Stateful converter from raw events to actions
#[derive(Debug, Default)]
pub struct CapturePipeline {
    config: CaptureConfig,
    last_values: HashMap<Locator, String>,
    last_scroll: (f64, f64),
    pending_scroll: Option<PendingScroll>,
    last_url: Option<String>,
    current_tab: Option<TabId>,
    last_captured_ms: f64,
}

impl CapturePipeline {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Forget all per-recording state
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Convert one raw event. Returns `None` for events that do not qualify
    /// (non-text input targets) or that are held back (scroll movement).
    pub fn observe(&mut self, event: RawEvent, page_url: &str, now_ms: f64) -> Option<Action> {
        if self.last_url.is_none() {
            self.last_url = Some(page_url.to_string());
        }

        let kind = match event {
            RawEvent::Click { target } => {
                let locator = target.locator.clone();
                let kind = ActionKind::Click {
                    tag_name: target.tag_name,
                    element_type: target.element_type,
                    element_id: target.element_id,
                    class_name: target.class_name,
                    parent_context: target.parent_context,
                };
                return Some(self.stamp(kind, Some(locator), page_url, now_ms));
            }
            RawEvent::Input { target } => {
                if !target.is_text_field() {
                    return None;
                }
                let current = target.value.clone().unwrap_or_default();
                let baseline = self
                    .last_values
                    .insert(target.locator.clone(), current.clone())
                    .or_else(|| target.previous_value.clone());
                // Without a known starting value only a full replacement
                // reproduces the field on replay
                let delta = match baseline {
                    Some(previous) => delta::diff(&previous, &current),
                    None => Delta::Replace(current.clone()),
                };
                debug!("Input delta {} on {}", delta.kind_name(), target.locator);
                let kind = ActionKind::Input {
                    cursor_position: target
                        .cursor_position
                        .unwrap_or_else(|| current.chars().count()),
                    tag_name: target.tag_name,
                    element_id: target.element_id,
                    class_name: target.class_name,
                    delta,
                };
                return Some(self.stamp(kind, Some(target.locator), page_url, now_ms));
            }
            RawEvent::Change { target } => {
                let value = if target.is_toggle() {
                    ChangeValue::Checked(target.checked.unwrap_or(false))
                } else {
                    ChangeValue::Text(target.value.clone().unwrap_or_default())
                };
                let kind = ActionKind::Change {
                    tag_name: target.tag_name,
                    element_type: target.element_type,
                    value,
                };
                return Some(self.stamp(kind, Some(target.locator), page_url, now_ms));
            }
            RawEvent::Submit { target } => {
                return Some(self.stamp(
                    ActionKind::FormSubmit,
                    Some(target.locator),
                    page_url,
                    now_ms,
                ));
            }
            RawEvent::Scroll { x, y } => {
                self.pending_scroll = Some(PendingScroll {
                    x,
                    y,
                    last_movement_ms: now_ms,
                    page_url: page_url.to_string(),
                });
                return None;
            }
            RawEvent::TabCreated { tab, opener, url } => ActionKind::TabCreate {
                url,
                tab_ref: Some(tab),
                opener_tab_ref: opener.or_else(|| self.current_tab.clone()),
            },
            RawEvent::UrlChanged { url } => return self.observe_url(&url, now_ms),
            RawEvent::TabFocused { tab } => {
                let from_tab_ref = self.current_tab.replace(tab.clone());
                ActionKind::TabFocus {
                    tab_ref: tab,
                    from_tab_ref,
                }
            }
        };
        Some(self.stamp(kind, None, page_url, now_ms))
    }

    /// Emit the pending scroll once movement has settled
    pub fn flush(&mut self, now_ms: f64) -> Option<Action> {
        let pending = self.pending_scroll.as_ref()?;
        let quiet_ms = self.config.scroll_debounce.as_secs_f64() * 1000.0;
        if now_ms - pending.last_movement_ms < quiet_ms {
            return None;
        }
        let pending = self.pending_scroll.take()?;

        let (last_x, last_y) = self.last_scroll;
        let threshold = self.config.scroll_threshold_px;
        if (pending.x - last_x).abs() <= threshold && (pending.y - last_y).abs() <= threshold {
            debug!("Scroll to ({}, {}) below threshold, dropped", pending.x, pending.y);
            return None;
        }

        self.last_scroll = (pending.x, pending.y);
        let kind = ActionKind::Scroll {
            x: pending.x,
            y: pending.y,
        };
        Some(self.stamp(kind, None, &pending.page_url, now_ms))
    }

    /// Emit the pending scroll without waiting out the debounce, as when
    /// recording stops
    pub fn finish(&mut self, now_ms: f64) -> Option<Action> {
        if let Some(pending) = self.pending_scroll.as_mut() {
            pending.last_movement_ms = f64::NEG_INFINITY;
        }
        self.flush(now_ms)
    }

    /// Compare the live URL with the last one seen; a difference is a navigation
    pub fn observe_url(&mut self, live_url: &str, now_ms: f64) -> Option<Action> {
        let previous = self.last_url.replace(live_url.to_string())?;
        if previous == live_url {
            return None;
        }
        let kind = ActionKind::Navigation {
            url: live_url.to_string(),
            from_url: Some(previous),
        };
        Some(self.stamp(kind, None, live_url, now_ms))
    }

    /// Reset the URL baseline without recording a navigation, as after a
    /// tab switch
    pub fn rebase_url(&mut self, url: &str) {
        self.last_url = Some(url.to_string());
    }

    /// Tab the recording is currently attributed to
    pub fn set_current_tab(&mut self, tab: Option<TabId>) {
        self.current_tab = tab;
    }

    fn stamp(&mut self, kind: ActionKind, locator: Option<Locator>, page_url: &str, now_ms: f64) -> Action {
        let captured_at_ms = now_ms.max(self.last_captured_ms);
        self.last_captured_ms = captured_at_ms;
        Action::new(kind, locator, captured_at_ms, page_url)
    }
}

#[cfg(test)]
#[path = "capture_test.rs"]
mod capture_test;
