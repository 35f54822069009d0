//! Input delta codec.
//!
//! Reconstructs keystroke-level typing from successive observed values of a
//! single field. Rules, in priority order:
//!
//! 1. current extends previous with a suffix -> `insertion(suffix)`
//! 2. current is previous with its tail cut -> `backspaceFromEnd(count)`
//! 3. any other shortening -> `deletion` carrying the whole previous value
//! 4. anything else -> `replace(current)`
//!
//! Lengths and counts are in characters, not bytes.

use serde::{Deserialize, Serialize};

/// Minimal edit between two observed values of one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "deltaKind", content = "deltaPayload", rename_all = "camelCase")]
pub enum Delta {
    /// Text appended at the end
    Insertion(String),
    /// Non-trailing deletion; the edit shape is ambiguous so replay writes
    /// the resulting value verbatim
    Deletion { previous: String, current: String },
    /// Number of characters removed from the end
    BackspaceFromEnd(usize),
    /// Full replacement value
    Replace(String),
}

/// Derive the delta that turns `previous` into `current`
pub fn diff(previous: &str, current: &str) -> Delta {
    let previous_len = previous.chars().count();
    let current_len = current.chars().count();

    if current_len > previous_len && current.starts_with(previous) {
        return Delta::Insertion(current[previous.len()..].to_string());
    }

    if current_len < previous_len {
        if previous.starts_with(current) {
            return Delta::BackspaceFromEnd(previous_len - current_len);
        }
        return Delta::Deletion {
            previous: previous.to_string(),
            current: current.to_string(),
        };
    }

    Delta::Replace(current.to_string())
}

/// Apply a recorded delta to the element's live value
pub fn apply(live: &str, delta: &Delta) -> String {
    match delta {
        Delta::Insertion(suffix) => format!("{}{}", live, suffix),
        Delta::BackspaceFromEnd(count) => {
            let keep = live.chars().count().saturating_sub(*count);
            live.chars().take(keep).collect()
        }
        Delta::Deletion { current, .. } => current.clone(),
        Delta::Replace(value) => value.clone(),
    }
}

impl Delta {
    /// Wire name of the delta kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Delta::Insertion(_) => "insertion",
            Delta::Deletion { .. } => "deletion",
            Delta::BackspaceFromEnd(_) => "backspaceFromEnd",
            Delta::Replace(_) => "replace",
        }
    }
}

#[cfg(test)]
#[path = "delta_test.rs"]
mod delta_test;
