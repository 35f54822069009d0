//! Browser surface driven during playback.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::agent::AgentHandle;
use crate::types::TabId;

/// A tab as last reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// Tab operations a browser must offer for playback
///
/// Every call may fail: tabs get closed externally and navigations get
/// rejected. Callers decide which failures are fatal.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Open a new tab at `url`
    async fn create_tab(&self, url: &str, active: bool) -> Result<TabInfo>;

    /// Navigate an existing tab in place
    async fn update_tab(&self, tab: &TabId, url: &str) -> Result<TabInfo>;

    /// Bring a tab to the foreground
    async fn activate_tab(&self, tab: &TabId) -> Result<TabInfo>;

    /// Resolve once the tab reports load-complete, or fail after `ceiling`
    async fn wait_for_load(&self, tab: &TabId, ceiling: Duration) -> Result<()>;

    /// Live URL of the tab
    async fn current_url(&self, tab: &TabId) -> Result<String>;

    /// Channel to the page agent running in the tab's current document
    async fn agent(&self, tab: &TabId) -> Result<AgentHandle>;
}
