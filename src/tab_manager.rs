use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::ReplayError;
use crate::host::{TabHost, TabInfo};
use crate::types::TabId;

/// Timings the coordinator applies around tab loads
#[derive(Debug, Clone)]
pub struct TabTimings {
    /// Grace period after load-complete for dynamic content to render
    pub post_load_settle: Duration,
    /// Longest wait for a tab to report load-complete
    pub load_ceiling: Duration,
}

impl Default for TabTimings {
    fn default() -> Self {
        Self {
            post_load_settle: Duration::from_millis(1500),
            load_ceiling: Duration::from_secs(30),
        }
    }
}

/// Owns the identity of the single playback tab
///
/// Only the coordinator creates, re-adopts or forgets the playback tab, and
/// only it sets or clears the navigation-in-progress flag.
pub struct TabCoordinator<H: TabHost + ?Sized> {
    host: Arc<H>,
    timings: TabTimings,
    playback_tab: Option<TabInfo>,
    navigating: bool,
    /// Recording-time tab refs -> tabs opened during this playback
    recorded_tabs: HashMap<TabId, TabId>,
}

impl<H: TabHost + ?Sized> TabCoordinator<H> {
    pub fn new(host: Arc<H>, timings: TabTimings) -> Self {
        Self {
            host,
            timings,
            playback_tab: None,
            navigating: false,
            recorded_tabs: HashMap::new(),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// The tracked playback tab, if any
    pub fn playback_tab(&self) -> Option<&TabInfo> {
        self.playback_tab.as_ref()
    }

    /// Make the playback tab show `url`: create it, or navigate it in place
    /// and fall back to a fresh tab when the update is rejected
    pub async fn ensure(&mut self, url: &str) -> Result<TabInfo, ReplayError> {
        let tab = match self.playback_tab.clone() {
            None => self.create(url).await?,
            Some(existing) => match self.host.update_tab(&existing.id, url).await {
                Ok(tab) => {
                    debug!("Navigated playback tab {} to {}", tab.id, url);
                    self.navigating = true;
                    tab
                }
                Err(e) => {
                    warn!(
                        "Updating playback tab {} failed ({:#}), opening a new one",
                        existing.id, e
                    );
                    self.create(url).await?
                }
            },
        };

        self.adopt(tab.clone());
        self.await_load(&tab.id)
            .await
            .map_err(|e| ReplayError::TabProvisioning(format!("{:#}", e)))?;
        Ok(self.refresh().await.unwrap_or(tab))
    }

    /// Open a tab for a recorded `tabCreate` and make it the playback tab
    pub async fn open_tab(
        &mut self,
        url: Option<&str>,
        recorded_ref: Option<&TabId>,
    ) -> Result<TabInfo, ReplayError> {
        let tab = self.create_recorded(url, recorded_ref).await?;
        self.await_opened(&tab.id).await?;
        Ok(tab)
    }

    /// Create the tab for a recorded `tabCreate` and adopt it, without
    /// waiting for it to load
    pub async fn create_recorded(
        &mut self,
        url: Option<&str>,
        recorded_ref: Option<&TabId>,
    ) -> Result<TabInfo, ReplayError> {
        let url = url.unwrap_or("about:blank");
        let tab = self
            .host
            .create_tab(url, true)
            .await
            .map_err(|e| ReplayError::TabAction(format!("cannot create tab for {}: {:#}", url, e)))?;
        info!("Opened tab {} at {}", tab.id, url);

        if let Some(recorded) = recorded_ref {
            self.recorded_tabs.insert(recorded.clone(), tab.id.clone());
        }
        self.adopt(tab.clone());
        self.navigating = true;
        Ok(tab)
    }

    /// Bring back a tab an earlier attempt already opened and wait for it
    /// to finish loading. No new tab is created.
    pub async fn reopen(&mut self, tab: &TabId) -> Result<TabInfo, ReplayError> {
        let tab = self
            .host
            .activate_tab(tab)
            .await
            .map_err(|e| ReplayError::TabAction(format!("cannot return to tab {}: {:#}", tab, e)))?;
        debug!("Returned to tab {}", tab.id);
        self.adopt(tab.clone());
        self.await_opened(&tab.id).await?;
        Ok(tab)
    }

    /// Wait for a tab opened by [`Self::create_recorded`] to load
    pub async fn await_opened(&mut self, tab: &TabId) -> Result<(), ReplayError> {
        self.await_load(tab)
            .await
            .map_err(|e| ReplayError::TabAction(format!("{:#}", e)))
    }

    /// Activate the tab playback opened for a recorded tab ref
    pub async fn focus(&mut self, recorded_ref: &TabId) -> Result<TabInfo, ReplayError> {
        let target = self
            .recorded_tabs
            .get(recorded_ref)
            .cloned()
            .unwrap_or_else(|| recorded_ref.clone());
        let tab = self
            .host
            .activate_tab(&target)
            .await
            .map_err(|e| ReplayError::TabAction(format!("cannot focus tab {}: {:#}", recorded_ref, e)))?;
        debug!("Focused tab {} (recorded as {})", tab.id, recorded_ref);
        self.adopt(tab.clone());
        Ok(tab)
    }

    /// Check if we need to navigate (URL is different from current)
    pub fn should_navigate(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        match &self.playback_tab {
            Some(tab) => !same_url(&tab.url, url),
            None => true,
        }
    }

    /// Flag that the last dispatched action is expected to load a new document
    pub fn mark_navigating(&mut self) {
        self.navigating = true;
    }

    pub fn is_navigating(&self) -> bool {
        self.navigating
    }

    /// If a navigation is in flight, wait for the tab to finish loading
    pub async fn settle_navigation(&mut self) -> Result<(), ReplayError> {
        if !self.navigating {
            return Ok(());
        }
        let Some(tab) = self.playback_tab.clone() else {
            self.navigating = false;
            return Ok(());
        };
        self.await_load(&tab.id)
            .await
            .map_err(|e| ReplayError::AgentUnavailable(format!("{:#}", e)))?;
        self.refresh().await;
        Ok(())
    }

    /// Re-read the playback tab's live URL
    pub async fn refresh(&mut self) -> Option<TabInfo> {
        let tab = self.playback_tab.as_mut()?;
        match self.host.current_url(&tab.id).await {
            Ok(url) => tab.url = url,
            Err(e) => debug!("Could not read URL of tab {}: {:#}", tab.id, e),
        }
        Some(tab.clone())
    }

    /// Forget the playback tab at the end of a run
    pub fn release(&mut self) -> Option<TabInfo> {
        self.navigating = false;
        self.recorded_tabs.clear();
        self.playback_tab.take()
    }

    async fn create(&mut self, url: &str) -> Result<TabInfo, ReplayError> {
        let tab = self
            .host
            .create_tab(url, true)
            .await
            .map_err(|e| ReplayError::TabProvisioning(format!("cannot create tab for {}: {:#}", url, e)))?;
        info!("Created playback tab {} at {}", tab.id, url);
        self.navigating = true;
        Ok(tab)
    }

    fn adopt(&mut self, tab: TabInfo) {
        self.playback_tab = Some(tab);
    }

    /// Wait for load-complete, clear the navigation flag, then let dynamic
    /// content settle
    async fn await_load(&mut self, tab: &TabId) -> anyhow::Result<()> {
        self.host.wait_for_load(tab, self.timings.load_ceiling).await?;
        self.navigating = false;
        tokio::time::sleep(self.timings.post_load_settle).await;
        Ok(())
    }
}

/// Compare two URLs after normalization; unparsable URLs compare verbatim
pub fn same_url(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
#[path = "tab_manager_test.rs"]
mod tab_manager_test;
