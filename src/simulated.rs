//! In-process browser.
//!
//! Tabs are [`Document`]s built by per-URL page factories, each served by a
//! [`DomAgent`] task. Used to exercise playback without a WebDriver session
//! and to script failure modes (closed tabs, rejected navigations, pages the
//! agent cannot run in).

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::agent::{AgentHandle, AgentTrace, DomAgent, spawn_agent};
use crate::dom::{Document, ReadyState, SharedDocument};
use crate::host::{TabHost, TabInfo};
use crate::types::TabId;

/// Builds the document served at a URL
pub type PageFactory = Arc<dyn Fn(&str) -> Document + Send + Sync>;

/// Host operation, in the order the simulated browser received them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Create { url: String },
    Update { tab: TabId, url: String },
    Activate { tab: TabId },
}

struct SimTab {
    document: SharedDocument,
    agent: AgentHandle,
}

pub struct SimulatedBrowser {
    pages: DashMap<String, PageFactory>,
    tabs: DashMap<TabId, SimTab>,
    next_tab: AtomicU64,
    calls: Mutex<Vec<HostCall>>,
    reject_updates: AtomicBool,
    reject_creates: AtomicBool,
    agent_latency: Duration,
    journal_tx: mpsc::UnboundedSender<AgentTrace>,
    journal_rx: Mutex<mpsc::UnboundedReceiver<AgentTrace>>,
    traces: Mutex<Vec<AgentTrace>>,
}

impl Default for SimulatedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBrowser {
    pub fn new() -> Self {
        let (journal_tx, journal_rx) = mpsc::unbounded_channel();
        Self {
            pages: DashMap::new(),
            tabs: DashMap::new(),
            next_tab: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            reject_updates: AtomicBool::new(false),
            reject_creates: AtomicBool::new(false),
            agent_latency: Duration::ZERO,
            journal_tx,
            journal_rx: Mutex::new(journal_rx),
            traces: Mutex::new(Vec::new()),
        }
    }

    /// Serve documents built by `factory` at `url`; unknown URLs get a blank page
    pub fn with_page<F>(self, url: &str, factory: F) -> Self
    where
        F: Fn(&str) -> Document + Send + Sync + 'static,
    {
        self.pages.insert(url.to_string(), Arc::new(factory));
        self
    }

    /// Time each page agent spends per action
    pub fn with_agent_latency(mut self, latency: Duration) -> Self {
        self.agent_latency = latency;
        self
    }

    /// Make in-place navigations fail, as when a tab was closed externally
    pub fn reject_updates(&self, reject: bool) {
        self.reject_updates.store(reject, Ordering::SeqCst);
    }

    /// Make tab creation fail
    pub fn reject_creates(&self, reject: bool) {
        self.reject_creates.store(reject, Ordering::SeqCst);
    }

    /// Close a tab behind the coordinator's back
    pub fn close_tab(&self, tab: &TabId) -> bool {
        self.tabs.remove(tab).is_some()
    }

    pub fn document(&self, tab: &TabId) -> Option<SharedDocument> {
        self.tabs.get(tab).map(|t| t.document.clone())
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        let mut ids: Vec<TabId> = self.tabs.iter().map(|t| t.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Every action the page agents executed so far, in execution order
    pub fn traces(&self) -> Vec<AgentTrace> {
        let mut traces = match self.traces.lock() {
            Ok(t) => t,
            Err(_) => return Vec::new(),
        };
        if let Ok(mut rx) = self.journal_rx.lock() {
            while let Ok(trace) = rx.try_recv() {
                traces.push(trace);
            }
        }
        traces.clone()
    }

    fn record(&self, call: HostCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn load(&self, url: &str) -> Document {
        match self.pages.get(url) {
            Some(factory) => factory(url),
            None => Document::new(url),
        }
    }

    fn snapshot(&self, tab: &TabId) -> Result<TabInfo> {
        let entry = self.tabs.get(tab).with_context(|| format!("No tab with id {}", tab))?;
        let url = entry
            .document
            .lock()
            .map_err(|_| anyhow::anyhow!("document lock poisoned"))?
            .url()
            .to_string();
        Ok(TabInfo {
            id: tab.clone(),
            url,
        })
    }
}

#[async_trait]
impl TabHost for SimulatedBrowser {
    async fn create_tab(&self, url: &str, _active: bool) -> Result<TabInfo> {
        self.record(HostCall::Create {
            url: url.to_string(),
        });
        if self.reject_creates.load(Ordering::SeqCst) {
            anyhow::bail!("tab creation rejected");
        }

        let id = TabId(format!("tab-{}", self.next_tab.fetch_add(1, Ordering::SeqCst)));
        let document = self.load(url).into_shared();
        let agent = spawn_agent(
            DomAgent::new(document.clone())
                .with_latency(self.agent_latency)
                .with_journal(self.journal_tx.clone()),
        );
        self.tabs.insert(id.clone(), SimTab { document, agent });
        debug!("Simulated tab {} opened at {}", id, url);
        self.snapshot(&id)
    }

    async fn update_tab(&self, tab: &TabId, url: &str) -> Result<TabInfo> {
        self.record(HostCall::Update {
            tab: tab.clone(),
            url: url.to_string(),
        });
        if self.reject_updates.load(Ordering::SeqCst) {
            anyhow::bail!("navigation of tab {} rejected", tab);
        }
        let document = self
            .document(tab)
            .with_context(|| format!("No tab with id {}", tab))?;
        let next = self.load(url);
        *document
            .lock()
            .map_err(|_| anyhow::anyhow!("document lock poisoned"))? = next;
        self.snapshot(tab)
    }

    async fn activate_tab(&self, tab: &TabId) -> Result<TabInfo> {
        self.record(HostCall::Activate { tab: tab.clone() });
        self.snapshot(tab)
    }

    async fn wait_for_load(&self, tab: &TabId, ceiling: Duration) -> Result<()> {
        let document = self
            .document(tab)
            .with_context(|| format!("No tab with id {}", tab))?;
        let poll = async {
            loop {
                let complete = document
                    .lock()
                    .map(|d| d.ready_state() == ReadyState::Complete)
                    .unwrap_or(false);
                if complete {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(ceiling, poll)
            .await
            .map_err(|_| anyhow::anyhow!("tab {} did not finish loading", tab))
    }

    async fn current_url(&self, tab: &TabId) -> Result<String> {
        Ok(self.snapshot(tab)?.url)
    }

    async fn agent(&self, tab: &TabId) -> Result<AgentHandle> {
        self.tabs
            .get(tab)
            .map(|t| t.agent.clone())
            .with_context(|| format!("No tab with id {}", tab))
    }
}
