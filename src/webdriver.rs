//! WebDriver-backed browser.
//!
//! One WebDriver session hosts every tab of a run. A session has a single
//! "current window", so every command is issued while holding the
//! [`Windows`] focus lock after switching to the target tab. Page agents run
//! as their own tasks and go through the same lock, which keeps one action
//! in flight per session.
//!
//! Recording injects [`RECORDER_SCRIPT`] into each tab. It buffers raw events
//! in `window.__webreplay_events` (mirrored to `sessionStorage` so clicks that
//! navigate away are not lost) until the host drains them. Same-document URL
//! changes (`pushState`, `replaceState`, history traversal, hash changes and
//! DOM swaps seen by a `MutationObserver`) are buffered in order with the
//! other events as `urlChanged`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use fantoccini::elements::Element;
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::agent::{AgentHandle, PageAgent, spawn_agent};
use crate::capture::RawEvent;
use crate::delta;
use crate::errors::ReplayError;
use crate::host::{TabHost, TabInfo};
use crate::locator::{self, Locator};
use crate::types::{Action, ActionKind, TabId};
use crate::webdriver_manager::GLOBAL_DRIVER_MANAGER;

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    /// Mozilla Firefox
    #[default]
    Firefox,
    /// Google Chrome/Chromium
    Chrome,
}

impl std::str::FromStr for BrowserType {
    type Err = anyhow::Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            _ => anyhow::bail!("Unsupported browser: {}", s),
        }
    }
}

/// Listener script installed in every recorded page. Idempotent.
pub const RECORDER_SCRIPT: &str = r#"
(function () {
    if (window.__webreplay_recorder) return true;
    window.__webreplay_recorder = true;

    let buffer = window.__webreplay_events || [];
    try {
        const saved = sessionStorage.getItem('__webreplay_events');
        if (saved) buffer = JSON.parse(saved).concat(buffer);
    } catch (e) {}
    window.__webreplay_events = buffer;

    function save() {
        try {
            sessionStorage.setItem('__webreplay_events', JSON.stringify(window.__webreplay_events));
        } catch (e) {}
    }
    function push(event) {
        event.pageUrl = window.location.href;
        window.__webreplay_events.push(event);
        save();
    }

    function sameTagIndex(el) {
        let index = 0;
        for (let s = el.previousElementSibling; s; s = s.previousElementSibling) {
            if (s.tagName === el.tagName) index++;
        }
        return index;
    }
    function locator(el) {
        if (el.id) return { strategy: 'byId', id: el.id };
        const steps = [];
        for (let n = el; n && n.nodeType === 1; n = n.parentElement) {
            steps.unshift({ tagName: n.tagName.toLowerCase(), index: sameTagIndex(n) });
        }
        return { strategy: 'byStructuralPath', steps: steps };
    }
    function parentContext(el) {
        const context = [];
        for (let p = el.parentElement; p && context.length < 3; p = p.parentElement) {
            const tag = p.tagName.toLowerCase();
            const level = { tagName: tag, index: sameTagIndex(p) };
            if (p.id) level.id = p.id;
            const cls = p.getAttribute('class');
            if (cls) level.className = cls;
            if (tag === 'ul' || tag === 'ol') {
                level.listContext = { itemCount: p.children.length, listType: tag.toUpperCase() };
            }
            if (tag === 'table') {
                level.tableContext = { rows: p.rows.length };
                if (p.rows.length) level.tableContext.cols = p.rows[0].cells.length;
            }
            context.push(level);
        }
        return context;
    }
    const baselines = new WeakMap();
    function previousValue(el) {
        if (baselines.has(el)) return baselines.get(el);
        return typeof el.defaultValue === 'string' ? el.defaultValue : undefined;
    }
    function snapshot(el) {
        const s = {
            locator: locator(el),
            tagName: el.tagName.toLowerCase(),
            parentContext: parentContext(el)
        };
        const type = el.getAttribute('type');
        if (type) s.elementType = type;
        if (el.id) s.elementId = el.id;
        const cls = el.getAttribute('class');
        if (cls) s.className = cls;
        if (typeof el.value === 'string') s.value = el.value;
        const previous = previousValue(el);
        if (typeof previous === 'string') s.previousValue = previous;
        if (typeof el.checked === 'boolean') s.checked = el.checked;
        try {
            if (typeof el.selectionStart === 'number') {
                s.cursorPosition = Array.from(el.value.slice(0, el.selectionStart)).length;
            }
        } catch (e) {}
        return s;
    }

    document.addEventListener('focusin', function (e) {
        if (e.target && typeof e.target.value === 'string') baselines.set(e.target, e.target.value);
    }, true);
    ['click', 'input', 'change', 'submit'].forEach(function (type) {
        document.addEventListener(type, function (e) {
            const el = e.target;
            if (!el || el.nodeType !== 1) return;
            push({ type: type, target: snapshot(el) });
            if (type === 'input' && typeof el.value === 'string') baselines.set(el, el.value);
        }, true);
    });

    let lastUrl = window.location.href;
    function checkUrl() {
        const url = window.location.href;
        if (url === lastUrl) return;
        lastUrl = url;
        push({ type: 'urlChanged', url: url });
    }
    ['pushState', 'replaceState'].forEach(function (name) {
        const original = history[name];
        history[name] = function () {
            const result = original.apply(this, arguments);
            checkUrl();
            return result;
        };
    });
    window.addEventListener('popstate', checkUrl);
    window.addEventListener('hashchange', checkUrl);
    new MutationObserver(checkUrl).observe(document, { childList: true, subtree: true });
    window.addEventListener('scroll', function () {
        const event = { type: 'scroll', x: window.scrollX, y: window.scrollY, pageUrl: window.location.href };
        const events = window.__webreplay_events;
        if (events.length && events[events.length - 1].type === 'scroll') {
            events[events.length - 1] = event;
            save();
        } else {
            push(event);
        }
    }, { passive: true });
    return true;
})();
"#;

const DRAIN_SCRIPT: &str = r#"
const installed = !!window.__webreplay_recorder;
const events = window.__webreplay_events || [];
window.__webreplay_events = [];
try { sessionStorage.removeItem('__webreplay_events'); } catch (e) {}
return { installed: installed, url: window.location.href, events: events };
"#;

/// Raw event together with the URL of the page that produced it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEvent {
    pub page_url: String,
    #[serde(flatten)]
    pub event: RawEvent,
}

/// Events drained from one tab
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageBatch {
    /// Whether the recorder was still present (false after a full load)
    pub installed: bool,
    pub url: String,
    pub events: Vec<PageEvent>,
}

/// Window bookkeeping shared by the browser and its page agents
pub struct Windows {
    client: Client,
    handles: DashMap<TabId, WindowHandle>,
    current: Mutex<Option<TabId>>,
    next_tab: AtomicU64,
}

impl Windows {
    fn new(client: Client) -> Self {
        Self {
            client,
            handles: DashMap::new(),
            current: Mutex::new(None),
            next_tab: AtomicU64::new(1),
        }
    }

    fn register(&self, handle: WindowHandle) -> TabId {
        let tab = TabId(format!("tab-{}", self.next_tab.fetch_add(1, Ordering::SeqCst)));
        self.handles.insert(tab.clone(), handle);
        tab
    }

    fn knows(&self, handle: &WindowHandle) -> bool {
        self.handles.iter().any(|entry| entry.value() == handle)
    }

    /// Switch the session to `tab` and hold it there until the guard drops
    async fn enter(&self, tab: &TabId) -> Result<MutexGuard<'_, Option<TabId>>> {
        let mut current = self.current.lock().await;
        if current.as_ref() != Some(tab) {
            let handle = self
                .handles
                .get(tab)
                .map(|h| h.value().clone())
                .with_context(|| format!("No tab with id {}", tab))?;
            self.client
                .switch_to_window(handle)
                .await
                .with_context(|| format!("Tab {} is no longer open", tab))?;
            *current = Some(tab.clone());
        }
        Ok(current)
    }

    async fn ready_state(&self, tab: &TabId) -> Result<String> {
        let _guard = self.enter(tab).await?;
        let state = self
            .client
            .execute("return document.readyState;", vec![])
            .await?;
        Ok(state.as_str().unwrap_or_default().to_string())
    }
}

/// Browser instance for WebDriver automation
pub struct Browser {
    windows: Arc<Windows>,
    browser_type: BrowserType,
    agents: DashMap<TabId, AgentHandle>,
    /// Window the session opened with, handed to the first tab
    spare: std::sync::Mutex<Option<WindowHandle>>,
    _profile_dir: Option<tempfile::TempDir>,
}

impl Browser {
    /// Start a session, launching the WebDriver server if needed
    pub async fn launch(browser_type: BrowserType, headless: bool) -> Result<Self> {
        info!("Connecting to {:?} WebDriver", browser_type);
        let webdriver_url = GLOBAL_DRIVER_MANAGER.ensure_driver(browser_type).await?;

        let mut profile_dir = None;
        let mut caps = serde_json::Map::new();
        match browser_type {
            BrowserType::Firefox => {
                let mut args = Vec::new();
                if headless {
                    args.push("--headless".to_string());
                }
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Chrome => {
                // Chrome refuses to share a profile directory between sessions
                let dir = tempfile::Builder::new()
                    .prefix("webreplay-chrome-")
                    .tempdir()?;
                let mut args = vec!["--no-sandbox".to_string()];
                if headless {
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                args.push(format!("--user-data-dir={}", dir.path().display()));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
                profile_dir = Some(dir);
            }
        }

        debug!("Connecting to WebDriver at {}", webdriver_url);
        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&webdriver_url)
            .await
            .with_context(|| format!("Failed to connect to WebDriver at {}", webdriver_url))?;
        let spare = client.window().await.ok();

        Ok(Self {
            windows: Arc::new(Windows::new(client)),
            browser_type,
            agents: DashMap::new(),
            spare: std::sync::Mutex::new(spare),
            _profile_dir: profile_dir,
        })
    }

    pub fn browser_type(&self) -> BrowserType {
        self.browser_type
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self.windows.handles.iter().map(|e| e.key().clone()).collect();
        tabs.sort();
        tabs
    }

    fn take_spare(&self) -> Option<WindowHandle> {
        self.spare.lock().ok().and_then(|mut spare| spare.take())
    }

    /// Install the recorder listeners in `tab`
    pub async fn install_recorder(&self, tab: &TabId) -> Result<()> {
        let _guard = self.windows.enter(tab).await?;
        self.windows
            .client
            .execute(RECORDER_SCRIPT, vec![])
            .await
            .context("Failed to install recorder")?;
        Ok(())
    }

    /// Take the events buffered in `tab`, re-installing the recorder when a
    /// page load dropped it
    pub async fn drain_events(&self, tab: &TabId) -> Result<PageBatch> {
        let value = {
            let _guard = self.windows.enter(tab).await?;
            self.windows.client.execute(DRAIN_SCRIPT, vec![]).await?
        };
        let batch: PageBatch = serde_json::from_value(value).context("Malformed recorder buffer")?;
        if !batch.installed {
            debug!("Recorder missing in {} after load, re-installing", tab);
            self.install_recorder(tab).await?;
        }
        Ok(batch)
    }

    /// Register windows the page opened on its own (target=_blank,
    /// window.open) and return their tab ids
    pub async fn adopt_new_windows(&self) -> Result<Vec<TabId>> {
        let handles = {
            let _guard = self.windows.current.lock().await;
            self.windows.client.windows().await?
        };
        let mut adopted = Vec::new();
        for handle in handles {
            if !self.windows.knows(&handle) {
                let tab = self.windows.register(handle);
                info!("Detected new tab {}", tab);
                adopted.push(tab);
            }
        }
        Ok(adopted)
    }

    /// End the WebDriver session
    pub async fn close(self) -> Result<()> {
        self.windows.client.clone().close().await?;
        Ok(())
    }
}

#[async_trait]
impl TabHost for Browser {
    async fn create_tab(&self, url: &str, _active: bool) -> Result<TabInfo> {
        let handle = match self.take_spare() {
            Some(handle) => handle,
            None => {
                let _guard = self.windows.current.lock().await;
                self.windows
                    .client
                    .new_window(true)
                    .await
                    .context("Failed to open a new tab")?
                    .handle
            }
        };
        let tab = self.windows.register(handle);
        self.update_tab(&tab, url).await
    }

    async fn update_tab(&self, tab: &TabId, url: &str) -> Result<TabInfo> {
        let _guard = self.windows.enter(tab).await?;
        info!("Navigating {} to {}", tab, url);
        self.windows
            .client
            .goto(url)
            .await
            .with_context(|| format!("Navigation to {} failed", url))?;
        let live = self.windows.client.current_url().await?;
        Ok(TabInfo {
            id: tab.clone(),
            url: live.to_string(),
        })
    }

    async fn activate_tab(&self, tab: &TabId) -> Result<TabInfo> {
        let _guard = self.windows.enter(tab).await?;
        let live = self.windows.client.current_url().await?;
        Ok(TabInfo {
            id: tab.clone(),
            url: live.to_string(),
        })
    }

    async fn wait_for_load(&self, tab: &TabId, ceiling: Duration) -> Result<()> {
        let poll = async {
            loop {
                if self.windows.ready_state(tab).await? == "complete" {
                    return Ok::<(), anyhow::Error>(());
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(ceiling, poll)
            .await
            .map_err(|_| anyhow::anyhow!("tab {} did not finish loading", tab))?
    }

    async fn current_url(&self, tab: &TabId) -> Result<String> {
        let _guard = self.windows.enter(tab).await?;
        Ok(self.windows.client.current_url().await?.to_string())
    }

    async fn agent(&self, tab: &TabId) -> Result<AgentHandle> {
        if !self.windows.handles.contains_key(tab) {
            anyhow::bail!("No tab with id {}", tab);
        }
        let handle = self
            .agents
            .entry(tab.clone())
            .or_insert_with(|| {
                spawn_agent(WebDriverAgent {
                    windows: self.windows.clone(),
                    tab: tab.clone(),
                })
            })
            .clone();
        Ok(handle)
    }
}

/// Page agent that acts on one tab through WebDriver commands
pub struct WebDriverAgent {
    windows: Arc<Windows>,
    tab: TabId,
}

enum Query {
    Id(String),
    XPath(String),
}

impl WebDriverAgent {
    /// Walk the locator fallback chain with WebDriver lookups
    async fn locate(&self, action: &Action) -> Result<Element> {
        let hints = action.hints();
        let mut queries = Vec::new();
        match &action.locator {
            Some(Locator::ById { id }) => queries.push(Query::Id(id.clone())),
            Some(path) => queries.push(Query::XPath(path.to_xpath())),
            None => {}
        }
        if let Some(id) = hints.element_id {
            queries.push(Query::Id(id.to_string()));
        }
        queries.extend(locator::context_xpath(&hints).map(Query::XPath));
        queries.extend(locator::type_xpath(&hints).map(Query::XPath));

        let client = &self.windows.client;
        for query in &queries {
            let found = match query {
                Query::Id(id) => client.find(fantoccini::Locator::Id(id)).await,
                Query::XPath(xpath) => client.find(fantoccini::Locator::XPath(xpath)).await,
            };
            if let Ok(element) = found {
                return Ok(element);
            }
        }

        Err(ReplayError::LocatorResolution {
            kind: action.kind_name().to_string(),
            target: action
                .locator
                .as_ref()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "(no locator)".to_string()),
        }
        .into())
    }

    async fn script(&self, script: &str, element: &Element, args: Vec<serde_json::Value>) -> Result<()> {
        let mut all = vec![serde_json::to_value(element)?];
        all.extend(args);
        self.windows.client.execute(script, all).await?;
        Ok(())
    }

    async fn apply(&self, action: &Action) -> Result<()> {
        match &action.kind {
            ActionKind::Click { .. } => {
                let element = self.locate(action).await?;
                self.script(
                    "arguments[0].scrollIntoView({block: 'center', inline: 'nearest'});",
                    &element,
                    vec![],
                )
                .await?;
                element.click().await?;
            }
            ActionKind::Input {
                delta,
                cursor_position,
                ..
            } => {
                let element = self.locate(action).await?;
                let live = element.prop("value").await?.unwrap_or_default();
                let value = delta::apply(&live, delta);
                // setSelectionRange counts UTF-16 code units
                let caret: usize = value
                    .chars()
                    .take(*cursor_position)
                    .map(char::len_utf16)
                    .sum();
                self.script(
                    r#"
                    const el = arguments[0];
                    el.scrollIntoView({block: 'center', inline: 'nearest'});
                    el.focus();
                    el.value = arguments[1];
                    try { el.setSelectionRange(arguments[2], arguments[2]); } catch (e) {}
                    el.dispatchEvent(new Event('input', { bubbles: true }));
                    "#,
                    &element,
                    vec![json!(value), json!(caret)],
                )
                .await?;
            }
            ActionKind::Change { value, .. } => {
                let element = self.locate(action).await?;
                self.script(
                    r#"
                    const el = arguments[0];
                    el.scrollIntoView({block: 'center', inline: 'nearest'});
                    if (el.type === 'checkbox' || el.type === 'radio') {
                        el.checked = arguments[1];
                    } else {
                        el.value = arguments[2];
                    }
                    el.dispatchEvent(new Event('change', { bubbles: true }));
                    "#,
                    &element,
                    vec![json!(value.as_checked()), json!(value.as_text())],
                )
                .await?;
            }
            ActionKind::Scroll { x, y } => {
                self.windows
                    .client
                    .execute("window.scrollTo(arguments[0], arguments[1]);", vec![json!(x), json!(y)])
                    .await?;
            }
            ActionKind::Navigation { url, .. } => {
                let live = self.windows.client.current_url().await?;
                if !crate::tab_manager::same_url(live.as_str(), url) {
                    debug!("Navigation target {} differs from page {}", url, live);
                }
            }
            ActionKind::FormSubmit => {
                let element = self.locate(action).await?;
                self.script(
                    r#"
                    const form = arguments[0].closest('form') || arguments[0];
                    if (form.requestSubmit) { form.requestSubmit(); } else { form.submit(); }
                    "#,
                    &element,
                    vec![],
                )
                .await?;
            }
            ActionKind::TabCreate { .. } | ActionKind::TabFocus { .. } => {
                anyhow::bail!("{} is handled by the host, not the page", action.kind_name());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageAgent for WebDriverAgent {
    async fn is_ready(&mut self) -> bool {
        let Ok(_guard) = self.windows.enter(&self.tab).await else {
            return false;
        };
        self.windows
            .client
            .execute(
                "return document.readyState !== 'loading' && !!document.body;",
                vec![],
            )
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    async fn execute(&mut self, action: &Action) -> Result<()> {
        let _guard = self.windows.enter(&self.tab).await?;
        let result = self
            .apply(action)
            .await
            .with_context(|| format!("{} action failed", action.kind_name()));
        if let Err(e) = &result {
            warn!("{:#}", e);
        }
        result
    }
}

#[cfg(test)]
#[path = "webdriver_test.rs"]
mod webdriver_test;
