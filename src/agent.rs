//! Page agent protocol.
//!
//! The host and the in-page agent are two sequential tasks joined by a
//! request/response channel. Every request is time-boxed on the host side;
//! a dropped channel reads as an unavailable agent rather than a crash.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::delta;
use crate::dom::{DomEventKind, NodeId, ReadyState, SharedDocument};
use crate::errors::ReplayError;
use crate::locator;
use crate::types::{Action, ActionKind};

/// Host -> page message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum AgentRequest {
    /// Readiness probe
    IsReady,
    /// Execute one recorded action
    PlayAction { action: Action },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Success,
}

/// Page -> host message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentResponse {
    Ready { ready: bool },
    Done { status: AgentStatus },
    Failed { error: String },
}

type Envelope = (AgentRequest, oneshot::Sender<AgentResponse>);

/// In-page counterpart that executes actions
#[async_trait]
pub trait PageAgent: Send + 'static {
    /// Whether the page can accept actions yet
    async fn is_ready(&mut self) -> bool;

    /// Perform one action against the live page
    async fn execute(&mut self, action: &Action) -> Result<()>;
}

/// Host-side end of the agent channel
#[derive(Debug, Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<Envelope>,
}

/// Run `agent` as its own task, serving one request at a time
pub fn spawn_agent<A: PageAgent>(mut agent: A) -> AgentHandle {
    let (tx, mut rx) = mpsc::channel::<Envelope>(16);
    tokio::spawn(async move {
        while let Some((request, reply)) = rx.recv().await {
            let response = match request {
                AgentRequest::IsReady => AgentResponse::Ready {
                    ready: agent.is_ready().await,
                },
                AgentRequest::PlayAction { action } => match agent.execute(&action).await {
                    Ok(()) => AgentResponse::Done {
                        status: AgentStatus::Success,
                    },
                    Err(e) => AgentResponse::Failed {
                        error: format!("{:#}", e),
                    },
                },
            };
            // Host gave up waiting; nothing to deliver
            let _ = reply.send(response);
        }
        debug!("Page agent channel closed");
    });
    AgentHandle { tx }
}

impl AgentHandle {
    async fn request(&self, request: AgentRequest, deadline: Duration) -> Result<AgentResponse, ReplayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let exchange = async {
            self.tx
                .send((request, reply_tx))
                .await
                .map_err(|_| ReplayError::AgentUnavailable("agent channel closed".into()))?;
            reply_rx
                .await
                .map_err(|_| ReplayError::AgentUnavailable("agent dropped the request".into()))
        };
        match tokio::time::timeout(deadline, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ReplayError::DispatchTimeout(deadline.as_millis() as u64)),
        }
    }

    /// Lightweight readiness probe; any failure reads as "not ready"
    pub async fn probe(&self, deadline: Duration) -> bool {
        matches!(
            self.request(AgentRequest::IsReady, deadline).await,
            Ok(AgentResponse::Ready { ready: true })
        )
    }

    /// Send one action and wait for the agent's verdict
    pub async fn execute(&self, action: &Action, deadline: Duration) -> Result<(), ReplayError> {
        let request = AgentRequest::PlayAction {
            action: action.clone(),
        };
        match self.request(request, deadline).await? {
            AgentResponse::Done { .. } => Ok(()),
            AgentResponse::Failed { error } => Err(ReplayError::AgentError(error)),
            AgentResponse::Ready { .. } => Err(ReplayError::AgentError(
                "unexpected readiness reply to an action".into(),
            )),
        }
    }
}

/// Page agent for an in-memory [`crate::dom::Document`]
pub struct DomAgent {
    document: SharedDocument,
    latency: Duration,
    journal: Option<mpsc::UnboundedSender<AgentTrace>>,
}

/// Start/finish record of one executed action, for observers of the agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTrace {
    pub kind: &'static str,
    pub page_url: String,
    pub started: tokio::time::Instant,
    pub finished: tokio::time::Instant,
    pub ok: bool,
}

impl DomAgent {
    pub fn new(document: SharedDocument) -> Self {
        Self {
            document,
            latency: Duration::ZERO,
            journal: None,
        }
    }

    /// Simulated time spent per action
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_journal(mut self, journal: mpsc::UnboundedSender<AgentTrace>) -> Self {
        self.journal = Some(journal);
        self
    }

    fn locate(&self, action: &Action) -> Result<NodeId> {
        let doc = self.lock()?;
        locator::resolve_element(&doc, action.locator.as_ref(), &action.hints()).ok_or_else(|| {
            ReplayError::LocatorResolution {
                kind: action.kind_name().to_string(),
                target: action
                    .locator
                    .as_ref()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "(no locator)".to_string()),
            }
            .into()
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, crate::dom::Document>> {
        self.document
            .lock()
            .map_err(|_| anyhow::anyhow!("document lock poisoned"))
    }

    fn apply(&self, action: &Action) -> Result<()> {
        match &action.kind {
            ActionKind::Click { .. } => {
                let node = self.locate(action)?;
                let mut doc = self.lock()?;
                doc.dispatch(DomEventKind::Click, node);
            }
            ActionKind::Input {
                delta,
                cursor_position,
                ..
            } => {
                let node = self.locate(action)?;
                let mut doc = self.lock()?;
                doc.focus(node);
                let value = delta::apply(doc.value(node), delta);
                doc.set_value(node, &value);
                doc.set_selection(node, *cursor_position);
                doc.dispatch(DomEventKind::Input, node);
            }
            ActionKind::Change {
                element_type,
                value,
                ..
            } => {
                let node = self.locate(action)?;
                let mut doc = self.lock()?;
                let toggle = matches!(element_type.as_deref(), Some("checkbox" | "radio"))
                    || matches!(doc.element_type(node), Some("checkbox" | "radio"));
                if toggle {
                    doc.set_checked(node, value.as_checked());
                } else {
                    doc.set_value(node, &value.as_text());
                }
                doc.dispatch(DomEventKind::Change, node);
            }
            ActionKind::Scroll { x, y } => {
                self.lock()?.scroll_to(*x, *y);
            }
            ActionKind::Navigation { url, .. } => {
                // The host performs the navigation; only confirm we landed
                let doc = self.lock()?;
                if doc.url() != url {
                    debug!("Navigation target {} differs from page {}", url, doc.url());
                }
            }
            ActionKind::FormSubmit => {
                let node = self.locate(action)?;
                let mut doc = self.lock()?;
                let form = doc.closest(node, "form").unwrap_or(node);
                doc.dispatch(DomEventKind::Submit, form);
            }
            ActionKind::TabCreate { .. } | ActionKind::TabFocus { .. } => {
                anyhow::bail!("{} is handled by the host, not the page", action.kind_name());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageAgent for DomAgent {
    async fn is_ready(&mut self) -> bool {
        match self.document.lock() {
            Ok(doc) => doc.agent_installed() && doc.ready_state() != ReadyState::Loading,
            Err(_) => false,
        }
    }

    async fn execute(&mut self, action: &Action) -> Result<()> {
        let started = tokio::time::Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self
            .apply(action)
            .with_context(|| format!("{} action failed", action.kind_name()));
        if let Err(e) = &result {
            warn!("{:#}", e);
        }
        if let Some(journal) = &self.journal {
            let page_url = self.lock().map(|d| d.url().to_string()).unwrap_or_default();
            let _ = journal.send(AgentTrace {
                kind: action.kind_name(),
                page_url,
                started,
                finished: tokio::time::Instant::now(),
                ok: result.is_ok(),
            });
        }
        result
    }
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod agent_test;
