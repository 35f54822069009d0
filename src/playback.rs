//! Playback orchestrator.
//!
//! Drives a persisted action sequence through the playback tab:
//!
//! ```text
//! Idle -> Provisioning -> AwaitingAgentReady -> Dispatching(i)
//!      -> Retrying(i) | Advancing(i + 1) -> Completed | Failed
//! ```
//!
//! Steps run strictly in recorded order, one at a time. A step that keeps
//! failing is retried, recorded as failed and skipped; only losing the
//! destination tab or the store ends a run early.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::agent::AgentHandle;
use crate::errors::ReplayError;
use crate::host::TabHost;
use crate::store::ActionStore;
use crate::tab_manager::{TabCoordinator, TabTimings};
use crate::types::{Action, ActionKind, TabId};

/// Playback timing and retry policy
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Pause between readiness probes
    pub probe_interval: Duration,
    /// Longest wait for the page agent to answer ready
    pub ready_ceiling: Duration,
    /// Deadline for one action round-trip
    pub dispatch_timeout: Duration,
    /// Total attempts per action, first one included
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    /// Fixed delay between steps; recorded pacing is not replayed
    pub settle: Duration,
    pub tabs: TabTimings,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(100),
            ready_ceiling: Duration::from_secs(5),
            dispatch_timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            settle: Duration::from_millis(500),
            tabs: TabTimings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlaybackState {
    Idle,
    Provisioning { url: String },
    AwaitingAgentReady,
    Dispatching { index: usize },
    Retrying { index: usize, attempt: u32 },
    Advancing { index: usize },
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((current * 100 + total / 2) / total).min(100) as u8
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Complete,
    Error,
}

/// What happened to one recorded action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub index: usize,
    pub kind: String,
    pub attempts: u32,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub status: PlaybackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Process exit code of the error that ended the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub steps: Vec<StepOutcome>,
}

impl PlaybackReport {
    fn complete(message: Option<String>, steps: Vec<StepOutcome>) -> Self {
        Self {
            status: PlaybackStatus::Complete,
            message,
            exit_code: None,
            steps,
        }
    }

    pub(crate) fn error(message: impl Into<String>, steps: Vec<StepOutcome>) -> Self {
        Self {
            status: PlaybackStatus::Error,
            message: Some(message.into()),
            exit_code: Some(1),
            steps,
        }
    }

    pub(crate) fn failed(err: &ReplayError, steps: Vec<StepOutcome>) -> Self {
        Self {
            exit_code: Some(err.exit_code()),
            ..Self::error(err.to_string(), steps)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == PlaybackStatus::Complete
    }

    /// The error that ended the run, for callers that surface it as a
    /// process failure
    pub fn into_error(self) -> Option<ReplayError> {
        if self.is_complete() {
            return None;
        }
        Some(ReplayError::PlaybackAborted {
            message: self.message.unwrap_or_else(|| "Playback failed".to_string()),
            code: self.exit_code.unwrap_or(1),
        })
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.ok)
    }
}

/// Notifications for observers such as the UI shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PlaybackEvent {
    State { state: PlaybackState },
    PlaybackProgress(Progress),
    Finished(PlaybackReport),
}

/// Host-side orchestrator for one playback tab
pub struct Player<H: TabHost + ?Sized> {
    config: PlaybackConfig,
    tabs: TabCoordinator<H>,
    state: PlaybackState,
    observers: Vec<mpsc::UnboundedSender<PlaybackEvent>>,
}

impl<H: TabHost + ?Sized> Player<H> {
    pub fn new(host: Arc<H>, config: PlaybackConfig) -> Self {
        let tabs = TabCoordinator::new(host, config.tabs.clone());
        Self {
            config,
            tabs,
            state: PlaybackState::Idle,
            observers: Vec::new(),
        }
    }

    /// Receive state changes, progress and the final report
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PlaybackEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn tabs(&self) -> &TabCoordinator<H> {
        &self.tabs
    }

    /// Read the persisted sequence and play it
    pub async fn play_from_store<S: ActionStore + ?Sized>(&mut self, store: &S) -> PlaybackReport {
        match store.actions().await {
            Ok(actions) => self.play(&actions).await,
            Err(e) => {
                error!("Cannot read recorded actions: {}", e);
                self.finish(PlaybackReport::failed(&e, Vec::new()))
            }
        }
    }

    /// Replay `actions` in order; every failure resolves to a report
    pub async fn play(&mut self, actions: &[Action]) -> PlaybackReport {
        self.state = PlaybackState::Idle;
        if actions.is_empty() {
            info!("No actions to play");
            return self.finish(PlaybackReport::complete(
                Some("No actions to play".to_string()),
                Vec::new(),
            ));
        }

        let Some(start_url) = actions
            .iter()
            .map(|a| a.page_url.as_str())
            .find(|url| !url.is_empty())
        else {
            return self.finish(PlaybackReport::error(
                "Recorded actions carry no page URL to start from",
                Vec::new(),
            ));
        };

        info!("Playing {} actions starting at {}", actions.len(), start_url);
        self.transition(PlaybackState::Provisioning {
            url: start_url.to_string(),
        });
        if let Err(e) = self.tabs.ensure(start_url).await {
            error!("Playback setup failed: {}", e);
            return self.finish(PlaybackReport::failed(&e, Vec::new()));
        }

        let total = actions.len();
        let mut steps = Vec::with_capacity(total);
        for (index, action) in actions.iter().enumerate() {
            match self.run_step(index, action).await {
                Ok(outcome) => steps.push(outcome),
                Err(e) => {
                    error!("Playback aborted at step {}: {}", index + 1, e);
                    return self.finish(PlaybackReport::failed(&e, steps));
                }
            }

            self.emit(PlaybackEvent::PlaybackProgress(Progress::new(index + 1, total)));
            if index + 1 < total {
                self.transition(PlaybackState::Advancing { index: index + 1 });
                tokio::time::sleep(self.config.settle).await;
            }
        }

        let failed = steps.iter().filter(|s| !s.ok).count();
        let message = (failed > 0).then(|| format!("{} of {} steps failed", failed, total));
        info!("Playback completed ({} of {} steps ok)", total - failed, total);
        self.finish(PlaybackReport::complete(message, steps))
    }

    /// Attempt one action up to the configured limit. Only run-level errors
    /// are returned; step-local ones end up in the outcome.
    async fn run_step(&mut self, index: usize, action: &Action) -> Result<StepOutcome, ReplayError> {
        self.transition(PlaybackState::Dispatching { index });
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;
        let mut last_error = None;
        // Tab a `tabCreate` step opened on an earlier attempt
        let mut opened = None;

        while attempts < max_attempts {
            attempts += 1;
            if attempts > 1 {
                self.transition(PlaybackState::Retrying {
                    index,
                    attempt: attempts,
                });
                tokio::time::sleep(self.config.retry_backoff).await;
            }

            match self.attempt(action, &mut opened).await {
                Ok(()) => {
                    debug!("Step {} ({}) done", index + 1, action.kind_name());
                    last_error = None;
                    break;
                }
                Err(e) if e.is_step_local() => {
                    warn!(
                        "Step {} ({}) attempt {}/{} failed: {}",
                        index + 1,
                        action.kind_name(),
                        attempts,
                        max_attempts,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(e) = &last_error {
            warn!("Skipping step {} after {} attempts: {}", index + 1, attempts, e);
        }
        Ok(StepOutcome {
            index,
            kind: action.kind_name().to_string(),
            attempts,
            ok: last_error.is_none(),
            error: last_error.map(|e| e.to_string()),
        })
    }

    async fn attempt(&mut self, action: &Action, opened: &mut Option<TabId>) -> Result<(), ReplayError> {
        match &action.kind {
            ActionKind::TabCreate { url, tab_ref, .. } => {
                match opened.clone() {
                    // Retry readiness on the tab already opened
                    Some(tab) => {
                        self.tabs.reopen(&tab).await?;
                    }
                    None => {
                        let tab = self.tabs.create_recorded(url.as_deref(), tab_ref.as_ref()).await?;
                        *opened = Some(tab.id.clone());
                        self.tabs.await_opened(&tab.id).await?;
                    }
                }
                self.await_agent_ready().await?;
                return Ok(());
            }
            ActionKind::TabFocus { tab_ref, .. } => {
                self.tabs.focus(tab_ref).await?;
                self.await_agent_ready().await?;
                return Ok(());
            }
            _ => {}
        }

        self.tabs.settle_navigation().await?;
        let destination = action.destination();
        if self.tabs.should_navigate(destination) {
            self.transition(PlaybackState::Provisioning {
                url: destination.to_string(),
            });
            self.tabs.ensure(destination).await?;
        }

        let agent = self.await_agent_ready().await?;
        agent.execute(action, self.config.dispatch_timeout).await?;
        if action.starts_navigation() {
            self.tabs.mark_navigating();
        }
        Ok(())
    }

    /// Probe the playback tab's agent until it answers ready or the
    /// ceiling elapses
    async fn await_agent_ready(&mut self) -> Result<AgentHandle, ReplayError> {
        self.transition(PlaybackState::AwaitingAgentReady);
        let tab = self
            .tabs
            .playback_tab()
            .cloned()
            .ok_or_else(|| ReplayError::AgentUnavailable("no playback tab".into()))?;

        let ceiling = self.config.ready_ceiling;
        let started = Instant::now();
        let mut probes = 0u32;
        loop {
            let elapsed = started.elapsed();
            if elapsed >= ceiling {
                return Err(ReplayError::AgentUnavailable(format!(
                    "tab {} not ready after {} probes in {} ms",
                    tab.id,
                    probes,
                    ceiling.as_millis()
                )));
            }

            probes += 1;
            if let Ok(agent) = self.tabs.host().agent(&tab.id).await
                && agent.probe(ceiling - elapsed).await
            {
                return Ok(agent);
            }

            let remaining = ceiling.saturating_sub(started.elapsed());
            tokio::time::sleep(self.config.probe_interval.min(remaining)).await;
        }
    }

    fn transition(&mut self, state: PlaybackState) {
        debug!("Playback state: {:?}", state);
        self.state = state.clone();
        self.emit(PlaybackEvent::State { state });
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Enter the terminal state and tear down the session's tab tracking
    fn finish(&mut self, report: PlaybackReport) -> PlaybackReport {
        self.tabs.release();
        self.transition(if report.is_complete() {
            PlaybackState::Completed
        } else {
            PlaybackState::Failed
        });
        self.emit(PlaybackEvent::Finished(report.clone()));
        report
    }
}

#[cfg(test)]
#[path = "playback_test.rs"]
mod playback_test;
