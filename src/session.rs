//! Session context: the recording flag, the recorder and the player, and
//! the commands the UI shell sends.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capture::{CaptureClock, CaptureConfig, CapturePipeline, RawEvent};
use crate::errors::ReplayError;
use crate::host::TabHost;
use crate::playback::{PlaybackConfig, PlaybackEvent, PlaybackReport, Player};
use crate::store::{ActionStore, RecordingMeta};
use crate::types::{Action, TabId};

/// Feeds captured actions into the store while a recording is active
pub struct Recorder<S: ActionStore + ?Sized> {
    store: Arc<S>,
    pipeline: CapturePipeline,
    clock: CaptureClock,
    recording: bool,
}

impl<S: ActionStore + ?Sized> Recorder<S> {
    pub fn new(store: Arc<S>, config: CaptureConfig) -> Self {
        Self {
            store,
            pipeline: CapturePipeline::new(config),
            clock: CaptureClock::start(),
            recording: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Start a new recording, discarding the stored sequence
    pub async fn start(&mut self, start_url: Option<&str>) -> Result<RecordingMeta, ReplayError> {
        let meta = RecordingMeta::begin(start_url);
        self.store.begin_recording(meta.clone()).await?;

        self.pipeline.reset();
        self.clock = CaptureClock::start();
        if let Some(url) = start_url {
            self.pipeline.observe_url(url, 0.0);
        }
        self.recording = true;
        info!("Recording {} started", meta.session_id);
        Ok(meta)
    }

    /// Re-arm capture after the page reloaded, if the store says a recording
    /// is in progress. The stored sequence is kept and new timestamps
    /// continue from its last action.
    pub async fn resume(&mut self, live_url: &str) -> Result<bool, ReplayError> {
        if !self.store.is_recording().await? {
            return Ok(false);
        }
        if !self.recording {
            let last_ms = self
                .store
                .actions()
                .await?
                .last()
                .map_or(0.0, |action| action.captured_at_ms);
            self.pipeline.reset();
            self.clock = CaptureClock::resume_at(last_ms);
            self.recording = true;
            info!("Resumed recording at {}", live_url);
        }
        self.pipeline.observe_url(live_url, self.clock.now_ms());
        Ok(true)
    }

    /// Stop recording; returns the number of stored actions
    pub async fn stop(&mut self) -> Result<usize, ReplayError> {
        if self.recording {
            let now = self.clock.now_ms();
            if let Some(action) = self.pipeline.finish(now) {
                self.store.append_action(&action).await?;
            }
        }
        self.recording = false;
        self.store.end_recording().await?;
        let count = self.store.actions().await?.len();
        info!("Recording stopped with {} actions", count);
        Ok(count)
    }

    /// Observe one raw event from the page on `page_url`
    pub async fn capture(&mut self, event: RawEvent, page_url: &str) -> Result<Vec<Action>, ReplayError> {
        if !self.recording {
            return Ok(Vec::new());
        }
        let now = self.clock.now_ms();
        let mut captured = Vec::new();
        captured.extend(self.pipeline.observe_url(page_url, now));
        captured.extend(self.pipeline.observe(event, page_url, now));
        self.persist(&captured).await?;
        Ok(captured)
    }

    /// Periodic tick: settle pending scrolls and check the live URL
    pub async fn tick(&mut self, live_url: &str) -> Result<Vec<Action>, ReplayError> {
        if !self.recording {
            return Ok(Vec::new());
        }
        let now = self.clock.now_ms();
        let mut captured = Vec::new();
        captured.extend(self.pipeline.flush(now));
        captured.extend(self.pipeline.observe_url(live_url, now));
        self.persist(&captured).await?;
        Ok(captured)
    }

    /// Record a switch to `tab`. Its URL becomes the new baseline, so the
    /// switch itself is not taken for a navigation.
    pub async fn focus_tab(&mut self, tab: TabId, live_url: &str) -> Result<Vec<Action>, ReplayError> {
        if !self.recording {
            return Ok(Vec::new());
        }
        let now = self.clock.now_ms();
        let captured: Vec<Action> = self
            .pipeline
            .observe(RawEvent::TabFocused { tab }, live_url, now)
            .into_iter()
            .collect();
        self.pipeline.rebase_url(live_url);
        self.persist(&captured).await?;
        Ok(captured)
    }

    pub fn set_current_tab(&mut self, tab: Option<TabId>) {
        self.pipeline.set_current_tab(tab);
    }

    async fn persist(&self, actions: &[Action]) -> Result<(), ReplayError> {
        for action in actions {
            self.store.append_action(action).await?;
        }
        Ok(())
    }
}

/// Command from the UI shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ShellCommand {
    StartRecording {
        #[serde(default)]
        url: Option<String>,
    },
    StopRecording,
    PlayActions,
}

/// Reply to a [`ShellCommand`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ShellReply {
    RecordingStarted { session_id: Uuid },
    RecordingStopped { action_count: usize },
    Playback { report: PlaybackReport },
    Failed { message: String },
}

/// Explicit session state shared by recording and playback
///
/// Recording and playback are mutually exclusive: playing while the store
/// says a recording is active is refused.
pub struct Session<H: TabHost + ?Sized, S: ActionStore + ?Sized> {
    store: Arc<S>,
    recorder: Recorder<S>,
    player: Player<H>,
}

impl<H: TabHost + ?Sized, S: ActionStore + ?Sized> Session<H, S> {
    pub fn new(host: Arc<H>, store: Arc<S>, playback: PlaybackConfig, capture: CaptureConfig) -> Self {
        Self {
            recorder: Recorder::new(store.clone(), capture),
            player: Player::new(host, playback),
            store,
        }
    }

    pub fn recorder(&mut self) -> &mut Recorder<S> {
        &mut self.recorder
    }

    pub fn player(&self) -> &Player<H> {
        &self.player
    }

    /// Playback progress and state notifications
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PlaybackEvent> {
        self.player.subscribe()
    }

    pub async fn handle(&mut self, command: ShellCommand) -> ShellReply {
        match command {
            ShellCommand::StartRecording { url } => match self.recorder.start(url.as_deref()).await {
                Ok(meta) => ShellReply::RecordingStarted {
                    session_id: meta.session_id,
                },
                Err(e) => ShellReply::Failed {
                    message: e.to_string(),
                },
            },
            ShellCommand::StopRecording => match self.recorder.stop().await {
                Ok(action_count) => ShellReply::RecordingStopped { action_count },
                Err(e) => ShellReply::Failed {
                    message: e.to_string(),
                },
            },
            ShellCommand::PlayActions => ShellReply::Playback {
                report: self.play().await,
            },
        }
    }

    async fn play(&mut self) -> PlaybackReport {
        match self.store.is_recording().await {
            Ok(false) => {}
            Ok(true) => {
                warn!("Refusing to play while a recording is active");
                return PlaybackReport::error("Cannot play while recording", Vec::new());
            }
            Err(e) => return PlaybackReport::failed(&e, Vec::new()),
        }
        self.player.play_from_store(self.store.as_ref()).await
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
