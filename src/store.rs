//! Persistence store for the recording flag and the action sequence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

use crate::errors::ReplayError;
use crate::types::{Action, render_script};

/// Everything the store holds, as persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub is_recording: bool,
    #[serde(default)]
    pub recorded_actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording: Option<RecordingMeta>,
    /// Numbered human-readable listing, written when a recording ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_script: Option<String>,
}

/// Identity of the recording that produced the stored sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMeta {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
}

impl RecordingMeta {
    pub fn begin(start_url: Option<&str>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            start_url: start_url.map(str::to_string),
        }
    }
}

/// Key/value persistence consumed by recording and playback
///
/// Writers are the recorder while recording and `clear`; playback only
/// reads. The two modes never overlap, so read-modify-write is enough.
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn load(&self) -> Result<StoreSnapshot, ReplayError>;

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), ReplayError>;

    async fn is_recording(&self) -> Result<bool, ReplayError> {
        Ok(self.load().await?.is_recording)
    }

    async fn actions(&self) -> Result<Vec<Action>, ReplayError> {
        Ok(self.load().await?.recorded_actions)
    }

    /// Clear the sequence and raise the recording flag
    async fn begin_recording(&self, meta: RecordingMeta) -> Result<(), ReplayError> {
        self.save(&StoreSnapshot {
            is_recording: true,
            recorded_actions: Vec::new(),
            recording: Some(meta),
            recording_script: None,
        })
        .await
    }

    async fn end_recording(&self) -> Result<(), ReplayError> {
        let mut snapshot = self.load().await?;
        snapshot.is_recording = false;
        snapshot.recording_script = Some(render_script(&snapshot.recorded_actions));
        self.save(&snapshot).await
    }

    async fn append_action(&self, action: &Action) -> Result<(), ReplayError> {
        let mut snapshot = self.load().await?;
        snapshot.recorded_actions.push(action.clone());
        self.save(&snapshot).await
    }

    /// Discard the sequence and reset the recording flag
    async fn clear(&self) -> Result<(), ReplayError> {
        self.save(&StoreSnapshot::default()).await
    }
}

/// Default store location: `~/.webreplay/store.json`
pub fn default_store_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().context("Unable to determine home directory")?;
    Ok(home_dir.join(".webreplay").join("store.json"))
}

/// Store backed by one JSON file, replaced atomically on every write
pub struct JsonFileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_store_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreSnapshot> {
        if !self.path.exists() {
            return Ok(StoreSnapshot::default());
        }
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if json.trim().is_empty() {
            return Ok(StoreSnapshot::default());
        }
        serde_json::from_str(&json).with_context(|| format!("Corrupt store file {}", self.path.display()))
    }

    fn write(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let json = serde_json::to_string_pretty(snapshot)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        debug!(
            "Stored {} actions in {}",
            snapshot.recorded_actions.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl ActionStore for JsonFileStore {
    async fn load(&self) -> Result<StoreSnapshot, ReplayError> {
        let _guard = self.lock.lock().await;
        self.read().map_err(|e| ReplayError::store(format!("{:#}", e)))
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), ReplayError> {
        let _guard = self.lock.lock().await;
        self.write(snapshot)
            .map_err(|e| ReplayError::store(format!("{:#}", e)))
    }
}

/// In-memory store; can be switched unreachable to exercise failure paths
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<StoreSnapshot>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actions(actions: Vec<Action>) -> Self {
        Self {
            snapshot: Mutex::new(StoreSnapshot {
                recorded_actions: actions,
                ..Default::default()
            }),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ReplayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ReplayError::StoreAccess("store unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ActionStore for MemoryStore {
    async fn load(&self) -> Result<StoreSnapshot, ReplayError> {
        self.check()?;
        self.snapshot
            .lock()
            .map(|s| s.clone())
            .map_err(|_| ReplayError::store("store lock poisoned"))
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), ReplayError> {
        self.check()?;
        let mut current = self
            .snapshot
            .lock()
            .map_err(|_| ReplayError::store("store lock poisoned"))?;
        *current = snapshot.clone();
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
