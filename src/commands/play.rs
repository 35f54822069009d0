use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::commands::utils;
use webreplay::capture::CaptureConfig;
use webreplay::playback::{PlaybackConfig, PlaybackEvent, PlaybackState};
use webreplay::session::{Session, ShellCommand, ShellReply};
use webreplay::store::ActionStore;
use webreplay::webdriver::Browser;

pub async fn handle_play(
    browser: String,
    no_headless: bool,
    settle_ms: u64,
    dispatch_timeout: u64,
    attempts: u32,
    store: Option<PathBuf>,
) -> Result<()> {
    let browser_type = utils::parse_browser(&browser)?;
    let store = utils::open_store(store)?;
    let config = playback_config(settle_ms, dispatch_timeout, attempts);

    // Surface an unreadable store before paying for a browser launch
    let pending = store.actions().await?.len();
    info!("Replaying {} actions from {}", pending, store.path().display());

    let browser = Arc::new(Browser::launch(browser_type, !no_headless).await?);
    let mut session = Session::new(browser.clone(), store, config, CaptureConfig::default());

    let mut events = session.subscribe();
    let progress = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = describe_event(&event) {
                eprintln!("{}", line);
            }
        }
    });

    let reply = session.handle(ShellCommand::PlayActions).await;
    // Closes the event channel so the progress task ends
    drop(session);
    let _ = progress.await;

    match Arc::try_unwrap(browser) {
        Ok(browser) => {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser session: {}", e);
            }
        }
        Err(_) => warn!("Browser still in use, leaving session open"),
    }

    let report = match reply {
        ShellReply::Playback { report } => report,
        other => anyhow::bail!("Unexpected reply to play command: {:?}", other),
    };
    if let Some(err) = report.clone().into_error() {
        for step in report.failed_steps() {
            warn!("Step {} ({}) failed: {}", step.index + 1, step.kind, step.error.as_deref().unwrap_or("unknown"));
        }
        return Err(err.into());
    }
    utils::print_json(&report)
}

pub fn playback_config(settle_ms: u64, dispatch_timeout: u64, attempts: u32) -> PlaybackConfig {
    PlaybackConfig {
        settle: Duration::from_millis(settle_ms),
        dispatch_timeout: Duration::from_millis(dispatch_timeout),
        max_attempts: attempts.max(1),
        ..PlaybackConfig::default()
    }
}

/// Human progress line for stderr; `None` for events not worth a line
pub fn describe_event(event: &PlaybackEvent) -> Option<String> {
    match event {
        PlaybackEvent::State { state } => match state {
            PlaybackState::Provisioning { url } => Some(format!("Opening {}", url)),
            PlaybackState::Retrying { index, attempt } => {
                Some(format!("Retrying step {} (attempt {})", index + 1, attempt))
            }
            _ => None,
        },
        PlaybackEvent::PlaybackProgress(progress) => Some(format!(
            "[{:>3}%] {}/{}",
            progress.percentage, progress.current, progress.total
        )),
        PlaybackEvent::Finished(report) => Some(match &report.message {
            Some(message) => format!("Finished: {}", message),
            None => "Finished".to_string(),
        }),
    }
}
