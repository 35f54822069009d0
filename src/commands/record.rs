use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::commands::utils;
use webreplay::capture::{CaptureConfig, RawEvent};
use webreplay::host::TabHost;
use webreplay::session::Recorder;
use webreplay::store::JsonFileStore;
use webreplay::types::TabId;
use webreplay::webdriver::{Browser, PageEvent};

pub async fn handle_record(
    url: String,
    browser: String,
    duration: Option<u64>,
    no_headless: bool,
    poll_ms: u64,
    store: Option<PathBuf>,
) -> Result<()> {
    let browser_type = utils::parse_browser(&browser)?;
    let store = utils::open_store(store)?;
    let browser = Browser::launch(browser_type, !no_headless).await?;

    let result = record(&browser, store, &url, duration, poll_ms).await;

    if let Err(e) = browser.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    let (session_id, action_count) = result?;

    utils::print_json(&json!({
        "sessionId": session_id,
        "actionCount": action_count,
    }))
}

async fn record(
    browser: &Browser,
    store: Arc<JsonFileStore>,
    url: &str,
    duration: Option<u64>,
    poll_ms: u64,
) -> Result<(uuid::Uuid, usize)> {
    let first = browser.create_tab(url, true).await?;
    browser.install_recorder(&first.id).await?;

    let mut recorder = Recorder::new(store, CaptureConfig::default());
    let meta = recorder.start(Some(first.url.as_str())).await?;
    recorder.set_current_tab(Some(first.id.clone()));
    eprintln!("Recording {} (Ctrl-C to stop)", first.url);

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut ticker = tokio::time::interval(Duration::from_millis(poll_ms.max(10)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut current = first.id;
    let mut live_url = first.url;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping recording");
                break;
            }
            _ = ticker.tick() => {}
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            info!("Recording duration reached");
            break;
        }

        for tab in browser.adopt_new_windows().await? {
            let tab_url = browser.current_url(&tab).await.ok();
            let created = RawEvent::TabCreated {
                tab: tab.clone(),
                opener: Some(current.clone()),
                url: tab_url,
            };
            recorder.capture(created, &live_url).await?;
            if let Err(e) = browser.install_recorder(&tab).await {
                warn!("Cannot record in {}: {:#}", tab, e);
            }
        }

        for tab in browser.tab_ids() {
            let batch = match browser.drain_events(&tab).await {
                Ok(batch) => batch,
                Err(e) => {
                    debug!("Skipping {}: {:#}", tab, e);
                    continue;
                }
            };
            if tab == current {
                live_url = batch.url.clone();
            }
            for PageEvent { page_url, event } in batch.events {
                if tab != current {
                    switch_tab(&mut recorder, &mut current, &tab, &page_url).await?;
                    live_url = batch.url.clone();
                }
                recorder.capture(event, &page_url).await?;
            }
        }

        recorder.tick(&live_url).await?;
    }

    let action_count = recorder.stop().await?;
    Ok((meta.session_id, action_count))
}

async fn switch_tab(
    recorder: &mut Recorder<JsonFileStore>,
    current: &mut TabId,
    tab: &TabId,
    page_url: &str,
) -> Result<()> {
    debug!("Activity moved from {} to {}", current, tab);
    recorder.focus_tab(tab.clone(), page_url).await?;
    recorder.set_current_tab(Some(tab.clone()));
    *current = tab.clone();
    Ok(())
}
