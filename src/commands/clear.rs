use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::commands::utils;
use webreplay::store::ActionStore;

pub async fn handle_clear(store: Option<PathBuf>) -> Result<()> {
    let store = utils::open_store(store)?;
    let discarded = store.actions().await?.len();
    store.clear().await?;
    info!("Cleared {} actions from {}", discarded, store.path().display());

    utils::print_json(&json!({
        "cleared": true,
        "discarded": discarded,
    }))
}
