use anyhow::Result;
use std::path::PathBuf;

use crate::commands::utils;
use webreplay::store::ActionStore;
use webreplay::types::{Action, OutputFormat, render_script};

pub async fn handle_actions(format: OutputFormat, store: Option<PathBuf>) -> Result<()> {
    let store = utils::open_store(store)?;
    let snapshot = store.load().await?;

    match format {
        OutputFormat::Json => utils::print_json(&snapshot)?,
        OutputFormat::Simple => {
            if snapshot.is_recording {
                println!("(recording in progress)");
            }
            print!("{}", render_simple(&snapshot.recorded_actions));
        }
    }
    Ok(())
}

/// Numbered one-line-per-action listing
pub fn render_simple(actions: &[Action]) -> String {
    if actions.is_empty() {
        return "No recorded actions\n".to_string();
    }
    format!("{}\n", render_script(actions))
}
