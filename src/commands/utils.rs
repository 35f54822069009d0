use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use webreplay::store::JsonFileStore;
use webreplay::webdriver::BrowserType;

/// Open the store at `path`, or the default one under the home directory
pub fn open_store(path: Option<PathBuf>) -> Result<Arc<JsonFileStore>> {
    let store = match path {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::open_default()?,
    };
    Ok(Arc::new(store))
}

pub fn parse_browser(browser: &str) -> Result<BrowserType> {
    browser.parse()
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
