// Common test utilities and fixtures
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use webreplay::dom::Document;
use webreplay::locator::Locator;
use webreplay::simulated::SimulatedBrowser;
use webreplay::types::{Action, ActionKind};

pub const SIGNUP: &str = "https://shop.test/signup";
pub const WELCOME: &str = "https://shop.test/welcome";

/// Signup form: `#A` button, `#B` text field, a newsletter checkbox
pub fn signup_page(url: &str) -> Document {
    let mut doc = Document::new(url);
    let body = doc.body();
    let form = doc.append_with(body, "form", &[("id", "signup")]);
    doc.append_with(form, "button", &[("id", "A"), ("type", "button")]);
    doc.append_with(form, "input", &[("id", "B"), ("type", "text")]);
    doc.append_with(form, "input", &[("id", "news"), ("type", "checkbox")]);
    doc
}

pub fn welcome_page(url: &str) -> Document {
    let mut doc = Document::new(url);
    let body = doc.body();
    doc.append_with(body, "h1", &[("id", "greeting")]);
    doc
}

pub fn shop() -> Arc<SimulatedBrowser> {
    Arc::new(
        SimulatedBrowser::new()
            .with_page(SIGNUP, signup_page)
            .with_page(WELCOME, welcome_page),
    )
}

pub fn click(id: &str, page: &str) -> Action {
    Action::new(
        ActionKind::Click {
            tag_name: "button".into(),
            element_type: None,
            element_id: Some(id.into()),
            class_name: None,
            parent_context: Vec::new(),
        },
        Some(Locator::by_id(id)),
        0.0,
        page,
    )
}

pub fn navigation(url: &str, from: &str) -> Action {
    Action::new(
        ActionKind::Navigation {
            url: url.into(),
            from_url: Some(from.into()),
        },
        None,
        0.0,
        url,
    )
}

/// Browser picked by `WEBREPLAY_TEST_BROWSER`, Firefox by default

pub fn get_test_browser() -> String {
    std::env::var("WEBREPLAY_TEST_BROWSER").unwrap_or_else(|_| "firefox".to_string())
}

/// Write `html` to a temporary file and return its path

pub fn create_test_html(html: &str) -> PathBuf {
    let file = tempfile::Builder::new()
        .prefix("webreplay-test-")
        .suffix(".html")
        .tempfile()
        .expect("Failed to create temp file");
    std::fs::write(file.path(), html).expect("Failed to write test HTML");
    let (_, path) = file.keep().expect("Failed to keep temp file");
    path
}
