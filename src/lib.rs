//! # webreplay
#![allow(clippy::uninlined_format_args)]
//!
//! Record browser interactions into a portable action log and replay them.
//!
//! Recording turns raw page events (clicks, typing, checkbox and select
//! changes, scrolling, form submits, tab switches) into a compact sequence of
//! [`Action`]s. Each action carries a [`Locator`] plus enough element context
//! to find the target again after the page has changed. Playback drives a
//! browser tab through the sequence one step at a time, retrying flaky steps
//! and skipping the ones that keep failing.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Record until Ctrl-C (or for a fixed time)
//! webreplay record "https://example.com/signup"
//! webreplay record "https://example.com/signup" --duration 60 --no-headless
//!
//! # Show what was captured
//! webreplay actions
//! webreplay actions --format simple
//!
//! # Replay it, streaming progress to stderr
//! webreplay play --browser chrome
//! webreplay play --attempts 5 --settle-ms 250
//!
//! # Forget the recorded sequence
//! webreplay clear
//! ```
//!
//! Every command prints JSON on stdout. Failures print
//! `{"error": true, "message": ..., "exit_code": ...}` and exit with the
//! matching code from [`ReplayError::exit_code`].
//!
//! The sequence lives in `~/.webreplay/store.json` unless `--store` points
//! elsewhere. Set `RUST_LOG=webreplay=debug` for detailed logs.
//!
//! ## Library Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use webreplay::{Browser, BrowserType, JsonFileStore, PlaybackConfig, Player};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = JsonFileStore::open_default()?;
//! let browser = Arc::new(Browser::launch(BrowserType::Firefox, true).await?);
//!
//! let mut player = Player::new(browser, PlaybackConfig::default());
//! let report = player.play_from_store(&store).await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

/// Page-agent protocol and the in-memory agent
pub mod agent;

/// Event capture and coalescing
pub mod capture;

/// Text edit deltas
pub mod delta;

/// In-memory DOM used by the simulated browser
pub mod dom;

/// Error taxonomy and exit codes
pub mod errors;

/// Browser abstraction driven during playback
pub mod host;

/// Element locators and the fallback chain
pub mod locator;

/// Playback orchestration
pub mod playback;

/// Recording controller and command shell
pub mod session;

/// In-process browser for tests and dry runs
pub mod simulated;

/// Action sequence persistence
pub mod store;

/// Playback tab ownership
pub mod tab_manager;

/// Action model
pub mod types;

/// WebDriver browser control and automation
pub mod webdriver;

/// Automatic WebDriver process management
pub mod webdriver_manager;

pub use capture::{CaptureConfig, RawEvent};
pub use errors::ReplayError;
pub use host::{TabHost, TabInfo};
pub use locator::Locator;
pub use playback::{PlaybackConfig, PlaybackEvent, PlaybackReport, PlaybackStatus, Player};
pub use session::{Recorder, Session, ShellCommand, ShellReply};
pub use simulated::SimulatedBrowser;
pub use store::{ActionStore, JsonFileStore, MemoryStore};
pub use types::{Action, ActionKind, OutputFormat, TabId};
pub use webdriver::{Browser, BrowserType};
