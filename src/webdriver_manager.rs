//! Locates or launches the WebDriver server a browser session talks to.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::webdriver::BrowserType;

/// Polls of a freshly spawned driver before giving up (100 ms apart)
const STARTUP_POLLS: u32 = 30;

/// WebDriver servers started by this process
#[derive(Default)]
pub struct DriverManager {
    processes: Mutex<Vec<DriverProcess>>,
}

struct DriverProcess {
    browser_type: BrowserType,
    child: Child,
    port: u16,
    url: String,
}

/// `GET /status` reply of a W3C WebDriver server
#[derive(Debug, Deserialize)]
pub struct DriverStatus {
    pub value: DriverStatusValue,
}

#[derive(Debug, Deserialize)]
pub struct DriverStatusValue {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub message: String,
}

impl BrowserType {
    /// Executable of the matching WebDriver server
    pub fn driver_command(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "geckodriver",
            BrowserType::Chrome => "chromedriver",
        }
    }

    /// Ports tried first, standard one leading
    fn preferred_ports(&self) -> [u16; 3] {
        match self {
            BrowserType::Firefox => [4444, 4445, 4446],
            BrowserType::Chrome => [9515, 9516, 9517],
        }
    }

    fn port_args(&self, port: u16) -> Vec<String> {
        match self {
            BrowserType::Firefox => vec!["--port".to_string(), port.to_string()],
            BrowserType::Chrome => vec![format!("--port={}", port)],
        }
    }
}

impl DriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL of a ready driver for `browser_type`, starting one if needed
    pub async fn ensure_driver(&self, browser_type: BrowserType) -> Result<String> {
        for url in self.managed_urls(browser_type) {
            if Self::is_ready(&url).await {
                debug!("Using managed WebDriver at {}", url);
                return Ok(url);
            }
        }

        let standard = format!("http://localhost:{}", browser_type.preferred_ports()[0]);
        if Self::is_ready(&standard).await {
            debug!("Found external WebDriver at {}", standard);
            return Ok(standard);
        }

        info!("No {} detected, starting one", browser_type.driver_command());
        self.start_driver(browser_type).await
    }

    async fn start_driver(&self, browser_type: BrowserType) -> Result<String> {
        let command = browser_type.driver_command();
        if !Self::command_exists(command) {
            anyhow::bail!(
                "{} not found in PATH. Install it from your package manager or see \
                 https://www.selenium.dev/documentation/webdriver/troubleshooting/errors/driver_location/",
                command
            );
        }

        let port = Self::find_free_port(browser_type)?;
        let mut cmd = Command::new(command);
        cmd.args(browser_type.port_args(port))
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group so the browser it spawns goes down with it
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", command))?;
        let url = format!("http://localhost:{}", port);
        info!("Started {} (pid {}) on port {}", command, child.id(), port);

        if let Ok(mut processes) = self.processes.lock() {
            processes.push(DriverProcess {
                browser_type,
                child,
                port,
                url: url.clone(),
            });
        }

        for _ in 0..STARTUP_POLLS {
            if Self::is_ready(&url).await {
                return Ok(url);
            }
            sleep(Duration::from_millis(100)).await;
        }

        self.stop_port(port);
        anyhow::bail!("{} did not become ready on port {}", command, port)
    }

    fn managed_urls(&self, browser_type: BrowserType) -> Vec<String> {
        self.processes
            .lock()
            .map(|processes| {
                processes
                    .iter()
                    .filter(|p| p.browser_type == browser_type)
                    .map(|p| p.url.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if a command exists in PATH
    pub fn command_exists(command: &str) -> bool {
        let finder = if cfg!(windows) { "where" } else { "which" };
        Command::new(finder)
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// First free preferred port, else one assigned by the OS
    pub fn find_free_port(browser_type: BrowserType) -> Result<u16> {
        if let Some(port) = browser_type
            .preferred_ports()
            .into_iter()
            .find(|port| !Self::is_port_in_use(*port))
        {
            return Ok(port);
        }
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        Ok(listener.local_addr()?.port())
    }

    pub fn is_port_in_use(port: u16) -> bool {
        std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
    }

    /// Status of the driver at `url`, `None` when unreachable
    pub async fn status(url: &str) -> Option<DriverStatus> {
        let response = reqwest::Client::new()
            .get(format!("{}/status", url))
            .timeout(Duration::from_secs(1))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json::<DriverStatus>().await.ok()
    }

    /// A driver that answers but reports not ready already holds a session
    pub async fn is_ready(url: &str) -> bool {
        match Self::status(url).await {
            Some(status) => {
                if !status.value.ready {
                    debug!("WebDriver at {} busy: {}", url, status.value.message);
                }
                status.value.ready
            }
            None => false,
        }
    }

    fn stop_port(&self, port: u16) {
        if let Ok(mut processes) = self.processes.lock()
            && let Some(index) = processes.iter().position(|p| p.port == port)
        {
            let process = processes.remove(index);
            Self::terminate(process);
        }
    }

    /// Stop every driver this process started
    pub fn stop_all(&self) {
        if let Ok(mut processes) = self.processes.lock() {
            for process in processes.drain(..) {
                Self::terminate(process);
            }
        }
    }

    fn terminate(mut process: DriverProcess) {
        debug!("Stopping WebDriver on port {}", process.port);
        #[cfg(unix)]
        {
            // Negative pid addresses the whole process group
            let _ = Command::new("kill")
                .args(["-TERM", &format!("-{}", process.child.id())])
                .output();
        }
        let _ = process.child.kill();
        let _ = process.child.wait();
    }
}

impl Drop for DriverManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

lazy_static::lazy_static! {
    pub static ref GLOBAL_DRIVER_MANAGER: DriverManager = DriverManager::new();
}

#[cfg(test)]
#[path = "webdriver_manager_test.rs"]
mod webdriver_manager_test;
