//! Chromium session driving live listing pages.
//!
//! Uses chromiumoxide (CDP) to launch or attach to a Chrome instance and
//! hands out [`ChromePage`] tabs implementing the listing page abstraction.

mod config;
#[cfg(feature = "browser")]
mod page;

pub use config::BrowserEngineConfig;
#[cfg(feature = "browser")]
pub use page::{ChromeElement, ChromePage};

#[cfg(feature = "browser")]
use std::path::{Path, PathBuf};
#[cfg(feature = "browser")]
use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
use anyhow::Result;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info};

#[cfg(feature = "browser")]
use chromiumoxide::handler::{Handler, HandlerConfig};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig};
#[cfg(feature = "browser")]
use futures::StreamExt;

/// Well-known Chrome install locations (Linux, then macOS).
#[cfg(feature = "browser")]
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/opt/google/chrome/google-chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Executable names looked up on `PATH`.
#[cfg(feature = "browser")]
const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Arguments for an unattended listing crawl.
#[cfg(feature = "browser")]
const DEFAULT_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-sync",
    "--disable-translate",
    "--no-sandbox",
    "--disable-gpu",
];

#[cfg(feature = "browser")]
fn which(cmd: &str) -> Option<PathBuf> {
    let output = std::process::Command::new("which").arg(cmd).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// Locate a Chrome executable: configured path, known locations, then `PATH`.
#[cfg(feature = "browser")]
fn find_chrome(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        anyhow::ensure!(
            path.exists(),
            "Configured chrome_path does not exist: {}",
            path.display()
        );
        return Ok(path.to_path_buf());
    }

    let found = CHROME_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| CHROME_COMMANDS.iter().find_map(|cmd| which(cmd)));

    match found {
        Some(path) => {
            info!(path = %path.display(), "Found Chrome");
            Ok(path)
        }
        None => Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install chromium (e.g. `apt install chromium` or \
             `pacman -S chromium`) or set browser.chrome_path in the config file"
        )),
    }
}

/// Drive the CDP event loop until the connection ends.
#[cfg(feature = "browser")]
fn spawn_handler(mut handler: Handler) {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });
}

/// A running (or attached) Chrome instance.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    timeout: Duration,
    browser: Arc<Mutex<Browser>>,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Launch Chrome, or attach to `remote_url` when configured.
    pub async fn start(config: BrowserEngineConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout);
        let browser = match config.remote_url.as_deref() {
            Some(remote_url) => Self::connect(remote_url, timeout).await?,
            None => Self::launch(&config, timeout).await?,
        };
        Ok(Self {
            timeout,
            browser: Arc::new(Mutex::new(browser)),
        })
    }

    async fn launch(config: &BrowserEngineConfig, timeout: Duration) -> Result<Browser> {
        info!(headless = config.headless, "Launching browser");
        let chrome = find_chrome(config.chrome_path.as_deref())?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .request_timeout(timeout)
            .args(DEFAULT_ARGS.iter().copied())
            .args(config.chrome_args.iter());
        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid browser configuration: {}", e))?;
        let (browser, handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;
        spawn_handler(handler);
        Ok(browser)
    }

    /// Attach to a Chrome started with `--remote-debugging-port`.
    async fn connect(remote_url: &str, timeout: Duration) -> Result<Browser> {
        info!(url = remote_url, "Connecting to remote browser");

        // DevTools publishes the WebSocket endpoint at /json/version
        let http_url = remote_url
            .replacen("ws://", "http://", 1)
            .replacen("wss://", "https://", 1);
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let version: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("Remote browser unreachable at {}", version_url))?
            .json()
            .await
            .context("Remote browser returned invalid version info")?;
        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in {}", version_url))?;

        debug!(ws_url, "Attaching over WebSocket");
        let handler_config = HandlerConfig {
            request_timeout: timeout,
            ..Default::default()
        };
        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to attach to remote browser")?;
        spawn_handler(handler);
        Ok(browser)
    }

    /// Open a blank tab.
    pub async fn new_page(&self) -> Result<ChromePage> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;
        Ok(ChromePage::new(page, Arc::clone(&self.browser), self.timeout))
    }

    /// Shut the browser down.
    pub async fn close(self) {
        if let Err(e) = self.browser.lock().await.close().await {
            debug!(error = %e, "Browser close failed");
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession;

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub async fn start(_config: BrowserEngineConfig) -> Result<Self> {
        Err(anyhow::anyhow!(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
        ))
    }

    pub async fn close(self) {}
}
