//! Browser tools over one owned browser context.
//!
//! ```text
//! ToolRegistry ──attach_browser──► BrowserLauncher::launch()
//!      │                                 │
//!      │ owns                            ▼
//!      └──────────────► BrowserHandle { Mutex<Option<Box<dyn BrowserContext>>> }
//!                            ▲        ▲        ▲
//!              navigate_browser  current_webpage  extract_text
//! ```
//!
//! The mutex serializes tool calls on the shared context. `release` closes
//! the context and empties the slot; tools called afterwards fail cleanly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::tools::{ExecResult, ExecutionEngine};

use super::{html_to_text, truncate_chars};

/// A live browsing session.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Load `url`. Returns a one-line status for the model.
    async fn navigate(&mut self, url: &str) -> anyhow::Result<String>;

    /// URL of the loaded page, if any.
    fn current_url(&self) -> Option<String>;

    /// Visible text of the loaded page.
    async fn page_text(&self) -> anyhow::Result<String>;

    /// Release whatever the context holds.
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Creates browser contexts.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserContext>>;
}

/// Shared ownership of at most one browser context.
#[derive(Clone)]
pub struct BrowserHandle {
    slot: Arc<Mutex<Option<Box<dyn BrowserContext>>>>,
}

impl std::fmt::Debug for BrowserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserHandle").finish_non_exhaustive()
    }
}

impl BrowserHandle {
    /// Launch a context and take ownership of it.
    pub async fn acquire(launcher: &dyn BrowserLauncher) -> anyhow::Result<Self> {
        let context = launcher.launch().await?;
        info!("browser context acquired");
        Ok(Self {
            slot: Arc::new(Mutex::new(Some(context))),
        })
    }

    /// Close the context. Later calls are no-ops.
    pub async fn release(&self) {
        let Some(mut context) = self.slot.lock().await.take() else {
            return;
        };
        match context.close().await {
            Ok(()) => info!("browser context released"),
            Err(e) => warn!(error = %e, "browser context did not close cleanly"),
        }
    }

    pub async fn is_open(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

/// The three browser engines sharing `handle`.
pub fn browser_tools(handle: &BrowserHandle) -> Vec<Arc<dyn ExecutionEngine>> {
    vec![
        Arc::new(NavigateEngine::new(handle.clone())),
        Arc::new(CurrentWebpageEngine::new(handle.clone())),
        Arc::new(ExtractTextEngine::new(handle.clone())),
    ]
}

fn closed() -> ExecResult {
    ExecResult::failure(1, "Browser is closed")
}

// ============================================================================
// Engines
// ============================================================================

/// Engine that loads a URL in the shared browser.
pub struct NavigateEngine {
    handle: BrowserHandle,
}

impl NavigateEngine {
    pub fn new(handle: BrowserHandle) -> Self {
        Self { handle }
    }
}

#[derive(Deserialize)]
struct NavigateParams {
    url: String,
}

#[async_trait]
impl ExecutionEngine for NavigateEngine {
    fn name(&self) -> &str {
        "navigate_browser"
    }

    fn description(&self) -> &str {
        "Navigate the browser to a URL"
    }

    fn schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to navigate to"
                }
            },
            "required": ["url"]
        }))
    }

    #[tracing::instrument(skip(self, params), name = "engine.navigate_browser")]
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        let p: NavigateParams = match serde_json::from_str(params) {
            Ok(v) => v,
            Err(e) => return Ok(ExecResult::failure(1, format!("Invalid params: {}", e))),
        };

        let mut slot = self.handle.slot.lock().await;
        let Some(context) = slot.as_mut() else {
            return Ok(closed());
        };
        match context.navigate(&p.url).await {
            Ok(status) => Ok(ExecResult::success(status)),
            Err(e) => Ok(ExecResult::failure(1, format!("Navigation to {} failed: {}", p.url, e))),
        }
    }
}

/// Engine that reports the loaded page's URL.
pub struct CurrentWebpageEngine {
    handle: BrowserHandle,
}

impl CurrentWebpageEngine {
    pub fn new(handle: BrowserHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl ExecutionEngine for CurrentWebpageEngine {
    fn name(&self) -> &str {
        "current_webpage"
    }

    fn description(&self) -> &str {
        "Return the URL of the page the browser is on"
    }

    async fn execute(&self, _params: &str) -> anyhow::Result<ExecResult> {
        let slot = self.handle.slot.lock().await;
        let Some(context) = slot.as_ref() else {
            return Ok(closed());
        };
        Ok(match context.current_url() {
            Some(url) => ExecResult::success(url),
            None => ExecResult::success("about:blank"),
        })
    }
}

/// Engine that returns the loaded page's text.
pub struct ExtractTextEngine {
    handle: BrowserHandle,
}

impl ExtractTextEngine {
    pub fn new(handle: BrowserHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl ExecutionEngine for ExtractTextEngine {
    fn name(&self) -> &str {
        "extract_text"
    }

    fn description(&self) -> &str {
        "Extract all visible text from the current page"
    }

    #[tracing::instrument(skip(self, _params), name = "engine.extract_text")]
    async fn execute(&self, _params: &str) -> anyhow::Result<ExecResult> {
        let slot = self.handle.slot.lock().await;
        let Some(context) = slot.as_ref() else {
            return Ok(closed());
        };
        match context.page_text().await {
            Ok(text) => Ok(ExecResult::success(text)),
            Err(e) => Ok(ExecResult::failure(1, e.to_string())),
        }
    }
}

// ============================================================================
// HTTP browser
// ============================================================================

/// Launches [`HttpBrowser`] contexts.
///
/// A fetch-only browser: no JavaScript, no rendering. Enough for reading
/// static pages, and it needs nothing installed.
#[derive(Debug, Clone)]
pub struct HttpBrowserLauncher {
    pub timeout: Duration,
    pub max_chars: usize,
}

#[async_trait]
impl BrowserLauncher for HttpBrowserLauncher {
    async fn launch(&self) -> anyhow::Result<Box<dyn BrowserContext>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Box::new(HttpBrowser {
            client,
            max_chars: self.max_chars,
            page: None,
        }))
    }
}

struct LoadedPage {
    url: String,
    html: String,
}

/// A browser context that fetches pages with plain HTTP.
pub struct HttpBrowser {
    client: reqwest::Client,
    max_chars: usize,
    page: Option<LoadedPage>,
}

#[async_trait]
impl BrowserContext for HttpBrowser {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<String> {
        debug!(url, "navigating");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let html = response.text().await?;
        self.page = Some(LoadedPage {
            url: final_url,
            html,
        });
        Ok(format!(
            "Navigating to {} returned status code {}",
            url,
            status.as_u16()
        ))
    }

    fn current_url(&self) -> Option<String> {
        self.page.as_ref().map(|p| p.url.clone())
    }

    async fn page_text(&self) -> anyhow::Result<String> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No page loaded; call navigate_browser first"))?;
        Ok(truncate_chars(&html_to_text(&page.html)?, self.max_chars))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.page = None;
        Ok(())
    }
}
