//! WebScraperEngine — fetch a page over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::tools::{ExecResult, ExecutionEngine};

use super::{html_to_markdown, html_to_text, truncate_chars};

/// Scraper limits, from the `[tools]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    pub timeout: Duration,
    /// Output is cut at this many characters.
    pub max_chars: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_chars: 20_000,
        }
    }
}

/// Engine that fetches a URL and returns its body.
pub struct WebScraperEngine {
    client: reqwest::Client,
    config: ScraperConfig,
}

impl std::fmt::Debug for WebScraperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebScraperEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WebScraperEngine {
    pub fn new(config: ScraperConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client, config })
    }
}

#[derive(Deserialize)]
struct ScraperParams {
    url: String,
    #[serde(default)]
    format: OutputFormat,
}

#[derive(Deserialize, Default, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum OutputFormat {
    /// Page converted to markdown.
    #[default]
    Markdown,
    /// Page rendered as plain text.
    Text,
}

#[async_trait]
impl ExecutionEngine for WebScraperEngine {
    fn name(&self) -> &str {
        "web_scraper"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its content. Use this for reading articles, documentation, and blog posts."
    }

    fn schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch (http or https)"
                },
                "format": {
                    "type": "string",
                    "enum": ["markdown", "text"],
                    "description": "'markdown' converts the page to markdown, 'text' renders plain text (default: markdown)"
                }
            },
            "required": ["url"]
        }))
    }

    #[tracing::instrument(skip(self, params), name = "engine.web_scraper")]
    async fn execute(&self, params: &str) -> anyhow::Result<ExecResult> {
        let p: ScraperParams = match serde_json::from_str(params) {
            Ok(v) => v,
            Err(e) => return Ok(ExecResult::failure(1, format!("Invalid params: {}", e))),
        };

        if !(p.url.starts_with("http://") || p.url.starts_with("https://")) {
            return Ok(ExecResult::failure(1, format!("Unsupported URL: {}", p.url)));
        }

        debug!(url = %p.url, "scraping");
        let response = match self.client.get(&p.url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %p.url, error = %e, "scrape failed");
                return Ok(ExecResult::failure(1, format!("Error scraping {}: {}", p.url, e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ExecResult::failure(
                1,
                format!("Scraping failed: {} returned {}", p.url, status),
            ));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return Ok(ExecResult::failure(1, format!("Error reading {}: {}", p.url, e)));
            }
        };

        let converted = match p.format {
            OutputFormat::Markdown => html_to_markdown(&body),
            OutputFormat::Text => html_to_text(&body),
        };
        match converted {
            Ok(content) => Ok(ExecResult::success(truncate_chars(&content, self.config.max_chars))),
            Err(e) => Ok(ExecResult::failure(1, format!("Error converting {}: {}", p.url, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_bad_input_without_network() {
        let engine = WebScraperEngine::new(ScraperConfig::default()).unwrap();

        let out = engine.execute(r#"{"url": "file:///etc/passwd"}"#).await.unwrap();
        assert_eq!(out.stderr, "Unsupported URL: file:///etc/passwd");

        let out = engine
            .execute(r#"{"url": "http://x", "format": "pdf"}"#)
            .await
            .unwrap();
        assert!(out.stderr.starts_with("Invalid params"));
    }

    #[tokio::test]
    async fn connection_refused_is_a_tool_failure() {
        let engine = WebScraperEngine::new(ScraperConfig {
            timeout: Duration::from_secs(2),
            max_chars: 100,
        })
        .unwrap();
        let out = engine.execute(r#"{"url": "http://127.0.0.1:9/"}"#).await.unwrap();
        assert!(!out.success);
        assert!(out.stderr.starts_with("Error scraping http://127.0.0.1:9/"));
    }
}
