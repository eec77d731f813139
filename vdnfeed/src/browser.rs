use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Narrow interface over "render this URL into HTML".
///
/// The scraping pipeline only ever sees this trait, so extraction, feed
/// rendering and the cache gate stay testable without a real browser.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    /// Render the page at `url` and return its HTML after scripts have run.
    async fn render(&self, url: &str) -> Result<String>;
}

/// Renders pages by spawning a system-installed headless Chromium.
///
/// One process per render: launched with a throwaway profile directory,
/// asked to dump the DOM, and discarded. There is no pooling or reuse, and a
/// render that exceeds the timeout is killed rather than waited out.
pub struct ChromeSource {
    binary: String,
    timeout: Duration,
}

impl ChromeSource {
    /// `binary` overrides discovery; otherwise the CHROME_BIN environment
    /// variable is consulted, then plain "chromium".
    pub fn new(binary: Option<String>, timeout_seconds: u64) -> Self {
        let binary = binary
            .or_else(|| std::env::var("CHROME_BIN").ok())
            .unwrap_or_else(|| "chromium".to_string());
        info!(binary = %binary, "ChromeSource initialized");
        Self {
            binary,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }
}

#[async_trait::async_trait]
impl PageSource for ChromeSource {
    async fn render(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).context("invalid page URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("only http/https URLs allowed, got: {}", parsed.scheme());
        }

        let tmp_dir = tempfile::tempdir().context("failed to create temp profile dir")?;

        info!(url, source = "chrome", "Rendering page");

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args([
            "--headless",
            "--no-sandbox",
            "--disable-gpu",
            "--disable-dev-shm-usage",
            &format!("--user-data-dir={}", tmp_dir.path().display()),
            "--dump-dom",
            url,
        ])
        .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                anyhow::anyhow!("page render timed out after {}s", self.timeout.as_secs())
            })?
            .with_context(|| format!("failed to run {} for {}", self.binary, url))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("chromium exited with {}: {}", output.status, stderr.trim());
        }

        if output.stdout.is_empty() {
            warn!(url, source = "chrome", "Empty DOM output");
            anyhow::bail!("chromium returned an empty DOM for {}", url);
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(url, source = "chrome", bytes = html.len(), "Rendered page");
        Ok(html)
    }
}

/// Renders pages through a Browserless-style service's /content endpoint.
pub struct RemoteSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteSource {
    pub fn new(base_url: &str, token: Option<&str>, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("failed to build reqwest client")?;

        info!(base_url, "RemoteSource initialized");
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }
}

#[async_trait::async_trait]
impl PageSource for RemoteSource {
    async fn render(&self, url: &str) -> Result<String> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        info!(url, source = "remote", "Rendering page");

        let resp = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .context("content request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            anyhow::bail!("content endpoint returned {}: {}", status, message.trim());
        }

        let html = resp.text().await.context("failed to read content body")?;
        info!(url, source = "remote", bytes = html.len(), "Rendered page");
        Ok(html)
    }
}
