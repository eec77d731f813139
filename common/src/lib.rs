/*!
common/src/lib.rs

Shared configuration types for vdnfeed.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file
- A default+override merge so a packaged config.default.toml can ship
  alongside a user-edited config.toml
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HTTP server configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP server (e.g. "0.0.0.0")
    pub bind: Option<String>,
    /// TCP port for the HTTP server
    pub port: Option<u16>,
}

/// Upstream page to scrape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Page listing past newsletter issues
    #[serde(default = "default_source_url")]
    pub url: String,
    /// CSS selector for the container holding past-issue links
    #[serde(default = "default_selector")]
    pub selector: String,
}

fn default_source_url() -> String {
    "https://vuejsdevelopers.com/newsletter".to_string()
}

fn default_selector() -> String {
    ".past-issues".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            selector: default_selector(),
        }
    }
}

/// Fixed channel header of the rendered feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_title")]
    pub title: String,
    #[serde(default = "default_channel_link")]
    pub link: String,
    #[serde(default = "default_channel_description")]
    pub description: String,
}

fn default_channel_title() -> String {
    "Vue.js Developers Newsletter".to_string()
}

fn default_channel_link() -> String {
    "https://vuejsdevelopers.com/newsletter/".to_string()
}

fn default_channel_description() -> String {
    "The best Vue articles in your inbox, weekly".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: default_channel_title(),
            link: default_channel_link(),
            description: default_channel_description(),
        }
    }
}

/// Page rendering configuration.
///
/// `mode` selects how pages are turned into HTML:
/// - "chrome": spawn a local headless Chromium (`binary`, falling back to the
///   CHROME_BIN environment variable, then "chromium")
/// - "remote": POST to a Browserless-style /content endpoint at `remote_url`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_browser_mode")]
    pub mode: String,
    pub binary: Option<String>,
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    /// Wall-clock ceiling for one page render
    #[serde(default = "default_render_timeout")]
    pub timeout_seconds: u64,
}

fn default_browser_mode() -> String {
    "chrome".to_string()
}

fn default_render_timeout() -> u64 {
    15
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            mode: default_browser_mode(),
            binary: None,
            remote_url: None,
            remote_token: None,
            timeout_seconds: default_render_timeout(),
        }
    }
}

/// Rendered-document cache configuration.
///
/// When disabled every request scrapes live. When enabled the rendered XML is
/// kept under a single key with a fixed expiry; `store` selects the backend
/// ("redis" or "memory").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_store")]
    pub store: String,
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_key")]
    pub key: String,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

fn default_cache_store() -> String {
    "memory".to_string()
}

fn default_cache_key() -> String {
    "vdn".to_string()
}

fn default_cache_ttl() -> u64 {
    86_400
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store: default_cache_store(),
            redis_url: None,
            key: default_cache_key(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Top-level application configuration (deserialized from config.toml).
/// Every section is defaulted so the binary runs with no config file at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
