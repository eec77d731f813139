/*
vdnfeed - single-binary main.rs
This binary starts the Rocket HTTP server that scrapes the newsletter page on
demand and serves it as an RSS feed.
*/

use anyhow::anyhow;
use chrono::Utc;
use clap::Parser;
use common::{BrowserConfig, CacheConfig, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use vdnfeed::browser::{ChromeSource, PageSource, RemoteSource};
use vdnfeed::cache::{CacheStore, MemoryStore, RedisStore};
use vdnfeed::server::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "vdnfeed", about = "vdnfeed newsletter-page-to-RSS server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable the rendered-document cache (scrape on every request)
    #[arg(long)]
    no_cache: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    // Load configuration with defaults
    let config = match Config::load_with_defaults(
        if default_path.exists() {
            Some(&default_path)
        } else {
            None
        },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override_file = ?override_path, "configuration loaded");

    // Page source (headless browser) selected by configuration
    let source = match create_page_source(&config.browser) {
        Ok(s) => s,
        Err(e) => {
            error!(%e, "failed to initialize page source");
            return Err(e);
        }
    };

    // Cache store; absence means every request scrapes live
    let cache = if args.no_cache {
        info!("Cache disabled via CLI (--no-cache)");
        None
    } else {
        create_cache_store(&config.cache).await
    };

    let state = AppState {
        started_at: Utc::now(),
        config: Arc::new(config),
        source,
        cache,
    };

    // Launch the Rocket server (blocking until Rocket shuts down)
    info!("Launching Rocket HTTP server");
    if let Err(e) = server::launch_rocket(state).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Create a page source based on configuration
fn create_page_source(cfg: &BrowserConfig) -> anyhow::Result<Arc<dyn PageSource>> {
    match cfg.mode.as_str() {
        "chrome" => Ok(Arc::new(ChromeSource::new(
            cfg.binary.clone(),
            cfg.timeout_seconds,
        ))),
        "remote" => {
            let base = cfg
                .remote_url
                .as_deref()
                .ok_or_else(|| anyhow!("browser.mode = \"remote\" requires browser.remote_url"))?;
            let source = RemoteSource::new(base, cfg.remote_token.as_deref(), cfg.timeout_seconds)?;
            Ok(Arc::new(source))
        }
        other => anyhow::bail!("Unknown browser mode: {}", other),
    }
}

/// Create the cache store based on configuration.
/// A store that cannot be reached downgrades to no caching rather than
/// failing startup; the pipeline then scrapes live on every request.
async fn create_cache_store(cfg: &CacheConfig) -> Option<Arc<dyn CacheStore>> {
    if !cfg.enabled {
        return None;
    }

    match cfg.store.as_str() {
        "redis" => {
            let Some(url) = cfg.redis_url.as_deref() else {
                warn!("cache.store = \"redis\" but cache.redis_url is unset; caching disabled");
                return None;
            };
            match RedisStore::connect(url).await {
                Ok(store) => {
                    info!(key = %cfg.key, ttl = cfg.ttl_seconds, "Redis cache store initialized");
                    Some(Arc::new(store))
                }
                Err(e) => {
                    warn!(%e, "failed to connect to redis; caching disabled");
                    None
                }
            }
        }
        "memory" => {
            info!(key = %cfg.key, ttl = cfg.ttl_seconds, "In-memory cache store initialized");
            Some(Arc::new(MemoryStore::new()))
        }
        other => {
            warn!(store = other, "unknown cache store; caching disabled");
            None
        }
    }
}
