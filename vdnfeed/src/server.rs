use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use common::Config;
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{get, routes, Build, Responder, Rocket, State};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::browser::PageSource;
use crate::cache::CacheStore;
use crate::{feed, scraping};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub source: Arc<dyn PageSource>,
    /// `None` runs the pipeline uncached on every request.
    pub cache: Option<Arc<dyn CacheStore>>,
}

/// Edge caches may reuse a response for six hours and serve it stale for a
/// day while revalidating; clients themselves always revalidate.
const CACHE_CONTROL: &str = "max-age=0, s-maxage=21600, stale-while-revalidate=86400";

/// Successful feed response: the rendered document plus the edge-cache header.
#[derive(Responder)]
#[response(status = 200, content_type = "application/rss+xml")]
pub struct FeedXml {
    body: String,
    cache_control: Header<'static>,
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    source_url: String,
    cache_enabled: bool,
}

/// Run the gated pipeline and return the rendered document.
///
/// With a cache store attached: a present, non-empty entry short-circuits the
/// request and the scraper is never invoked; on a miss the scrape+render
/// result is written back under the configured key and TTL. Store failures
/// are non-fatal: a failed read falls through to a live scrape, a failed
/// write serves the document uncached.
pub async fn feed_document(state: &AppState) -> Result<String> {
    let cfg = &state.config;
    let key = cfg.cache.key.as_str();

    if let Some(cache) = &state.cache {
        match cache.get(key).await {
            Ok(Some(cached)) if !cached.is_empty() => {
                debug!(key, "serving cached feed document");
                return Ok(cached);
            }
            Ok(_) => {}
            Err(e) => warn!(key, error = %e, "cache read failed, scraping live"),
        }
    }

    let items = scraping::fetch_issues(state.source.as_ref(), &cfg.source).await?;
    let xml = feed::build_xml(&items, &cfg.channel, Utc::now())?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set_ex(key, &xml, cfg.cache.ttl_seconds).await {
            warn!(key, error = %e, "cache write failed, serving uncached");
        }
    }

    Ok(xml)
}

async fn serve_feed(state: &AppState) -> Result<FeedXml, Status> {
    let body = feed_document(state).await.map_err(|e| {
        error!("failed to produce feed: {:#}", e);
        Status::InternalServerError
    })?;

    Ok(FeedXml {
        body,
        cache_control: Header::new("Cache-Control", CACHE_CONTROL),
    })
}

/// Feed endpoint. The request carries no inputs; its arrival is the trigger.
#[get("/")]
async fn feed_root(state: &State<AppState>) -> Result<FeedXml, Status> {
    serve_feed(state.inner()).await
}

#[get("/rss.xml")]
async fn feed_rss(state: &State<AppState>) -> Result<FeedXml, Status> {
    serve_feed(state.inner()).await
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint returning simple JSON with uptime and basic config info.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let now = Utc::now();
    let uptime = (now - state.started_at).num_seconds();

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        source_url: state.config.source.url.clone(),
        cache_enabled: state.cache.is_some(),
    })
}

/// Build the Rocket instance with managed state and mounted routes, applying
/// `[server]` bind/port from configuration when present.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = &state.config.server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    rocket::custom(fig)
        .manage(state)
        .mount("/", routes![feed_root, feed_rss, health, status])
}

/// Launch the Rocket server (blocking until Rocket shuts down).
pub async fn launch_rocket(state: AppState) -> Result<()> {
    tracing::info!("Starting Rocket HTTP server");
    build_rocket(state)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
