use std::sync::Arc;

use chrono::Utc;
use common::Config;
use rocket::http::Status;
use rocket::local::asynchronous::Client;
use vdnfeed::browser::PageSource;
use vdnfeed::cache::{CacheStore, MemoryStore};
use vdnfeed::server::{build_rocket, AppState};

const PAGE: &str = r#"
    <html><body>
      <div class="past-issues">
        <a href="/newsletter/issues/280">
          Issue #280, Jan 1, 2024
          Everything new in Vue this week.
        </a>
      </div>
    </body></html>
"#;

struct StaticSource(String);

#[async_trait::async_trait]
impl PageSource for StaticSource {
    async fn render(&self, _url: &str) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

struct FailingSource;

#[async_trait::async_trait]
impl PageSource for FailingSource {
    async fn render(&self, _url: &str) -> anyhow::Result<String> {
        anyhow::bail!("upstream unavailable")
    }
}

fn app_state(source: Arc<dyn PageSource>, cache: Option<Arc<dyn CacheStore>>) -> AppState {
    AppState {
        started_at: Utc::now(),
        config: Arc::new(Config::default()),
        source,
        cache,
    }
}

async fn client(state: AppState) -> Client {
    Client::tracked(build_rocket(state))
        .await
        .expect("valid rocket instance")
}

#[rocket::async_test]
async fn feed_endpoint_returns_rss_with_cache_control() {
    let state = app_state(Arc::new(StaticSource(PAGE.to_string())), None);
    let client = client(state).await;

    let resp = client.get("/rss.xml").dispatch().await;
    assert_eq!(resp.status(), Status::Ok);
    assert_eq!(
        resp.content_type(),
        Some(rocket::http::ContentType::new("application", "rss+xml"))
    );
    assert_eq!(
        resp.headers().get_one("Cache-Control"),
        Some("max-age=0, s-maxage=21600, stale-while-revalidate=86400")
    );

    let body = resp.into_string().await.expect("body");
    assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
    assert!(body.contains("<rss version=\"2.0\">"));
    assert!(body.contains("<guid>https://vuejsdevelopers.com/newsletter/issues/280</guid>"));
}

#[rocket::async_test]
async fn root_serves_the_same_feed() {
    let state = app_state(Arc::new(StaticSource(PAGE.to_string())), None);
    let client = client(state).await;

    let resp = client.get("/").dispatch().await;
    assert_eq!(resp.status(), Status::Ok);
    let body = resp.into_string().await.expect("body");
    assert!(body.contains("<title>Issue #280</title>"));
}

#[rocket::async_test]
async fn pipeline_failure_surfaces_as_500() {
    let state = app_state(Arc::new(FailingSource), None);
    let client = client(state).await;

    let resp = client.get("/rss.xml").dispatch().await;
    assert_eq!(resp.status(), Status::InternalServerError);
}

#[rocket::async_test]
async fn cached_document_is_served_verbatim() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    store
        .set_ex("vdn", "<primed-document/>", 60)
        .await
        .expect("prime cache");

    // A failing source proves the scraper is never consulted on a hit.
    let state = app_state(Arc::new(FailingSource), Some(store));
    let client = client(state).await;

    let resp = client.get("/rss.xml").dispatch().await;
    assert_eq!(resp.status(), Status::Ok);
    assert_eq!(
        resp.into_string().await.as_deref(),
        Some("<primed-document/>")
    );
}

#[rocket::async_test]
async fn health_endpoint_responds_ok() {
    let state = app_state(Arc::new(StaticSource(PAGE.to_string())), None);
    let client = client(state).await;

    let resp = client.get("/health").dispatch().await;
    assert_eq!(resp.status(), Status::Ok);
    assert_eq!(resp.into_string().await.as_deref(), Some("OK"));
}

#[rocket::async_test]
async fn status_endpoint_reports_config() {
    let state = app_state(Arc::new(StaticSource(PAGE.to_string())), None);
    let client = client(state).await;

    let resp = client.get("/api/v1/status").dispatch().await;
    assert_eq!(resp.status(), Status::Ok);

    let body: serde_json::Value =
        serde_json::from_str(&resp.into_string().await.expect("body")).expect("json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["source_url"], "https://vuejsdevelopers.com/newsletter");
    assert_eq!(body["cache_enabled"], false);
}
