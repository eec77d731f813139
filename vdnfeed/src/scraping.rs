use anyhow::{Context, Result};
use common::SourceConfig;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::browser::PageSource;
use crate::feed::FeedItem;

/// Parsed anchor text, before it becomes a feed item.
///
/// The grammar is small: the first line is `title ", " date`, everything
/// after it is the description. A parse never fails outright; missing pieces
/// surface as `None` so callers can tell a full parse from a partial one
/// instead of working with silently-empty fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorText {
    pub title: String,
    pub date: Option<String>,
    pub desc: Option<String>,
}

impl AnchorText {
    pub fn is_complete(&self) -> bool {
        self.date.is_some() && self.desc.is_some()
    }
}

/// Split an anchor's visible text into title, date and description.
///
/// Lines are trimmed and blank lines dropped. The first line is split on the
/// first `", "` only, so a date like "Jan 1, 2024" keeps its internal comma.
/// Remaining lines are joined into a single-line description.
pub fn parse_anchor_text(text: &str) -> AnchorText {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next().unwrap_or("");
    let rest: Vec<&str> = lines.collect();

    let (title, date) = match first.split_once(", ") {
        Some((title, date)) => (title.to_string(), Some(date.to_string())),
        None => (first.to_string(), None),
    };

    let desc = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    AnchorText { title, date, desc }
}

/// Extract feed items from rendered page HTML.
///
/// Finds the single container matching `container_selector`, walks its `a`
/// descendants in document order and turns each into a `FeedItem` with an
/// absolute URL. A missing container is a hard failure; a container with no
/// anchors yields an empty list. Item text is never validated or rejected:
/// partial parses flow through with the pieces they have.
pub fn extract_items(html: &str, page_url: &str, container_selector: &str) -> Result<Vec<FeedItem>> {
    let document = Html::parse_document(html);
    let container_sel = Selector::parse(container_selector)
        .map_err(|e| anyhow::anyhow!("invalid container selector '{container_selector}': {e}"))?;
    let anchor_sel =
        Selector::parse("a").map_err(|e| anyhow::anyhow!("invalid anchor selector: {e}"))?;
    let base = Url::parse(page_url).context("invalid page URL")?;

    let container = document
        .select(&container_sel)
        .next()
        .ok_or_else(|| anyhow::anyhow!("container '{container_selector}' not found on {page_url}"))?;

    let mut items = Vec::new();
    for anchor in container.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            warn!("anchor without href skipped");
            continue;
        };
        let href = match base.join(href) {
            Ok(abs) => abs.to_string(),
            Err(e) => {
                warn!(href, error = %e, "anchor href did not resolve, skipped");
                continue;
            }
        };

        // Block children surface as separate text nodes; treat each as a line.
        let text = anchor
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let parsed = parse_anchor_text(&text);
        if !parsed.is_complete() {
            warn!(href = %href, "anchor text missing date or description");
        }

        items.push(FeedItem {
            href,
            title: parsed.title,
            date: parsed.date,
            desc: parsed.desc.unwrap_or_default(),
        });
    }

    Ok(items)
}

/// Render the newsletter page and extract its past issues, in page order.
pub async fn fetch_issues(source: &dyn PageSource, cfg: &SourceConfig) -> Result<Vec<FeedItem>> {
    let html = source
        .render(&cfg.url)
        .await
        .context("failed to render newsletter page")?;

    let items = extract_items(&html, &cfg.url, &cfg.selector)?;
    if items.is_empty() {
        warn!(url = %cfg.url, "container held no issues; feed will be empty");
    } else {
        info!(url = %cfg.url, count = items.len(), "extracted newsletter issues");
    }
    Ok(items)
}
