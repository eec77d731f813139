use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use common::ChannelConfig;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::warn;

/// One scraped newsletter issue.
///
/// A pure value: no identity beyond `href`, never mutated after creation.
/// `date` is `None` when the anchor text had no `", "` separator; such items
/// still render, just without a `pubDate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Absolute URL; doubles as the item's guid in the rendered feed
    pub href: String,
    pub title: String,
    pub date: Option<String>,
    pub desc: String,
}

/// Parse an issue date as scraped from the page ("Jan 1, 2024" or
/// "January 1, 2024"), falling back to RFC 3339 / RFC 2822 inputs.
/// Returns midnight UTC of the named day.
pub fn parse_issue_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%b %d, %Y") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|ndt| Utc.from_utc_datetime(&ndt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

/// RFC 1123 representation, the date format RSS readers expect.
fn format_rfc1123(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Serialize the scraped issues into an RSS 2.0 document.
///
/// Pure function of its inputs: identical items and `build_time` produce
/// byte-identical output. Items are emitted in input order; each one carries
/// `title`, `link`, `guid` (the href, permalink semantics) and `description`,
/// plus a `pubDate` when the scraped date names a real calendar day. Dates
/// that do not parse are reported and the element is omitted rather than
/// emitting an invalid instant.
pub fn build_xml(
    items: &[FeedItem],
    channel: &ChannelConfig,
    build_time: DateTime<Utc>,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss_start))?;

    writer.write_event(Event::Start(BytesStart::new("channel")))?;
    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "lastBuildDate", &format_rfc1123(&build_time))?;

    for item in items {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &item.title)?;
        write_text_element(&mut writer, "link", &item.href)?;
        write_text_element(&mut writer, "guid", &item.href)?;
        match item.date.as_deref().map(|raw| (raw, parse_issue_date(raw))) {
            Some((_, Some(dt))) => {
                write_text_element(&mut writer, "pubDate", &format_rfc1123(&dt))?;
            }
            Some((raw, None)) => {
                warn!(href = %item.href, date = raw, "unparseable issue date, omitting pubDate");
            }
            None => {}
        }
        write_text_element(&mut writer, "description", &item.desc)?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let out = writer.into_inner();
    String::from_utf8(out).context("rendered feed is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(href: &str, title: &str, date: Option<&str>, desc: &str) -> FeedItem {
        FeedItem {
            href: href.to_string(),
            title: title.to_string(),
            date: date.map(String::from),
            desc: desc.to_string(),
        }
    }

    #[test]
    fn parses_abbreviated_and_full_month_dates() {
        let dt = parse_issue_date("Jan 1, 2024").expect("abbreviated month");
        assert_eq!(format_rfc1123(&dt), "Mon, 01 Jan 2024 00:00:00 GMT");

        let dt = parse_issue_date("December 18, 2023").expect("full month");
        assert_eq!(format_rfc1123(&dt), "Mon, 18 Dec 2023 00:00:00 GMT");

        assert!(parse_issue_date("not a date").is_none());
        assert!(parse_issue_date("").is_none());
    }

    #[test]
    fn renders_item_with_rfc1123_pub_date() {
        let items = vec![item("https://x/1", "A", Some("Jan 1, 2024"), "d1")];
        let xml = build_xml(&items, &ChannelConfig::default(), Utc::now()).expect("render");

        assert!(xml.contains("<pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>"));
        assert!(xml.contains("<guid>https://x/1</guid>"));
        assert!(xml.contains("<link>https://x/1</link>"));
        assert!(xml.contains("<description>d1</description>"));
    }

    #[test]
    fn unparseable_date_omits_pub_date() {
        let items = vec![item("https://x/1", "A", Some("someday soon"), "d")];
        let xml = build_xml(&items, &ChannelConfig::default(), Utc::now()).expect("render");
        assert!(!xml.contains("<pubDate>"));
        // The item itself still renders
        assert!(xml.contains("<guid>https://x/1</guid>"));
    }

    #[test]
    fn empty_input_renders_valid_zero_item_channel() {
        let channel = ChannelConfig::default();
        let xml = build_xml(&[], &channel, Utc::now()).expect("render");

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\">"));
        assert!(xml.contains("<title>Vue.js Developers Newsletter</title>"));
        assert!(xml.contains("<link>https://vuejsdevelopers.com/newsletter/</link>"));
        assert!(xml.contains("<description>The best Vue articles in your inbox, weekly</description>"));
        assert!(!xml.contains("<item>"));
    }

    #[test]
    fn rendering_preserves_input_order() {
        let items = vec![
            item("https://x/2", "Second issue", Some("Jan 8, 2024"), "later"),
            item("https://x/1", "First issue", Some("Jan 1, 2024"), "earlier"),
        ];
        let xml = build_xml(&items, &ChannelConfig::default(), Utc::now()).expect("render");

        let pos_second = xml.find("Second issue").expect("second present");
        let pos_first = xml.find("First issue").expect("first present");
        assert!(
            pos_second < pos_first,
            "items must keep document order, not date order"
        );
    }

    #[test]
    fn identical_input_renders_byte_identical_output() {
        let items = vec![
            item("https://x/1", "A", Some("Jan 1, 2024"), "d1"),
            item("https://x/2", "B", None, ""),
        ];
        let now = Utc::now();
        let a = build_xml(&items, &ChannelConfig::default(), now).expect("render a");
        let b = build_xml(&items, &ChannelConfig::default(), now).expect("render b");
        assert_eq!(a, b);
    }

    #[test]
    fn text_content_is_xml_escaped() {
        let items = vec![item(
            "https://x/1?a=1&b=2",
            "Tips & tricks <for> Vue",
            Some("Jan 1, 2024"),
            "covers v3 & beyond",
        )];
        let xml = build_xml(&items, &ChannelConfig::default(), Utc::now()).expect("render");

        assert!(xml.contains("Tips &amp; tricks &lt;for&gt; Vue"));
        assert!(xml.contains("<guid>https://x/1?a=1&amp;b=2</guid>"));
        assert!(xml.contains("covers v3 &amp; beyond"));
    }
}
