use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::categories::normalize_categories;
use super::registry::FeedSource;
use crate::storage::FeedItem;
use crate::util::parse_timestamp;

/// An item as a transport hands it over: every field optional, nothing
/// validated. `categories` keeps whatever JSON shape the publisher used.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFeedItem {
    pub guid: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub pub_date: Option<String>,
    pub content_snippet: Option<String>,
    pub categories: Option<Value>,
    pub creator: Option<String>,
    pub iso_date: Option<String>,
    pub content: Option<String>,
}

/// A raw item that cannot become a canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidItemError {
    /// Neither guid nor link is present, so the item has no dedup key
    #[error("item has neither guid nor link")]
    MissingGuid,
    #[error("item has no title")]
    MissingTitle,
    #[error("item has no link")]
    MissingLink,
}

/// Build the canonical record for `raw` as seen from `source` at `now`.
///
/// Pure apart from the caller-supplied clock value. `now` becomes
/// `fetched_at` and stands in for a missing or unparseable `pub_date`.
pub fn normalize_item(
    raw: &RawFeedItem,
    source: &FeedSource,
    now: DateTime<Utc>,
) -> Result<FeedItem, InvalidItemError> {
    let link = present(&raw.link);
    let guid = present(&raw.guid)
        .or(link)
        .ok_or(InvalidItemError::MissingGuid)?;
    let title = present(&raw.title).ok_or(InvalidItemError::MissingTitle)?;
    let link = link.ok_or(InvalidItemError::MissingLink)?;

    let pub_date = raw
        .pub_date
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let iso_date = raw.iso_date.as_deref().and_then(parse_timestamp);

    Ok(FeedItem {
        source: source.id.clone(),
        guid: guid.to_string(),
        title: title.to_string(),
        link: link.to_string(),
        pub_date,
        content_snippet: raw.content_snippet.clone(),
        categories: normalize_categories(raw.categories.as_ref()),
        creator: raw.creator.clone(),
        iso_date,
        content: raw.content.clone(),
        fetched_at: now,
    })
}

/// Empty strings count as absent.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn source() -> FeedSource {
        FeedSource::new(
            "nasdaq",
            "nasdaq-news",
            "https://www.nasdaq.com/feed/nasdaq-original/rss.xml",
            "NASDAQ News",
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn raw(value: Value) -> RawFeedItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_item_is_copied() {
        let item = normalize_item(
            &raw(json!({
                "guid": "abc-123",
                "link": "https://e.co/1",
                "title": "Stocks rally",
                "pubDate": "Fri, 31 May 2024 20:15:00 GMT",
                "contentSnippet": "Indexes closed higher",
                "categories": ["Markets", "Stocks"],
                "creator": "Jane Desk",
                "isoDate": "2024-05-31T20:15:00.000Z",
                "content": "<p>Indexes closed higher</p>"
            })),
            &source(),
            now(),
        )
        .unwrap();

        let published = Utc.with_ymd_and_hms(2024, 5, 31, 20, 15, 0).unwrap();
        assert_eq!(
            item,
            FeedItem {
                source: "nasdaq-news".into(),
                guid: "abc-123".into(),
                title: "Stocks rally".into(),
                link: "https://e.co/1".into(),
                pub_date: published,
                content_snippet: Some("Indexes closed higher".into()),
                categories: vec!["Markets".into(), "Stocks".into()],
                creator: Some("Jane Desk".into()),
                iso_date: Some(published),
                content: Some("<p>Indexes closed higher</p>".into()),
                fetched_at: now(),
            }
        );
    }

    #[test]
    fn test_guid_falls_back_to_link() {
        let item = normalize_item(
            &raw(json!({"link": "https://e.co/1", "title": "No guid"})),
            &source(),
            now(),
        )
        .unwrap();
        assert_eq!(item.guid, "https://e.co/1");

        let item = normalize_item(
            &raw(json!({"guid": "", "link": "https://e.co/2", "title": "Empty guid"})),
            &source(),
            now(),
        )
        .unwrap();
        assert_eq!(item.guid, "https://e.co/2");
    }

    #[test]
    fn test_missing_guid_and_link() {
        let err = normalize_item(&raw(json!({"title": "Orphan"})), &source(), now()).unwrap_err();
        assert_eq!(err, InvalidItemError::MissingGuid);
    }

    #[test]
    fn test_missing_title() {
        let err = normalize_item(
            &raw(json!({"guid": "g", "link": "https://e.co/1"})),
            &source(),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, InvalidItemError::MissingTitle);

        let err = normalize_item(
            &raw(json!({"guid": "g", "link": "https://e.co/1", "title": ""})),
            &source(),
            now(),
        )
        .unwrap_err();
        assert_eq!(err, InvalidItemError::MissingTitle);
    }

    #[test]
    fn test_missing_link_with_guid() {
        let err = normalize_item(&raw(json!({"guid": "g", "title": "T"})), &source(), now())
            .unwrap_err();
        assert_eq!(err, InvalidItemError::MissingLink);
    }

    #[test]
    fn test_dates_default_and_optional() {
        let item = normalize_item(
            &raw(json!({"link": "https://e.co/1", "title": "Undated"})),
            &source(),
            now(),
        )
        .unwrap();
        assert_eq!(item.pub_date, now());
        assert_eq!(item.iso_date, None);
        assert_eq!(item.fetched_at, now());

        let item = normalize_item(
            &raw(json!({
                "link": "https://e.co/1",
                "title": "Garbled",
                "pubDate": "sometime last week",
                "isoDate": "not a date"
            })),
            &source(),
            now(),
        )
        .unwrap();
        assert_eq!(item.pub_date, now());
        assert_eq!(item.iso_date, None);
    }

    #[test]
    fn test_categories_are_normalized() {
        let item = normalize_item(
            &raw(json!({
                "link": "https://e.co/1",
                "title": "Tagged",
                "categories": [{"_": "AAPL", "domain": "https://seekingalpha.com/symbol"}]
            })),
            &source(),
            now(),
        )
        .unwrap();
        assert_eq!(item.categories, vec!["AAPL"]);

        let item = normalize_item(
            &raw(json!({"link": "https://e.co/1", "title": "Untagged", "categories": null})),
            &source(),
            now(),
        )
        .unwrap();
        assert!(item.categories.is_empty());
    }

    #[test]
    fn test_optional_text_fields_absent() {
        let item = normalize_item(
            &raw(json!({"link": "https://e.co/1", "title": "Bare"})),
            &source(),
            now(),
        )
        .unwrap();
        assert_eq!(item.content_snippet, None);
        assert_eq!(item.creator, None);
        assert_eq!(item.content, None);
        assert_eq!(item.source, "nasdaq-news");
    }
}
