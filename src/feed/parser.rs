use feed_rs::model::{Category, Entry};
use feed_rs::parser;
use serde_json::{json, Value};

use super::normalize::RawFeedItem;

/// Parse an RSS, Atom or JSON Feed document into raw items, in document order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawFeedItem>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    Ok(feed.entries.into_iter().map(raw_item).collect())
}

fn raw_item(entry: Entry) -> RawFeedItem {
    let guid = if entry.id.trim().is_empty() {
        None
    } else {
        Some(entry.id)
    };
    let published = entry.published.or(entry.updated);

    RawFeedItem {
        guid,
        link: entry.links.into_iter().next().map(|l| l.href),
        title: entry.title.map(|t| t.content),
        pub_date: published.map(|dt| dt.to_rfc2822()),
        content_snippet: entry.summary.map(|s| s.content),
        categories: categories_value(entry.categories),
        creator: entry.authors.into_iter().next().map(|p| p.name),
        iso_date: published.map(|dt| dt.to_rfc3339()),
        content: entry.content.and_then(|c| c.body),
    }
}

/// Categories carrying a scheme become `{"_": text, "domain": scheme}` tag
/// objects, the rest stay plain strings.
fn categories_value(categories: Vec<Category>) -> Option<Value> {
    if categories.is_empty() {
        return None;
    }

    let values = categories
        .into_iter()
        .map(|category| {
            let text = category.label.unwrap_or(category.term);
            match category.scheme {
                Some(scheme) => json!({ "_": text, "domain": scheme }),
                None => Value::String(text),
            }
        })
        .collect();
    Some(Value::Array(values))
}
