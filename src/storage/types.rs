use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the write lock longer than the busy timeout
    #[error("Database is locked by another process. Please try again.")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored row could not be decoded back into a feed item
    #[error("Stored feed item is corrupt: {0}")]
    Corrupt(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::Locked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6) surface only through their messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
}

// ============================================================================
// Data Structures
// ============================================================================

/// Canonical news item as persisted in `feed_items`.
///
/// `(source, guid)` is the dedup key and is backed by a UNIQUE constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    /// Canonical source id copied from the registry entry
    pub source: String,
    pub guid: String,
    pub title: String,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    pub content_snippet: Option<String>,
    pub categories: Vec<String>,
    pub creator: Option<String>,
    pub iso_date: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Result of [`Database::upsert_item`](super::Database::upsert_item).
///
/// `created` is taken from the statement that wrote the row: `true` when the
/// INSERT succeeded, `false` when the row already existed and was overwritten.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// Row id of the stored item (stable across overwrites)
    pub id: i64,
    /// The item exactly as it now reads from the store
    pub item: FeedItem,
    pub created: bool,
}

// ============================================================================
// Helper Types
// ============================================================================

/// Internal row type for `feed_items` queries (used by sqlx FromRow).
/// Timestamps are stored as Unix milliseconds, categories as a JSON array.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedItemRow {
    pub id: i64,
    pub source: String,
    pub guid: String,
    pub title: String,
    pub link: String,
    pub pub_date: i64,
    pub content_snippet: Option<String>,
    pub categories: String,
    pub creator: Option<String>,
    pub iso_date: Option<i64>,
    pub content: Option<String>,
    pub fetched_at: i64,
}

impl FeedItemRow {
    pub(crate) fn into_item(self) -> Result<(i64, FeedItem), DatabaseError> {
        let categories: Vec<String> = serde_json::from_str(&self.categories).map_err(|e| {
            DatabaseError::Corrupt(format!("categories of item {}: {}", self.id, e))
        })?;
        let iso_date = match self.iso_date {
            Some(ms) => Some(from_millis(ms)?),
            None => None,
        };

        Ok((
            self.id,
            FeedItem {
                source: self.source,
                guid: self.guid,
                title: self.title,
                link: self.link,
                pub_date: from_millis(self.pub_date)?,
                content_snippet: self.content_snippet,
                categories,
                creator: self.creator,
                iso_date,
                content: self.content,
                fetched_at: from_millis(self.fetched_at)?,
            },
        ))
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DatabaseError::Corrupt(format!("timestamp out of range: {}", ms)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(categories: &str) -> FeedItemRow {
        FeedItemRow {
            id: 7,
            source: "nasdaq-news".into(),
            guid: "g-1".into(),
            title: "Title".into(),
            link: "https://example.com/1".into(),
            pub_date: 1_700_000_000_000,
            content_snippet: None,
            categories: categories.into(),
            creator: Some("Desk".into()),
            iso_date: Some(1_700_000_000_500),
            content: None,
            fetched_at: 1_700_000_100_000,
        }
    }

    #[test]
    fn test_row_decodes_into_item() {
        let (id, item) = row(r#"["Markets","Tech"]"#).into_item().unwrap();
        assert_eq!(id, 7);
        assert_eq!(item.categories, vec!["Markets", "Tech"]);
        assert_eq!(item.pub_date.timestamp(), 1_700_000_000);
        assert_eq!(item.iso_date.unwrap().timestamp_millis(), 1_700_000_000_500);
        assert_eq!(item.creator.as_deref(), Some("Desk"));
    }

    #[test]
    fn test_row_with_bad_categories_is_corrupt() {
        let err = row("not json").into_item().unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt(_)));
    }

    #[test]
    fn test_lock_messages_detected() {
        assert!(is_lock_message("error returned from database: database is locked"));
        assert!(is_lock_message("SQLITE_BUSY"));
        assert!(!is_lock_message("no such table: feed_items"));
    }
}
