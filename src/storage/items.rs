use super::schema::Database;
use super::types::{DatabaseError, FeedItem, FeedItemRow, UpsertOutcome};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of items to return from any single query (OOM protection)
const MAX_ITEMS: i64 = 2000;

/// Default page size for `items_for_source`
const DEFAULT_ITEMS: i64 = 500;

impl Database {
    // ========================================================================
    // Item Mutations
    // ========================================================================

    /// Insert the item, or overwrite every field of the existing row with the
    /// same `(source, guid)`.
    ///
    /// Runs in one transaction: a plain INSERT first, and if the UNIQUE
    /// constraint rejects it (the row exists, possibly written a moment ago by
    /// a concurrent fetch) an UPDATE of that row. `created` reports which of
    /// the two statements produced the stored row. A duplicate-key rejection
    /// is never returned as an error.
    pub async fn upsert_item(&self, item: &FeedItem) -> Result<UpsertOutcome, DatabaseError> {
        let categories = serde_json::to_string(&item.categories)
            .map_err(|e| DatabaseError::Corrupt(format!("categories: {}", e)))?;
        let pub_date = item.pub_date.timestamp_millis();
        let iso_date = item.iso_date.map(|d| d.timestamp_millis());
        let fetched_at = item.fetched_at.timestamp_millis();

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let inserted = sqlx::query_as::<_, FeedItemRow>(
            r#"
            INSERT INTO feed_items
                (source, guid, title, link, pub_date, content_snippet, categories,
                 creator, iso_date, content, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, source, guid, title, link, pub_date, content_snippet,
                      categories, creator, iso_date, content, fetched_at
        "#,
        )
        .bind(&item.source)
        .bind(&item.guid)
        .bind(&item.title)
        .bind(&item.link)
        .bind(pub_date)
        .bind(&item.content_snippet)
        .bind(&categories)
        .bind(&item.creator)
        .bind(iso_date)
        .bind(&item.content)
        .bind(fetched_at)
        .fetch_one(&mut *tx)
        .await;

        let (row, created) = match inserted {
            Ok(row) => (row, true),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!(
                    source = %item.source,
                    guid = %item.guid,
                    "Item already stored, overwriting in place"
                );
                let row = sqlx::query_as::<_, FeedItemRow>(
                    r#"
                    UPDATE feed_items SET
                        title = ?, link = ?, pub_date = ?, content_snippet = ?,
                        categories = ?, creator = ?, iso_date = ?, content = ?,
                        fetched_at = ?
                    WHERE source = ? AND guid = ?
                    RETURNING id, source, guid, title, link, pub_date, content_snippet,
                              categories, creator, iso_date, content, fetched_at
                "#,
                )
                .bind(&item.title)
                .bind(&item.link)
                .bind(pub_date)
                .bind(&item.content_snippet)
                .bind(&categories)
                .bind(&item.creator)
                .bind(iso_date)
                .bind(&item.content)
                .bind(fetched_at)
                .bind(&item.source)
                .bind(&item.guid)
                .fetch_one(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
                (row, false)
            }
            Err(e) => return Err(DatabaseError::from_sqlx(e)),
        };

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        let (id, item) = row.into_item()?;
        Ok(UpsertOutcome { id, item, created })
    }

    // ========================================================================
    // Item Queries
    // ========================================================================

    /// Look up one item by its dedup key.
    pub async fn get_item(&self, source: &str, guid: &str) -> Result<Option<FeedItem>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedItemRow>(
            r#"
            SELECT id, source, guid, title, link, pub_date, content_snippet,
                   categories, creator, iso_date, content, fetched_at
            FROM feed_items
            WHERE source = ? AND guid = ?
        "#,
        )
        .bind(source)
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_item().map(|(_, item)| item)).transpose()
    }

    /// Items for one source, newest publication first.
    ///
    /// `limit` defaults to 500 and is capped at MAX_ITEMS (2000).
    pub async fn items_for_source(
        &self,
        source: &str,
        limit: Option<i64>,
    ) -> Result<Vec<FeedItem>, DatabaseError> {
        let limit = limit.unwrap_or(DEFAULT_ITEMS).clamp(0, MAX_ITEMS);
        tracing::debug!(source = %source, limit = limit, "items_for_source with limit cap");

        let rows = sqlx::query_as::<_, FeedItemRow>(
            r#"
            SELECT id, source, guid, title, link, pub_date, content_snippet,
                   categories, creator, iso_date, content, fetched_at
            FROM feed_items
            WHERE source = ?
            ORDER BY pub_date DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(source)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| r.into_item().map(|(_, item)| item))
            .collect()
    }

    /// Number of stored items, optionally restricted to one source.
    pub async fn count_items(&self, source: Option<&str>) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = match source {
            Some(source) => {
                sqlx::query_as("SELECT COUNT(*) FROM feed_items WHERE source = ?")
                    .bind(source)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM feed_items")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }
}
