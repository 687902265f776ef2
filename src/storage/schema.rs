use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::types::{is_lock_message, DatabaseError};

/// Path that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Locked` if another process holds the database
    /// lock past the busy timeout, `DatabaseError::Migration` if the schema
    /// could not be created, and `DatabaseError::Other` for anything else.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: concurrent upserts from parallel fetch runs wait
        // for the writer lock instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");

        // Every connection to :memory: gets its own empty database, so the
        // in-memory store must stay on exactly one long-lived connection.
        let pool_options = if path == IN_MEMORY {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                DatabaseError::Locked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // UNIQUE(source, guid) is the dedup key; upsert_item relies on the
        // constraint violation to detect a concurrent insert of the same item.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_items (
                id INTEGER PRIMARY KEY,
                source TEXT NOT NULL,
                guid TEXT NOT NULL,
                title TEXT NOT NULL,
                link TEXT NOT NULL,
                pub_date INTEGER NOT NULL,
                content_snippet TEXT,
                categories TEXT NOT NULL DEFAULT '[]',
                creator TEXT,
                iso_date INTEGER,
                content TEXT,
                fetched_at INTEGER NOT NULL,
                UNIQUE(source, guid)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feed_items_source_published ON feed_items(source, pub_date DESC)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feed_items_fetched ON feed_items(fetched_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Close every pooled connection. The handle is unusable afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ============================================================================
// Shared Connection
// ============================================================================

/// Process-wide store handle that opens the database on first use.
///
/// `ensure_connected` is safe to call from many tasks at once: the first
/// caller runs `Database::open`, everyone else waits for that attempt and then
/// reuses the same pool. A failed attempt leaves the cell empty so the next
/// caller retries. `close` is the teardown hook and is terminal.
pub struct SharedDatabase {
    path: String,
    cell: OnceCell<Database>,
}

impl SharedDatabase {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    /// Return the shared database, opening and migrating it if needed.
    pub async fn ensure_connected(&self) -> Result<&Database, DatabaseError> {
        self.cell
            .get_or_try_init(|| async {
                tracing::info!(path = %self.path, "Opening feed item store");
                Database::open(&self.path).await
            })
            .await
    }

    /// The database, if a previous `ensure_connected` succeeded.
    pub fn get(&self) -> Option<&Database> {
        self.cell.get()
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close the pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(db) = self.cell.get() {
            tracing::debug!(path = %self.path, "Closing feed item store");
            db.close().await;
        }
    }
}
