use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;

use super::fetcher::{FeedTransport, FetchError};
use super::normalize::{normalize_item, InvalidItemError, RawFeedItem};
use super::registry::{FeedRegistry, FeedSource, MARKETWATCH, NASDAQ};
use crate::storage::{Database, DatabaseError, FeedItem, SharedDatabase};

/// Sources fetched at once by [`Ingestor::fetch_all`] unless overridden.
const DEFAULT_CONCURRENCY: usize = 4;

/// Failures that abandon a whole fetch call.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The key is not in the registry; nothing was fetched or stored
    #[error("Unknown feed source: {0}")]
    UnknownSource(String),
    /// The feed could not be retrieved or parsed; nothing was stored
    #[error("Feed fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// The store could not be opened
    #[error("Feed item store unavailable: {0}")]
    Database(#[from] DatabaseError),
}

/// Why a single item was skipped. Never aborts the batch.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("invalid item: {0}")]
    Invalid(#[from] InvalidItemError),
    #[error("could not store item: {0}")]
    Store(#[from] DatabaseError),
}

/// What happened to one raw item of a batch.
#[derive(Debug)]
pub enum ItemOutcome {
    /// First sighting of this `(source, guid)`
    Created(FeedItem),
    /// Already stored; every field was overwritten
    Updated(FeedItem),
    /// Skipped. `index` is the item's position in the fetched document.
    Failed { index: usize, error: ItemError },
}

/// Per-item outcomes of one fetch, in processing order.
#[derive(Debug)]
pub struct BatchReport {
    pub source_id: String,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn created_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Created(_)))
            .count()
    }

    pub fn updated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Updated(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Failed { .. }))
            .count()
    }

    /// The newly created items, in processing order.
    pub fn into_created(self) -> Vec<FeedItem> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o {
                ItemOutcome::Created(item) => Some(item),
                _ => None,
            })
            .collect()
    }
}

/// Result of one source within [`Ingestor::fetch_all`].
pub struct SourceResult {
    pub key: String,
    pub result: Result<BatchReport, IngestError>,
}

/// Drives registry lookup, transport fetch, normalization and the dedup
/// upsert for one source per call.
///
/// Items of one call are processed strictly one after another. Separate calls
/// may run concurrently; the store's UNIQUE(source, guid) constraint and the
/// transactional upsert keep them consistent without extra locking.
pub struct Ingestor {
    registry: FeedRegistry,
    transport: Arc<dyn FeedTransport>,
    store: Arc<SharedDatabase>,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(
        registry: FeedRegistry,
        transport: Arc<dyn FeedTransport>,
        store: Arc<SharedDatabase>,
    ) -> Self {
        Self {
            registry,
            transport,
            store,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Number of sources `fetch_all` polls at once (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    /// Fetch `source_key` and return only the items stored for the first time.
    ///
    /// # Errors
    ///
    /// - [`IngestError::UnknownSource`] if the key is not registered
    /// - [`IngestError::Fetch`] if the feed cannot be retrieved or parsed
    /// - [`IngestError::Database`] if the store cannot be opened
    ///
    /// Individual bad items are logged and skipped, never returned as errors.
    pub async fn fetch_by_source(&self, source_key: &str) -> Result<Vec<FeedItem>, IngestError> {
        Ok(self.fetch_report(source_key).await?.into_created())
    }

    /// MarketWatch top stories; same as `fetch_by_source("marketwatch")`.
    pub async fn fetch_marketwatch(&self) -> Result<Vec<FeedItem>, IngestError> {
        self.fetch_by_source(MARKETWATCH).await
    }

    /// NASDAQ news; same as `fetch_by_source("nasdaq")`.
    pub async fn fetch_nasdaq(&self) -> Result<Vec<FeedItem>, IngestError> {
        self.fetch_by_source(NASDAQ).await
    }

    /// Like [`fetch_by_source`](Self::fetch_by_source) but keeps every
    /// per-item outcome.
    pub async fn fetch_report(&self, source_key: &str) -> Result<BatchReport, IngestError> {
        let source = self
            .registry
            .lookup(source_key)
            .ok_or_else(|| IngestError::UnknownSource(source_key.to_string()))?;

        tracing::info!(source = %source.id, name = %source.name, "Fetching feed");

        let raw_items = self.transport.fetch_feed(&source.url).await.map_err(|e| {
            tracing::error!(source = %source.id, error = %e, "Feed fetch failed, batch abandoned");
            e
        })?;

        // Connect only after the document was retrieved and parsed.
        let db = self.store.ensure_connected().await?;

        let now = Utc::now();
        let mut outcomes = Vec::with_capacity(raw_items.len());
        for (index, raw) in raw_items.iter().enumerate() {
            outcomes.push(ingest_item(db, raw, source, now, index).await);
        }

        let report = BatchReport {
            source_id: source.id.clone(),
            outcomes,
        };
        tracing::info!(
            source = %source.id,
            created = report.created_count(),
            updated = report.updated_count(),
            failed = report.failed_count(),
            "Feed fetch complete"
        );
        Ok(report)
    }

    /// Fetch every registered source, up to `concurrency` at a time.
    ///
    /// One source failing has no effect on the others. Results are returned
    /// in completion order, not registry order.
    pub async fn fetch_all(&self) -> Vec<SourceResult> {
        stream::iter(self.registry.keys())
            .map(|key| async move {
                SourceResult {
                    key: key.to_string(),
                    result: self.fetch_report(key).await,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

/// Normalize then upsert one item, folding any failure into the outcome.
async fn ingest_item(
    db: &Database,
    raw: &RawFeedItem,
    source: &FeedSource,
    now: DateTime<Utc>,
    index: usize,
) -> ItemOutcome {
    match store_item(db, raw, source, now).await {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::warn!(
                source = %source.id,
                index = index,
                guid = raw.guid.as_deref().or(raw.link.as_deref()).unwrap_or("-"),
                error = %error,
                "Skipping feed item"
            );
            ItemOutcome::Failed { index, error }
        }
    }
}

async fn store_item(
    db: &Database,
    raw: &RawFeedItem,
    source: &FeedSource,
    now: DateTime<Utc>,
) -> Result<ItemOutcome, ItemError> {
    let item = normalize_item(raw, source, now)?;
    let outcome = db.upsert_item(&item).await?;

    if outcome.created {
        tracing::info!(source = %source.id, title = %outcome.item.title, "New feed item added");
        Ok(ItemOutcome::Created(outcome.item))
    } else {
        Ok(ItemOutcome::Updated(outcome.item))
    }
}
