//! SQLite persistence for canonical feed items.
//!
//! - [`Database`] owns the pool, the schema, and the dedup upsert
//! - [`SharedDatabase`] is the lazily opened, process-wide handle the
//!   ingestion pipeline goes through

mod items;
mod schema;
mod types;

pub use schema::{Database, SharedDatabase, IN_MEMORY};
pub use types::{DatabaseError, FeedItem, UpsertOutcome};
