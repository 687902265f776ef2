//! Feed ingestion: from a registered source key to stored, deduplicated items.
//!
//! - `registry` - the fixed set of publisher feeds
//! - `fetcher` - the transport seam and its HTTP implementation
//! - `parser` - RSS/Atom/JSON Feed documents into raw items (`feed-rs`)
//! - `categories` - coercion of the publisher `categories` field
//! - `normalize` - raw item into canonical [`FeedItem`](crate::storage::FeedItem)
//! - `ingest` - the per-source pipeline tying it all together
//!
//! # Example
//!
//! ```ignore
//! use marketwire::feed::{FeedRegistry, HttpTransport, Ingestor};
//! use marketwire::storage::SharedDatabase;
//!
//! let store = Arc::new(SharedDatabase::new("marketwire.db"));
//! let transport = Arc::new(HttpTransport::new(reqwest::Client::new()));
//! let ingestor = Ingestor::new(FeedRegistry::builtin(), transport, store);
//!
//! let new_items = ingestor.fetch_by_source("nasdaq").await?;
//! ```

mod categories;
mod fetcher;
mod ingest;
mod normalize;
mod parser;
mod registry;

pub use categories::normalize_categories;
pub use fetcher::{FeedTransport, FetchError, HttpTransport};
pub use ingest::{BatchReport, IngestError, Ingestor, ItemError, ItemOutcome, SourceResult};
pub use normalize::{normalize_item, InvalidItemError, RawFeedItem};
pub use parser::parse_feed;
pub use registry::{FeedRegistry, FeedSource, MARKETWATCH, NASDAQ};
