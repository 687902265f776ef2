/// Source key of the MarketWatch top stories feed.
pub const MARKETWATCH: &str = "marketwatch";
/// Source key of the NASDAQ original news feed.
pub const NASDAQ: &str = "nasdaq";

/// (key, id, url, name) for every feed the service knows about.
const BUILTIN_SOURCES: [(&str, &str, &str, &str); 4] = [
    (
        MARKETWATCH,
        "marketwatch-top",
        "https://www.marketwatch.com/rss/topstories",
        "MarketWatch Top Stories",
    ),
    (
        NASDAQ,
        "nasdaq-news",
        "https://www.nasdaq.com/feed/nasdaq-original/rss.xml",
        "NASDAQ News",
    ),
    (
        "reuters",
        "reuters-business",
        "https://www.reutersagency.com/feed/?taxonomy=best-sectors&post_type=best",
        "Reuters Business News",
    ),
    (
        "seekingalpha",
        "seekingalpha-news",
        "https://seekingalpha.com/market_currents.xml",
        "Seeking Alpha",
    ),
];

/// A publisher feed the service polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    /// Short lookup key used by callers and the CLI
    pub key: String,
    /// Canonical id stamped on every stored item
    pub id: String,
    pub url: String,
    /// Display name for logs and output
    pub name: String,
}

impl FeedSource {
    pub fn new(
        key: impl Into<String>,
        id: impl Into<String>,
        url: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
            url: url.into(),
            name: name.into(),
        }
    }
}

/// Fixed key → source mapping, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    sources: Vec<FeedSource>,
}

impl FeedRegistry {
    /// The publisher feeds compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            sources: BUILTIN_SOURCES
                .iter()
                .map(|(key, id, url, name)| FeedSource::new(*key, *id, *url, *name))
                .collect(),
        }
    }

    /// A registry over an explicit source list. Later duplicates of a key are
    /// ignored so lookups stay unambiguous.
    pub fn from_sources(sources: Vec<FeedSource>) -> Self {
        let mut unique: Vec<FeedSource> = Vec::with_capacity(sources.len());
        for source in sources {
            if unique.iter().any(|s| s.key == source.key) {
                tracing::warn!(key = %source.key, "Duplicate feed source key, keeping the first");
                continue;
            }
            unique.push(source);
        }
        Self { sources: unique }
    }

    /// Exact, case-sensitive lookup by source key.
    pub fn lookup(&self, key: &str) -> Option<&FeedSource> {
        self.sources.iter().find(|s| s.key == key)
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.key.as_str())
    }
}

impl Default for FeedRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
