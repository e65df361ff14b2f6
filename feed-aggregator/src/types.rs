use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub link: String,
}

impl Source {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            link: link.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTag {
    pub id: Uuid,
    pub name: String,
}

impl SearchTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A feed entry exactly as the parser found it. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFeed {
    /// The site link advertised by the feed itself.
    pub feed_link: Option<String>,
    /// The feed's self reference (`rel="self"`).
    pub feed_href: Option<String>,
    pub entries: Vec<RawEntry>,
}

/// Output of fetch + relevance filtering for one source. This is the value
/// stored in the `raw:` cache namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedFeed {
    pub source_link: String,
    pub feed_link: Option<String>,
    pub feed_href: Option<String>,
    pub entries: Vec<RawEntry>,
}

impl ScrapedFeed {
    pub fn empty(source_link: &str) -> Self {
        Self {
            source_link: source_link.to_string(),
            feed_link: None,
            feed_href: None,
            entries: Vec::new(),
        }
    }
}

/// Canonical article record. Stored in the `formatted:` cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub published: DateTime<Utc>,
    pub website: String,
}

/// An entry ready to be shown: `published` is rendered as `YYYY-MM-DD HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEntry {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub published: String,
    pub published_at: DateTime<Utc>,
    pub website: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Fetch of {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Category not found: {id}")]
    CategoryNotFound { id: Uuid },

    #[error("Source not found: {id}")]
    SourceNotFound { id: Uuid },

    #[error("Feed {link} is already registered for category {category}")]
    DuplicateSource { link: String, category: String },

    #[error("{link} is not an RSS/Atom feed")]
    NotAFeed { link: String },

    #[error("Feed size exceeds limit: {size_bytes} > {limit_bytes} bytes")]
    FeedTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
