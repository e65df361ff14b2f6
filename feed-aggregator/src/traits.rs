use crate::types::{Category, RawFeed, Result, SearchTag, Source};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Persistence of categories, their sources and their search tags.
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Fails with `CategoryNotFound` for an unknown id.
    async fn get_category(&self, id: Uuid) -> Result<Category>;

    async fn create_category(&self, name: &str) -> Result<Category>;

    /// Sources in the category's stored order.
    async fn list_sources(&self, category_id: Uuid) -> Result<Vec<Source>>;

    async fn list_tags(&self, category_id: Uuid) -> Result<Vec<SearchTag>>;

    async fn add_source(&self, category_id: Uuid, source: Source) -> Result<()>;

    async fn add_tag(&self, category_id: Uuid, name: &str) -> Result<SearchTag>;

    /// Removes the source everywhere and returns what was removed.
    async fn delete_source(&self, id: Uuid) -> Result<Source>;

    async fn source_exists(&self, category_id: Uuid, link: &str) -> Result<bool>;
}

/// HTTP access used for feed documents and for dereferencing redirectors.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch_document(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;

    /// GET `url`, follow redirects and return the final URL.
    async fn resolve_final_url(&self, url: &str, timeout: Duration) -> Result<String>;
}

pub trait ParseFeed: Send + Sync {
    fn parse(&self, document: &[u8]) -> Result<RawFeed>;
}

/// String-valued cache with per-key TTL. Every operation is atomic per key.
#[async_trait]
pub trait FeedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Source of uniformly distributed rolls in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
