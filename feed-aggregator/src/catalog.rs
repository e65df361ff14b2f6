use crate::cache;
use crate::rss_utils::url;
use crate::traits::{FeedCache, FeedStore, FeedTransport, ParseFeed};
use crate::types::{AggregatorError, Category, Result, SearchTag, Source};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Mutations of categories, sources and tags, keeping the cache consistent.
pub struct Catalog {
    store: Arc<dyn FeedStore>,
    transport: Arc<dyn FeedTransport>,
    parser: Arc<dyn ParseFeed>,
    cache: Arc<dyn FeedCache>,
    fetch_timeout: Duration,
}

impl Catalog {
    pub fn new(
        store: Arc<dyn FeedStore>,
        transport: Arc<dyn FeedTransport>,
        parser: Arc<dyn ParseFeed>,
        cache: Arc<dyn FeedCache>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            parser,
            cache,
            fetch_timeout,
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories().await
    }

    pub async fn create_category(&self, name: &str) -> Result<Category> {
        let category = self.store.create_category(name.trim()).await?;
        self.clear_cache().await;
        info!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    pub async fn add_tag(&self, category_id: Uuid, name: &str) -> Result<SearchTag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AggregatorError::General("Tag name must not be empty".to_string()));
        }

        self.store.get_category(category_id).await?;
        let tag = self.store.add_tag(category_id, name).await?;
        self.clear_cache().await;
        info!("Added tag {} to category {}", tag.name, category_id);
        Ok(tag)
    }

    /// Register a feed for a category. The link must serve a feed with at
    /// least one entry and must not already be registered for the category.
    pub async fn add_source(&self, category_id: Uuid, name: &str, link: &str) -> Result<Source> {
        let link = link.trim();
        validate_feed_url(link)?;
        let category = self.store.get_category(category_id).await?;

        let document = tokio::time::timeout(
            self.fetch_timeout,
            self.transport.fetch_document(link, self.fetch_timeout),
        )
        .await
        .map_err(|_| AggregatorError::Timeout {
            url: link.to_string(),
            seconds: self.fetch_timeout.as_secs(),
        })??;

        let feed = self.parser.parse(&document).map_err(|e| {
            warn!("Rejecting {}: {}", link, e);
            AggregatorError::NotAFeed {
                link: link.to_string(),
            }
        })?;
        if feed.entries.is_empty() {
            return Err(AggregatorError::NotAFeed {
                link: link.to_string(),
            });
        }

        if self.store.source_exists(category_id, link).await? {
            return Err(AggregatorError::DuplicateSource {
                link: link.to_string(),
                category: category.name,
            });
        }

        let name = if name.trim().is_empty() { link } else { name.trim() };
        let source = Source::new(name, link);
        self.store.add_source(category_id, source.clone()).await?;
        self.clear_cache().await;

        info!("Added source {} to category {}", source.link, category.name);
        Ok(source)
    }

    /// Delete a source and both of its cache entries.
    pub async fn delete_source(&self, source_id: Uuid) -> Result<Source> {
        let source = self.store.delete_source(source_id).await?;

        for key in [cache::raw_key(&source.link), cache::formatted_key(&source.link)] {
            if let Err(e) = self.cache.delete(&key).await {
                warn!("Failed to purge cache key {}: {}", key, e);
            }
        }

        info!("Deleted source {} ({})", source.link, source.id);
        Ok(source)
    }

    /// Accept discovered feed links for a category: lowercase them, keep the
    /// ones mentioning one of the category's tags, skip links the category
    /// already has, and store the rest with the link as the name.
    pub async fn build_category_sources(
        &self,
        category_id: Uuid,
        candidate_links: &[String],
    ) -> Result<Vec<Source>> {
        self.store.get_category(category_id).await?;
        let tags: Vec<String> = self
            .store
            .list_tags(category_id)
            .await?
            .into_iter()
            .map(|t| t.name.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut added = Vec::new();
        for link in candidate_links.iter().map(|l| l.trim().to_lowercase()) {
            if !tags.iter().any(|tag| link.contains(tag.as_str())) {
                continue;
            }
            if added.iter().any(|s: &Source| s.link == link)
                || self.store.source_exists(category_id, &link).await?
            {
                continue;
            }

            let source = Source::new(link.clone(), link);
            self.store.add_source(category_id, source.clone()).await?;
            added.push(source);
        }

        if !added.is_empty() {
            self.clear_cache().await;
            info!("Added {} discovered sources to category {}", added.len(), category_id);
        }
        Ok(added)
    }

    async fn clear_cache(&self) {
        if let Err(e) = self.cache.clear().await {
            warn!("Failed to clear feed cache: {}", e);
        }
    }
}

pub fn validate_feed_url(link: &str) -> Result<()> {
    ::url::Url::parse(link)?;
    if !url::is_valid_rss_url(link) {
        return Err(AggregatorError::General(format!(
            "Only http(s) feed URLs are supported: {}",
            link
        )));
    }
    Ok(())
}
