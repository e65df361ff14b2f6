use crate::cache::{self, MemoryCache, SystemClock};
use crate::catalog::Catalog;
use crate::config::{AggregatorConfig, FetchConfig};
use crate::feed_store::PgFeedStore;
use crate::fetcher::Fetcher;
use crate::filter::{RelevanceFilter, ThreadRandom};
use crate::formatter::Formatter;
use crate::normalizer::Normalizer;
use crate::parser::FeedParser;
use crate::rss_utils::url;
use crate::traits::{Clock, FeedCache, FeedStore, FeedTransport, ParseFeed, RandomSource};
use crate::types::{AggregatorError, DisplayEntry, Entry, Result, ScrapedFeed, SearchTag, Source};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Builds the article list of a category from all of its sources.
pub struct FeedAggregator {
    store: Arc<dyn FeedStore>,
    transport: Arc<dyn FeedTransport>,
    parser: Arc<dyn ParseFeed>,
    cache: Arc<dyn FeedCache>,
    rng: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    filter: RelevanceFilter,
    normalizer: Normalizer,
    formatter: Formatter,
    config: AggregatorConfig,
}

impl FeedAggregator {
    pub fn new(
        store: Arc<dyn FeedStore>,
        transport: Arc<dyn FeedTransport>,
        cache: Arc<dyn FeedCache>,
        rng: Arc<dyn RandomSource>,
        config: AggregatorConfig,
    ) -> Self {
        let formatter = Formatter::new(
            transport.clone(),
            cache.clone(),
            config.redirector_prefixes.clone(),
            config.fetch_timeout,
            config.formatted_ttl,
            config.max_concurrent_fetches,
        );

        Self {
            store,
            transport,
            parser: Arc::new(FeedParser::new()),
            cache,
            rng,
            clock: Arc::new(SystemClock),
            filter: RelevanceFilter::new(config.relevance),
            normalizer: Normalizer::new(config.staleness),
            formatter,
            config,
        }
    }

    /// PostgreSQL store, reqwest transport, in-process cache, thread RNG.
    pub async fn connect(
        database_url: &str,
        fetch_config: FetchConfig,
        config: AggregatorConfig,
    ) -> Result<Self> {
        let store = PgFeedStore::new(database_url).await?;
        store.setup_schema().await?;

        Ok(Self::new(
            Arc::new(store),
            Arc::new(Fetcher::new(fetch_config)?),
            Arc::new(MemoryCache::new()),
            Arc::new(ThreadRandom),
            config,
        ))
    }

    pub fn with_parser(mut self, parser: Arc<dyn ParseFeed>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Source/tag management sharing this aggregator's store and cache.
    pub fn catalog(&self) -> Catalog {
        Catalog::new(
            self.store.clone(),
            self.transport.clone(),
            self.parser.clone(),
            self.cache.clone(),
            self.config.fetch_timeout,
        )
    }

    /// Newest `max_articles` entries across the category's sources, ready
    /// for display. Only an unknown category (or a failing store) is an
    /// error; broken sources contribute nothing.
    pub async fn get_articles(&self, category_id: Uuid) -> Result<Vec<DisplayEntry>> {
        let category = self.store.get_category(category_id).await?;
        let sources = self.store.list_sources(category.id).await?;
        let tags = self.store.list_tags(category.id).await?;

        info!(
            "Aggregating category {} ({} sources, {} tags)",
            category.name,
            sources.len(),
            tags.len()
        );

        let now = self.clock.now();
        let per_source: Vec<Vec<Entry>> = stream::iter(sources.iter())
            .map(|source| self.source_entries(category.id, source, &tags, now))
            .buffered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let merged: Vec<Entry> = per_source.into_iter().flatten().collect();
        let ranked = rank_entries(merged, self.config.max_articles);

        info!("Category {}: {} articles", category.name, ranked.len());
        Ok(self.formatter.format_entries(ranked).await)
    }

    async fn source_entries(
        &self,
        category_id: Uuid,
        source: &Source,
        tags: &[SearchTag],
        now: DateTime<Utc>,
    ) -> Vec<Entry> {
        let formatted_key = cache::formatted_key(&source.link);
        let ttl = self.config.formatted_ttl;
        match cache::load_scoped::<Vec<Entry>>(self.cache.as_ref(), &formatted_key, category_id, ttl, now)
            .await
        {
            Ok(Some(entries)) => {
                debug!("Formatted cache hit for {}", source.link);
                return entries;
            }
            Ok(None) => {}
            Err(e) => warn!("Formatted cache unavailable for {}: {}", source.link, e),
        }

        let Some(scraped) = self.scraped_feed(category_id, source, tags, now).await else {
            return Vec::new();
        };

        let entries = self.normalizer.normalize(&scraped, now);
        if let Err(e) =
            cache::store_scoped(self.cache.as_ref(), &formatted_key, category_id, &entries, ttl, now).await
        {
            warn!("Failed to cache formatted entries for {}: {}", source.link, e);
        }
        entries
    }

    /// Raw cache, else a fresh fetch. `None` when the source failed.
    /// Both tiers hold one slot per category since the filter depends on
    /// the category's tags.
    async fn scraped_feed(
        &self,
        category_id: Uuid,
        source: &Source,
        tags: &[SearchTag],
        now: DateTime<Utc>,
    ) -> Option<ScrapedFeed> {
        let raw_key = cache::raw_key(&source.link);
        let ttl = self.config.raw_ttl;
        match cache::load_scoped::<ScrapedFeed>(self.cache.as_ref(), &raw_key, category_id, ttl, now).await {
            Ok(Some(scraped)) => {
                debug!("Raw cache hit for {}", source.link);
                return Some(scraped);
            }
            Ok(None) => {}
            Err(e) => warn!("Raw cache unavailable for {}: {}", source.link, e),
        }

        match self.fetch_and_filter(source, tags).await {
            Ok(scraped) => {
                if let Err(e) =
                    cache::store_scoped(self.cache.as_ref(), &raw_key, category_id, &scraped, ttl, now).await
                {
                    warn!("Failed to cache raw feed for {}: {}", source.link, e);
                }
                Some(scraped)
            }
            Err(e) => {
                warn!("Skipping source {}: {}", source.link, e);
                None
            }
        }
    }

    async fn fetch_and_filter(&self, source: &Source, tags: &[SearchTag]) -> Result<ScrapedFeed> {
        let timeout = self.config.fetch_timeout;
        let document = tokio::time::timeout(timeout, self.transport.fetch_document(&source.link, timeout))
            .await
            .map_err(|_| AggregatorError::Timeout {
                url: source.link.clone(),
                seconds: timeout.as_secs(),
            })??;

        let feed = self.parser.parse(&document)?;
        let total = feed.entries.len();
        let mut admitted = self.filter.admit(feed.entries, tags, self.rng.as_ref());
        if let Some(limit) = self.config.per_source_limit {
            admitted.truncate(limit);
        }

        debug!("{}: kept {}/{} entries", source.link, admitted.len(), total);

        Ok(ScrapedFeed {
            source_link: source.link.clone(),
            feed_link: feed.feed_link,
            feed_href: feed.feed_href,
            entries: admitted,
        })
    }
}

/// Deduplicate by URL path, order newest first, keep at most `limit`.
pub fn rank_entries(entries: Vec<Entry>, limit: usize) -> Vec<Entry> {
    let mut ranked = dedupe_by_path(entries);
    sort_by_recency(&mut ranked);
    ranked.truncate(limit);
    ranked
}

/// First entry per URL path wins.
pub fn dedupe_by_path(entries: Vec<Entry>) -> Vec<Entry> {
    let total = entries.len();
    let mut seen_paths = HashSet::new();
    let unique: Vec<Entry> = entries
        .into_iter()
        .filter(|entry| seen_paths.insert(url::path(&entry.url)))
        .collect();

    let removed = total - unique.len();
    if removed > 0 {
        debug!("Removed {} duplicate entries", removed);
    }
    unique
}

/// Stable: entries with equal timestamps keep their relative order.
pub fn sort_by_recency(entries: &mut [Entry]) {
    entries.sort_by(|a, b| b.published.cmp(&a.published));
}
