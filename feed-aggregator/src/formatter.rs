use crate::cache;
use crate::rss_utils::{time, url};
use crate::traits::{FeedCache, FeedTransport};
use crate::types::{DisplayEntry, Entry};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Final display pass: dereferences feed-proxy hostnames and renders dates.
pub struct Formatter {
    transport: Arc<dyn FeedTransport>,
    cache: Arc<dyn FeedCache>,
    redirector_prefixes: Vec<String>,
    timeout: Duration,
    resolved_ttl: Duration,
    concurrency: usize,
}

impl Formatter {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        cache: Arc<dyn FeedCache>,
        redirector_prefixes: Vec<String>,
        timeout: Duration,
        resolved_ttl: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            transport,
            cache,
            redirector_prefixes,
            timeout,
            resolved_ttl,
            concurrency: concurrency.max(1),
        }
    }

    /// Output order equals input order.
    pub async fn format_entries(&self, entries: Vec<Entry>) -> Vec<DisplayEntry> {
        stream::iter(entries)
            .map(|entry| async move { to_display(self.reresolve_website(entry).await) })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Replace a redirector hostname with the host the entry URL lands on.
    /// Any failure keeps the original website. The outcome is cached under
    /// `resolved:{url}` so repeated calls make no further requests.
    pub async fn reresolve_website(&self, entry: Entry) -> Entry {
        if !is_redirector(&entry.website, &self.redirector_prefixes) {
            return entry;
        }

        let key = cache::resolved_key(&entry.url);
        match cache::load::<String>(self.cache.as_ref(), &key).await {
            Ok(Some(website)) => return Entry { website, ..entry },
            Ok(None) => {}
            Err(e) => warn!("Resolved-host cache unavailable for {}: {}", entry.url, e),
        }

        let website = self.resolve_website(&entry).await;
        if let Err(e) = cache::store(self.cache.as_ref(), &key, &website, self.resolved_ttl).await {
            warn!("Failed to cache resolved host for {}: {}", entry.url, e);
        }
        Entry { website, ..entry }
    }

    async fn resolve_website(&self, entry: &Entry) -> String {
        let resolved = tokio::time::timeout(
            self.timeout,
            self.transport.resolve_final_url(&entry.url, self.timeout),
        )
        .await;

        match resolved {
            Ok(Ok(final_url)) => match url::netloc(&final_url) {
                Some(website) => {
                    debug!("Resolved {} to {}", entry.website, website);
                    website
                }
                None => entry.website.clone(),
            },
            Ok(Err(e)) => {
                warn!("Could not resolve redirector link {}: {}", entry.url, e);
                entry.website.clone()
            }
            Err(_) => {
                warn!("Timed out resolving redirector link {}", entry.url);
                entry.website.clone()
            }
        }
    }
}

pub fn is_redirector(website: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| website.starts_with(prefix.as_str()))
}

pub fn to_display(entry: Entry) -> DisplayEntry {
    DisplayEntry {
        published: time::format_display(&entry.published),
        published_at: entry.published,
        url: entry.url,
        title: entry.title,
        summary: entry.summary,
        website: entry.website,
    }
}
