use crate::config::StalenessPolicy;
use crate::rss_utils::{text, url};
use crate::types::{Entry, RawEntry, ScrapedFeed};
use chrono::{DateTime, Datelike, Months, Utc};
use tracing::debug;

pub const MISSING_LINK: &str = "";
pub const MISSING_TITLE: &str = "Untitled";
pub const MISSING_SUMMARY: &str = "";
pub const UNKNOWN_WEBSITE: &str = "unknown";

/// Turns admitted raw entries into `Entry` records, dropping stale ones.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    staleness: StalenessPolicy,
}

impl Normalizer {
    pub fn new(staleness: StalenessPolicy) -> Self {
        Self { staleness }
    }

    pub fn normalize(&self, feed: &ScrapedFeed, now: DateTime<Utc>) -> Vec<Entry> {
        let entries: Vec<Entry> = feed
            .entries
            .iter()
            .filter_map(|raw| self.normalize_entry(raw, feed, now))
            .collect();

        let dropped = feed.entries.len() - entries.len();
        if dropped > 0 {
            debug!("Dropped {} stale entries from {}", dropped, feed.source_link);
        }
        entries
    }

    /// `None` when the entry is older than the staleness policy allows.
    pub fn normalize_entry(
        &self,
        raw: &RawEntry,
        feed: &ScrapedFeed,
        now: DateTime<Utc>,
    ) -> Option<Entry> {
        let published = resolve_published(raw, now);
        if !is_fresh(self.staleness, published, now) {
            return None;
        }

        let link = raw.link.clone().unwrap_or_else(|| MISSING_LINK.to_string());
        let website = resolve_website(
            feed.feed_link.as_deref(),
            Some(link.as_str()),
            feed.feed_href.as_deref().or(Some(feed.source_link.as_str())),
        );

        Some(Entry {
            title: raw.title.clone().unwrap_or_else(|| MISSING_TITLE.to_string()),
            summary: raw
                .summary
                .as_deref()
                .map(text::strip_html)
                .unwrap_or_else(|| MISSING_SUMMARY.to_string()),
            url: link,
            published,
            website,
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(StalenessPolicy::RollingYear)
    }
}

/// Published, else updated, else `now`.
pub fn resolve_published(raw: &RawEntry, now: DateTime<Utc>) -> DateTime<Utc> {
    raw.published.or(raw.updated).unwrap_or(now)
}

/// First hostname found in feed link, entry link, feed href; otherwise `"unknown"`.
pub fn resolve_website(
    feed_link: Option<&str>,
    entry_link: Option<&str>,
    feed_href: Option<&str>,
) -> String {
    [feed_link, entry_link, feed_href]
        .into_iter()
        .flatten()
        .find_map(url::netloc)
        .unwrap_or_else(|| UNKNOWN_WEBSITE.to_string())
}

pub fn is_fresh(policy: StalenessPolicy, published: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match policy {
        StalenessPolicy::RollingYear => match now.checked_sub_months(Months::new(12)) {
            Some(cutoff) => published >= cutoff,
            None => true,
        },
        StalenessPolicy::CalendarYear => now.year() - published.year() <= 1,
    }
}
