use crate::traits::ParseFeed;
use crate::types::{AggregatorError, RawEntry, RawFeed, Result};
use feed_rs::model::Link;
use feed_rs::parser;
use tracing::debug;

/// feed-rs backed parser producing `RawFeed`s. Missing entry fields stay `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_feed(&self, content: &[u8]) -> Result<RawFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let feed_link = feed
            .links
            .iter()
            .find(|l| !is_self_link(l))
            .map(|l| l.href.clone())
            .filter(|href| !href.trim().is_empty());
        let feed_href = feed
            .links
            .iter()
            .find(|l| is_self_link(l))
            .map(|l| l.href.clone())
            .filter(|href| !href.trim().is_empty());

        let entries: Vec<RawEntry> = feed.entries.into_iter().map(Self::parse_entry).collect();

        debug!("Parsed feed with {} entries", entries.len());

        Ok(RawFeed {
            feed_link,
            feed_href,
            entries,
        })
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> RawEntry {
        let link = entry
            .links
            .iter()
            .find(|l| !is_self_link(l))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone());

        // Atom entries sometimes carry only <content>.
        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        RawEntry {
            link,
            title: entry.title.map(|t| t.content),
            summary,
            published: entry.published,
            updated: entry.updated,
        }
    }
}

impl ParseFeed for FeedParser {
    fn parse(&self, document: &[u8]) -> Result<RawFeed> {
        self.parse_feed(document)
    }
}

fn is_self_link(link: &Link) -> bool {
    link.rel.as_deref() == Some("self")
}
