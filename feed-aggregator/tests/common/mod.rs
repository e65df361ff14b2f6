#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_aggregator::{
    AggregatorConfig, AggregatorError, Category, FeedAggregator, FeedStore, FeedTransport,
    FixedRandom, MemoryCache, MemoryFeedStore, RelevanceConfig, Result, Source, ThresholdDecay,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Clone)]
pub enum Reply {
    Document(Vec<u8>),
    Fail(String),
    Hang,
}

/// In-memory transport answering from a script and counting requests.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    redirects: Mutex<HashMap<String, String>>,
    fetches: AtomicUsize,
    resolves: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, document: String) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Document(document.into_bytes()));
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Fail(message.to_string()));
    }

    pub fn hang(&self, url: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Hang);
    }

    pub fn redirect(&self, from: &str, to: &str) {
        self.redirects
            .lock()
            .unwrap()
            .insert(from.to_string(), to.to_string());
    }

    pub fn clear_redirects(&self) {
        self.redirects.lock().unwrap().clear();
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn fetch_document(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().get(url).cloned();

        match reply {
            Some(Reply::Document(body)) => Ok(body),
            Some(Reply::Fail(message)) => Err(AggregatorError::General(message)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AggregatorError::General("unreachable".to_string()))
            }
            None => Err(AggregatorError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn resolve_final_url(&self, url: &str, _timeout: Duration) -> Result<String> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        self.redirects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AggregatorError::General(format!("no redirect for {}", url)))
    }
}

pub struct Item {
    pub link: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(link: &str, title: &str, description: &str, published: DateTime<Utc>) -> Self {
        Self {
            link: Some(link.to_string()),
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            published: Some(published),
        }
    }
}

/// RSS 2.0 document with the given channel link and items.
pub fn rss_document(channel_link: &str, items: &[Item]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n<channel>\n",
    );
    xml.push_str("<title>Test feed</title>\n");
    xml.push_str(&format!("<link>{}</link>\n", channel_link));
    xml.push_str("<description>Test feed</description>\n");

    for item in items {
        xml.push_str("<item>\n");
        if let Some(title) = &item.title {
            xml.push_str(&format!("<title>{}</title>\n", title));
        }
        if let Some(link) = &item.link {
            xml.push_str(&format!("<link>{}</link>\n", link.replace('&', "&amp;")));
        }
        if let Some(description) = &item.description {
            xml.push_str(&format!("<description><![CDATA[{}]]></description>\n", description));
        }
        if let Some(published) = &item.published {
            xml.push_str(&format!("<pubDate>{}</pubDate>\n", published.to_rfc2822()));
        }
        xml.push_str("</item>\n");
    }

    xml.push_str("</channel>\n</rss>\n");
    xml
}

/// Admits every entry regardless of tags.
pub fn admit_all_config() -> AggregatorConfig {
    AggregatorConfig {
        relevance: RelevanceConfig {
            initial_threshold: 0.0,
            decay: ThresholdDecay::Linear,
        },
        fetch_timeout: Duration::from_millis(200),
        ..AggregatorConfig::default()
    }
}

pub struct Harness {
    pub store: Arc<MemoryFeedStore>,
    pub transport: Arc<ScriptedTransport>,
    pub cache: Arc<MemoryCache>,
    pub aggregator: FeedAggregator,
}

impl Harness {
    pub fn new(config: AggregatorConfig) -> Self {
        Self::with_cache(config, Arc::new(MemoryCache::new()))
    }

    pub fn with_cache(config: AggregatorConfig, cache: Arc<MemoryCache>) -> Self {
        init_tracing();
        let store = Arc::new(MemoryFeedStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let aggregator = FeedAggregator::new(
            store.clone(),
            transport.clone(),
            cache.clone(),
            Arc::new(FixedRandom(0.0)),
            config,
        );

        Self {
            store,
            transport,
            cache,
            aggregator,
        }
    }

    pub async fn category(&self, name: &str, tags: &[&str]) -> Category {
        let category = self.store.create_category(name).await.unwrap();
        for tag in tags {
            self.store.add_tag(category.id, tag).await.unwrap();
        }
        category
    }

    pub async fn source(&self, category: &Category, link: &str) -> Source {
        let source = Source::new(link, link);
        self.store.add_source(category.id, source.clone()).await.unwrap();
        source
    }
}
