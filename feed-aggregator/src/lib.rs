pub mod types;
pub mod config;
pub mod traits;
pub mod rss_utils;
pub mod parser;
pub mod fetcher;
pub mod filter;
pub mod normalizer;
pub mod formatter;
pub mod cache;
pub mod feed_store;
pub mod catalog;
pub mod aggregator;

pub use types::*;
pub use config::{AggregatorConfig, FetchConfig, RelevanceConfig, StalenessPolicy, ThresholdDecay};
pub use traits::{Clock, FeedCache, FeedStore, FeedTransport, ParseFeed, RandomSource};
pub use parser::FeedParser;
pub use fetcher::Fetcher;
pub use filter::{FixedRandom, RelevanceFilter, ThreadRandom};
pub use normalizer::Normalizer;
pub use formatter::Formatter;
pub use cache::{ManualClock, MemoryCache, SystemClock};
pub use feed_store::{MemoryFeedStore, PgFeedStore};
pub use catalog::Catalog;
pub use aggregator::FeedAggregator;
