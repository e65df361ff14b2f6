use std::env;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_feed_size_mb: usize,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Feed-Aggregator/1.0".to_string(),
            timeout_seconds: 8,
            max_feed_size_mb: 10,
            follow_redirects: true,
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            user_agent: env::var("FEED_USER_AGENT").unwrap_or(default.user_agent),
            timeout_seconds: env_parse("FEED_FETCH_TIMEOUT_SECS").unwrap_or(default.timeout_seconds),
            max_feed_size_mb: env_parse("FEED_MAX_SIZE_MB").unwrap_or(default.max_feed_size_mb),
            follow_redirects: env_parse("FEED_FOLLOW_REDIRECTS").unwrap_or(default.follow_redirects),
            max_redirects: env_parse("FEED_MAX_REDIRECTS").unwrap_or(default.max_redirects),
        }
    }
}

/// How the admission threshold moves while the relevance filter walks a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDecay {
    /// Drop by `1/N` per entry, N being the feed's entry count.
    Linear,
    /// Stay at the initial value.
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceConfig {
    pub initial_threshold: f64,
    pub decay: ThresholdDecay,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 0.8,
            decay: ThresholdDecay::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessPolicy {
    /// Keep entries published within the last twelve months.
    RollingYear,
    /// Keep entries whose publish year is at most one less than the current year.
    CalendarYear,
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub max_articles: usize,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout: Duration,
    pub raw_ttl: Duration,
    pub formatted_ttl: Duration,
    pub relevance: RelevanceConfig,
    pub staleness: StalenessPolicy,
    pub per_source_limit: Option<usize>,
    pub redirector_prefixes: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_articles: 50,
            max_concurrent_fetches: 8,
            fetch_timeout: Duration::from_secs(8),
            raw_ttl: Duration::from_secs(5 * 60),
            formatted_ttl: Duration::from_secs(10 * 60),
            relevance: RelevanceConfig::default(),
            staleness: StalenessPolicy::RollingYear,
            per_source_limit: None,
            redirector_prefixes: vec!["feedproxy".to_string(), "rss".to_string()],
        }
    }
}

impl AggregatorConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        let staleness = match env::var("FEED_STALENESS_POLICY").as_deref() {
            Ok("calendar") => StalenessPolicy::CalendarYear,
            Ok("rolling") | Err(_) => default.staleness,
            Ok(other) => {
                warn!("Unknown FEED_STALENESS_POLICY {:?}, using rolling", other);
                default.staleness
            }
        };

        let decay = match env::var("FEED_THRESHOLD_DECAY").as_deref() {
            Ok("constant") => ThresholdDecay::Constant,
            _ => default.relevance.decay,
        };

        Self {
            max_articles: env_parse("FEED_MAX_ARTICLES").unwrap_or(default.max_articles),
            max_concurrent_fetches: env_parse("FEED_MAX_CONCURRENT_FETCHES")
                .unwrap_or(default.max_concurrent_fetches)
                .max(1),
            fetch_timeout: env_parse("FEED_FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.fetch_timeout),
            raw_ttl: env_parse("FEED_RAW_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.raw_ttl),
            formatted_ttl: env_parse("FEED_FORMATTED_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.formatted_ttl),
            relevance: RelevanceConfig {
                initial_threshold: env_parse::<f64>("FEED_INITIAL_THRESHOLD")
                    .filter(|threshold| {
                        let finite = threshold.is_finite();
                        if !finite {
                            warn!("Ignoring non-finite FEED_INITIAL_THRESHOLD {}", threshold);
                        }
                        finite
                    })
                    .unwrap_or(default.relevance.initial_threshold),
                decay,
            },
            staleness,
            per_source_limit: env_parse("FEED_PER_SOURCE_LIMIT").or(default.per_source_limit),
            redirector_prefixes: env::var("FEED_REDIRECTOR_PREFIXES")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or(default.redirector_prefixes),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable value {:?} for {}", raw, key);
            None
        }
    }
}
