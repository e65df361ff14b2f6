use crate::config::FetchConfig;
use crate::traits::FeedTransport;
use crate::types::{AggregatorError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// reqwest-backed transport. Single attempt per request; callers absorb failures.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AggregatorError::Timeout {
                        url: url.to_string(),
                        seconds: timeout.as_secs(),
                    }
                } else {
                    AggregatorError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    fn size_limit(&self) -> u64 {
        self.config.max_feed_size_mb as u64 * 1024 * 1024
    }

    fn check_size(&self, size_bytes: u64) -> Result<()> {
        let limit_bytes = self.size_limit();
        if size_bytes > limit_bytes {
            return Err(AggregatorError::FeedTooLarge {
                size_bytes,
                limit_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedTransport for Fetcher {
    async fn fetch_document(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let mut response = self.get(url, timeout).await?;

        if let Some(content_length) = response.content_length() {
            self.check_size(content_length)?;
        }

        // Content-Length may be absent or wrong; stop reading once over the limit.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            self.check_size(body.len() as u64)?;
        }

        info!(
            "Fetched feed: {} ({} bytes in {}ms)",
            url,
            body.len(),
            start_time.elapsed().as_millis()
        );
        Ok(body)
    }

    async fn resolve_final_url(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self.get(url, timeout).await?;
        let final_url = response.url().to_string();
        debug!("Resolved {} -> {}", url, final_url);
        Ok(final_url)
    }
}
