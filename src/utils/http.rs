// src/utils/http.rs

//! HTTP client utilities.
//!
//! Every request goes through [`PageFetcher`], one at a time. The pause
//! between two requests is a [`Politeness`] delay.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Source of page bodies. Any error means "page unreachable".
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// [`PageFetcher`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::crawl(url, format!("HTTP status {status}")));
        }
        Ok(response.text().await?)
    }
}

/// Uniform random pause between two requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Politeness {
    min: Duration,
    max: Duration,
}

impl Politeness {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Draw one delay from the range.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let millis = rand::thread_rng().gen_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(millis as u64)
    }

    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            log::debug!("Sleeping {} ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
    }
}

impl From<(Duration, Duration)> for Politeness {
    fn from((min, max): (Duration, Duration)) -> Self {
        Self::new(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stays_in_range() {
        let delay = Politeness::new(Duration::from_millis(20), Duration::from_millis(40));
        for _ in 0..100 {
            let d = delay.sample();
            assert!(d >= Duration::from_millis(20) && d <= Duration::from_millis(40));
        }
    }

    #[test]
    fn test_inverted_bounds_are_swapped() {
        let delay = Politeness::new(Duration::from_millis(40), Duration::from_millis(20));
        assert_eq!(delay, Politeness::new(Duration::from_millis(20), Duration::from_millis(40)));
    }

    #[test]
    fn test_none_never_sleeps() {
        assert_eq!(Politeness::none().sample(), Duration::ZERO);
    }

    #[test]
    fn test_client_builds_from_default_config() {
        assert!(HttpFetcher::new(&CrawlerConfig::default()).is_ok());
    }
}
