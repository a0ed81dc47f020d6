// Services module - external sources and the resolvers built on them

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;
use crate::models::{MetadataResponse, RawEpisodeLabel};

// External sources
pub mod maximumfun;
pub mod omdb;
pub mod streaming;

// Resolvers
pub mod availability;
pub mod metadata;

pub use streaming::AvailabilityResponse;

/// Paginated podcast episode listing
#[async_trait]
pub trait EpisodeSource {
    /// Labels on one listing page; an empty list means there are no more pages
    async fn fetch_page(&self, page: u32) -> Result<Vec<RawEpisodeLabel>, SourceError>;
}

/// Movie metadata lookup by title and optional year
#[async_trait]
pub trait MetadataSource {
    async fn query(&self, title: &str, year: Option<&str>)
        -> Result<MetadataResponse, SourceError>;
}

/// Streaming offers for a metadata identifier
#[async_trait]
pub trait AvailabilitySource {
    async fn query(
        &self,
        external_id: &str,
        country: &str,
    ) -> Result<AvailabilityResponse, SourceError>;
}

/// Bounded retry with linear backoff: retry `n` waits `n * base_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Single attempt, no retries
    #[cfg(test)]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }

    /// Run `op` until it succeeds or the retry budget is spent
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries => {
                    retry += 1;
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}",
                        what,
                        retry,
                        self.max_retries + 1,
                        e
                    );
                    tokio::time::sleep(self.backoff(retry)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
