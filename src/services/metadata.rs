// Metadata resolver
// Walks a fixed ladder of progressively looser lookups against a metadata
// source and caches the final outcome per (title, year).

use std::collections::HashMap;
use std::time::Duration;

use super::{MetadataSource, RetryPolicy};
use crate::error::PipelineError;
use crate::models::MetadataRecord;

/// Lookup strategies, tried in order until one finds the movie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Title and year as given
    Exact,
    /// Same title, no year filter
    WithoutYear,
    /// Whitespace runs collapsed, year kept
    Collapsed,
    /// Whitespace runs collapsed, no year filter
    CollapsedWithoutYear,
}

pub const LOOKUP_LADDER: [LookupStrategy; 4] = [
    LookupStrategy::Exact,
    LookupStrategy::WithoutYear,
    LookupStrategy::Collapsed,
    LookupStrategy::CollapsedWithoutYear,
];

impl LookupStrategy {
    /// The (title, year) query this strategy sends
    pub fn query(&self, title: &str, year: Option<&str>) -> (String, Option<String>) {
        match self {
            LookupStrategy::Exact => (title.to_string(), year.map(str::to_string)),
            LookupStrategy::WithoutYear => (title.to_string(), None),
            LookupStrategy::Collapsed => (collapse_whitespace(title), year.map(str::to_string)),
            LookupStrategy::CollapsedWithoutYear => (collapse_whitespace(title), None),
        }
    }
}

pub fn collapse_whitespace(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

type CacheKey = (String, Option<String>);

/// Resolves titles to metadata records through a `MetadataSource`
pub struct MetadataResolver<S> {
    source: S,
    retry: RetryPolicy,
    rate_limit: Duration,
    cache: HashMap<CacheKey, Option<MetadataRecord>>,
    live_queries: usize,
}

impl<S: MetadataSource> MetadataResolver<S> {
    pub fn new(source: S, retry: RetryPolicy, rate_limit: Duration) -> Self {
        Self {
            source,
            retry,
            rate_limit,
            cache: HashMap::new(),
            live_queries: 0,
        }
    }

    /// Number of live source queries issued so far, retries included
    pub fn live_queries(&self) -> usize {
        self.live_queries
    }

    /// Resolve one movie. `None` means every strategy came back empty; that
    /// outcome is cached too.
    pub async fn resolve(&mut self, title: &str, year: Option<&str>) -> Option<MetadataRecord> {
        let key = (title.to_string(), year.map(str::to_string));
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Metadata cache hit: {} ({:?})", title, year);
            return cached.clone();
        }

        let mut attempted: Vec<CacheKey> = Vec::with_capacity(LOOKUP_LADDER.len());
        let mut result = None;

        for strategy in LOOKUP_LADDER {
            let query = strategy.query(title, year);
            if attempted.contains(&query) {
                continue;
            }

            let found = self.query_live(&query.0, query.1.as_deref()).await;
            attempted.push(query);

            if let Some(record) = found {
                if strategy != LookupStrategy::Exact {
                    tracing::info!(
                        "Found {} via {:?} lookup: {} ({})",
                        title,
                        strategy,
                        record.title,
                        record.year
                    );
                }
                result = Some(record);
                break;
            }
        }

        if result.is_none() {
            tracing::warn!("Movie not found: {} ({:?})", title, year);
        }

        self.cache.insert(key, result.clone());
        result
    }

    async fn query_live(&mut self, title: &str, year: Option<&str>) -> Option<MetadataRecord> {
        let source = &self.source;
        let mut calls = 0;
        let what = format!("Metadata lookup for {}", title);

        let outcome = self
            .retry
            .run(&what, || {
                calls += 1;
                source.query(title, year)
            })
            .await;

        self.live_queries += calls;
        tokio::time::sleep(self.rate_limit).await;

        match outcome {
            Ok(response) => {
                if !response.found {
                    tracing::debug!(
                        "No match for {} ({:?}): {}",
                        title,
                        year,
                        response.error.as_deref().unwrap_or("not found")
                    );
                }
                response.into_record()
            }
            Err(e) => {
                tracing::warn!("Metadata lookup failed for {} ({:?}): {}", title, year, e);
                None
            }
        }
    }

    /// Resolve a batch. Output is aligned with the input: entry `i` belongs
    /// to `titles[i]`, and a miss is `None` rather than a shorter list.
    pub async fn resolve_batch(
        &mut self,
        titles: &[String],
        years: &[Option<String>],
    ) -> Result<Vec<Option<MetadataRecord>>, PipelineError> {
        if titles.len() != years.len() {
            return Err(PipelineError::BatchLengthMismatch {
                titles: titles.len(),
                years: years.len(),
            });
        }

        let total = titles.len();
        let mut results = Vec::with_capacity(total);

        for (i, (title, year)) in titles.iter().zip(years).enumerate() {
            tracing::info!("Processing {}/{}: {}", i + 1, total, title);
            results.push(self.resolve(title, year.as_deref()).await);
        }

        let found = results.iter().filter(|r| r.is_some()).count();
        tracing::info!("Successfully found {}/{} movies", found, total);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::models::MetadataResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers only for the listed (title, year) pairs; records every query
    struct FakeMetadata {
        known: Vec<(String, Option<String>, String)>,
        fail_first: Mutex<usize>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeMetadata {
        fn new(known: &[(&str, Option<&str>, &str)]) -> Self {
            Self {
                known: known
                    .iter()
                    .map(|(t, y, id)| (t.to_string(), y.map(String::from), id.to_string()))
                    .collect(),
                fail_first: Mutex::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetadataSource for FakeMetadata {
        async fn query(
            &self,
            title: &str,
            year: Option<&str>,
        ) -> Result<MetadataResponse, SourceError> {
            self.calls
                .lock()
                .unwrap()
                .push((title.to_string(), year.map(String::from)));

            {
                let mut failures = self.fail_first.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(SourceError::Malformed("flaky".to_string()));
                }
            }

            let hit = self
                .known
                .iter()
                .find(|(t, y, _)| t == title && y.as_deref() == year);

            Ok(match hit {
                Some((t, y, id)) => MetadataResponse {
                    found: true,
                    external_id: Some(id.clone()),
                    title: Some(t.clone()),
                    year: Some(y.clone().unwrap_or_else(|| "1999".to_string())),
                    ..Default::default()
                },
                None => MetadataResponse {
                    found: false,
                    error: Some("Movie not found!".to_string()),
                    ..Default::default()
                },
            })
        }
    }

    fn resolver(source: FakeMetadata) -> MetadataResolver<FakeMetadata> {
        MetadataResolver::new(source, RetryPolicy::none(), Duration::ZERO)
    }

    #[test]
    fn test_ladder_queries() {
        assert_eq!(
            LookupStrategy::Collapsed.query("Das   Boot ", Some("1981")),
            ("Das Boot".to_string(), Some("1981".to_string()))
        );
        assert_eq!(
            LookupStrategy::WithoutYear.query("Alien", Some("1979")),
            ("Alien".to_string(), None)
        );
    }

    #[tokio::test]
    async fn test_exact_hit_uses_one_query() {
        let mut resolver = resolver(FakeMetadata::new(&[("Alien", Some("1979"), "tt0078748")]));
        let record = resolver.resolve("Alien", Some("1979")).await.unwrap();
        assert_eq!(record.external_id, "tt0078748");
        assert_eq!(resolver.live_queries(), 1);
    }

    #[tokio::test]
    async fn test_collapsed_hit_stops_before_last_strategy() {
        let source = FakeMetadata::new(&[("Das Boot", Some("1981"), "tt0082096")]);
        let mut resolver = resolver(source);

        let record = resolver.resolve("Das  Boot", Some("1981")).await.unwrap();
        assert_eq!(record.external_id, "tt0082096");
        assert_eq!(
            resolver.source.calls(),
            vec![
                ("Das  Boot".to_string(), Some("1981".to_string())),
                ("Das  Boot".to_string(), None),
                ("Das Boot".to_string(), Some("1981".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_identical_attempts_are_skipped() {
        // Clean title without a year: every strategy is the same query
        let mut resolver = resolver(FakeMetadata::new(&[]));
        assert!(resolver.resolve("Nothing", None).await.is_none());
        assert_eq!(resolver.live_queries(), 1);

        // Clean title with a year: exact and year-less only
        assert!(resolver.resolve("Nothing", Some("2001")).await.is_none());
        assert_eq!(resolver.live_queries(), 3);
    }

    #[tokio::test]
    async fn test_cache_hits_skip_the_source() {
        let mut resolver = resolver(FakeMetadata::new(&[("Alien", Some("1979"), "tt0078748")]));
        let first = resolver.resolve("Alien", Some("1979")).await;
        let second = resolver.resolve("Alien", Some("1979")).await;
        assert_eq!(first, second);
        assert_eq!(resolver.live_queries(), 1);

        // Negative results are cached as well
        resolver.resolve("Nope", Some("1990")).await;
        let before = resolver.live_queries();
        assert!(resolver.resolve("Nope", Some("1990")).await.is_none());
        assert_eq!(resolver.live_queries(), before);
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried() {
        let source = FakeMetadata::new(&[("Alien", Some("1979"), "tt0078748")]);
        *source.fail_first.lock().unwrap() = 1;
        let mut resolver =
            MetadataResolver::new(source, RetryPolicy::new(2, Duration::ZERO), Duration::ZERO);

        assert!(resolver.resolve("Alien", Some("1979")).await.is_some());
        assert_eq!(resolver.live_queries(), 2);
    }

    #[tokio::test]
    async fn test_failure_moves_down_the_ladder() {
        let source = FakeMetadata::new(&[("Alien", None, "tt0078748")]);
        *source.fail_first.lock().unwrap() = 1;
        let mut resolver = resolver(source);

        // The exact query errors out; the year-less one still finds it
        assert!(resolver.resolve("Alien", Some("1979")).await.is_some());
        assert_eq!(resolver.live_queries(), 2);
    }

    #[tokio::test]
    async fn test_batch_is_aligned_with_input() {
        let mut resolver = resolver(FakeMetadata::new(&[
            ("Alien", Some("1979"), "tt0078748"),
            ("Heat", Some("1995"), "tt0113277"),
        ]));
        let titles = vec![
            "Alien".to_string(),
            "Unknown".to_string(),
            "Heat".to_string(),
        ];
        let years = vec![
            Some("1979".to_string()),
            Some("2000".to_string()),
            Some("1995".to_string()),
        ];

        let results = resolver.resolve_batch(&titles, &years).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().unwrap().external_id, "tt0113277");
    }

    #[tokio::test]
    async fn test_batch_length_mismatch() {
        let mut resolver = resolver(FakeMetadata::new(&[]));
        let err = resolver
            .resolve_batch(&["Alien".to_string()], &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BatchLengthMismatch { titles: 1, years: 0 }
        ));
        assert_eq!(resolver.live_queries(), 0);
    }
}
