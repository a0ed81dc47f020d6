// Refresh and merge orchestration
// scrape -> clean -> metadata -> availability -> assemble -> persist

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::AppConfig;
use crate::dataset::{self, DatasetStore, PreviousRun, RunStatistics};
use crate::episodes::episodes_from_labels;
use crate::error::PipelineError;
use crate::models::{AvailabilityRecord, EpisodeKey, MetadataRecord, RawEpisodeLabel};
use crate::ratings::{self, MergeReport};
use crate::services::availability::AvailabilityResolver;
use crate::services::maximumfun::MaximumFunScraper;
use crate::services::metadata::MetadataResolver;
use crate::services::omdb::OmdbClient;
use crate::services::streaming::StreamingClient;
use crate::services::{AvailabilitySource, EpisodeSource, MetadataSource, RetryPolicy};

/// Which stages reuse the previous dataset instead of the network
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_scraping: bool,
    pub skip_apis: bool,
    pub skip_streaming: bool,
}

impl RunOptions {
    fn reuses_previous(&self) -> bool {
        self.skip_scraping || self.skip_apis || self.skip_streaming
    }

    fn streaming_skipped(&self) -> bool {
        self.skip_apis || self.skip_streaming
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub raw_labels: usize,
    pub episodes: usize,
    pub stats: RunStatistics,
    pub ratings_carried: usize,
    /// Live queries per source; zero for skipped stages
    pub metadata_queries: usize,
    pub availability_queries: usize,
    pub movies_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!("Pipeline completed");
        tracing::info!("  Raw episodes: {}", self.raw_labels);
        tracing::info!("  Valid movie episodes: {}", self.episodes);
        tracing::info!(
            "  Metadata found: {}/{} ({})",
            self.stats.successful_metadata,
            self.stats.total,
            self.stats.metadata_rate()
        );
        tracing::info!(
            "  Streaming options found: {}/{} ({})",
            self.stats.successful_availability,
            self.stats.total,
            self.stats.availability_rate()
        );
        tracing::info!(
            "  Live queries: {} metadata, {} streaming",
            self.metadata_queries,
            self.availability_queries
        );
        if self.ratings_carried > 0 {
            tracing::info!("  Ratings carried over: {}", self.ratings_carried);
        }
        tracing::info!("  Movies: {}", self.movies_path.display());
        tracing::info!("  Metadata: {}", self.metadata_path.display());
    }
}

/// Full refresh of the published dataset
pub async fn refresh(config: &AppConfig, options: RunOptions) -> Result<RunSummary, PipelineError> {
    // Configuration problems fail before any network traffic
    let omdb = (!options.skip_apis)
        .then(|| OmdbClient::from_config(&config.omdb))
        .transpose()?;
    let streaming = (!options.streaming_skipped())
        .then(|| StreamingClient::from_config(&config.streaming))
        .transpose()?;

    let store = DatasetStore::new(&config.paths);
    let previous = match store.load().await {
        Ok(file) => PreviousRun::new(file.map(|f| f.movies).unwrap_or_default()),
        // Only fatal when a skipped stage needs the old data
        Err(e) if !options.reuses_previous() => {
            tracing::warn!("Ignoring unreadable previous dataset: {}", e);
            PreviousRun::default()
        }
        Err(e) => return Err(e),
    };
    if !previous.is_empty() {
        tracing::info!("Loaded {} movies from the previous run", previous.len());
    }

    // Scrape
    let labels = if options.skip_scraping {
        tracing::info!("Skipping scraping, reusing episodes from the previous run");
        previous.labels()
    } else {
        let scraper = MaximumFunScraper::new(&config.scraper);
        let retry = RetryPolicy::new(config.scraper.max_retries, config.scraper.retry_delay());
        scrape_episodes(&scraper, config.scraper.max_pages, config.scraper.page_delay(), retry).await?
    };

    // Clean
    let episodes = episodes_from_labels(&labels, &config.cleaning)?;

    // Metadata
    let mut metadata_queries = 0;
    let metadata = match omdb {
        Some(client) => {
            let retry = RetryPolicy::new(config.omdb.max_retries, config.omdb.retry_delay());
            let mut resolver = MetadataResolver::new(client, retry, config.omdb.rate_limit());
            let metadata = lookup_metadata(&mut resolver, &episodes).await?;
            metadata_queries = resolver.live_queries();
            metadata
        }
        None => {
            tracing::info!("Skipping metadata lookups, reusing the previous run");
            previous.metadata_for(&episodes)
        }
    };

    // Availability
    let mut availability_queries = 0;
    let availability = match streaming {
        Some(client) => {
            let mut resolver = AvailabilityResolver::new(
                client,
                config.streaming.rate_limit(),
                config.streaming.rate_limit_retry(),
            );
            let availability =
                lookup_availability(&mut resolver, &metadata, &config.streaming.country).await;
            availability_queries = resolver.live_queries();
            availability
        }
        None => {
            tracing::info!("Skipping streaming lookups, reusing the previous run");
            previous.availability_for(&metadata)
        }
    };

    // Assemble
    let mut movies = dataset::assemble(&episodes, &metadata, &availability);
    let ratings_carried = previous.carry_over_ratings(&episodes, &mut movies);
    let stats = RunStatistics::from_results(movies.len(), &metadata, &availability);

    // Persist
    store.save(movies, &stats).await?;

    Ok(RunSummary {
        raw_labels: labels.len(),
        episodes: episodes.len(),
        stats,
        ratings_carried,
        metadata_queries,
        availability_queries,
        movies_path: store.movies_path().to_path_buf(),
        metadata_path: store.metadata_path().to_path_buf(),
    })
}

/// Walk listing pages until an empty one. A page that still fails after its
/// retries stops the run.
pub async fn scrape_episodes<E: EpisodeSource>(
    source: &E,
    max_pages: u32,
    page_delay: Duration,
    retry: RetryPolicy,
) -> Result<Vec<RawEpisodeLabel>, PipelineError> {
    let mut labels = Vec::new();

    for page in 1..=max_pages {
        tracing::info!("Scraping page {}", page);

        let what = format!("Page {}", page);
        let found = retry
            .run(&what, || source.fetch_page(page))
            .await
            .map_err(|source| PipelineError::Scrape { page, source })?;

        if found.is_empty() {
            tracing::info!("No more episodes found on page {}", page);
            break;
        }

        tracing::info!("Found {} episodes on page {}", found.len(), page);
        labels.extend(found);

        if page < max_pages {
            tokio::time::sleep(page_delay).await;
        }
    }

    tracing::info!("Scraped {} raw episodes", labels.len());
    if labels.is_empty() {
        return Err(PipelineError::NoEpisodes);
    }
    Ok(labels)
}

/// Metadata for every episode, aligned with `episodes`. Queries use the
/// normalized title.
pub async fn lookup_metadata<S: MetadataSource>(
    resolver: &mut MetadataResolver<S>,
    episodes: &[EpisodeKey],
) -> Result<Vec<Option<MetadataRecord>>, PipelineError> {
    tracing::info!("Looking up metadata for {} movies", episodes.len());

    let titles: Vec<String> = episodes.iter().map(|e| e.normalized_title.clone()).collect();
    let years: Vec<Option<String>> = episodes.iter().map(|e| Some(e.year.clone())).collect();
    resolver.resolve_batch(&titles, &years).await
}

/// Availability for each distinct id found by the metadata stage, in first-seen order
pub async fn lookup_availability<S: AvailabilitySource>(
    resolver: &mut AvailabilityResolver<S>,
    metadata: &[Option<MetadataRecord>],
    country: &str,
) -> Vec<Option<AvailabilityRecord>> {
    let ids = dataset::distinct_ids(metadata);
    tracing::info!("Looking up streaming options for {} movies", ids.len());
    resolver.resolve_batch(&ids, country).await
}

/// Merge a ratings CSV into a dataset file, `output` or the configured
/// movies.json. The same file is loaded, backed up and rewritten. With
/// `dry_run` nothing is written.
pub async fn merge_ratings_file(
    config: &AppConfig,
    csv_path: &Path,
    output: Option<&Path>,
    dry_run: bool,
) -> Result<MergeReport, PipelineError> {
    let store = DatasetStore::new(&config.paths);
    let path = output.unwrap_or(store.movies_path());
    let ratings = ratings::load_ratings(csv_path)?;
    let mut movies = dataset::load_movies(path).await?.movies;
    tracing::info!("Loaded {} movies from {}", movies.len(), path.display());

    let report = ratings::merge_ratings(&mut movies, &ratings);

    if dry_run {
        tracing::info!("Dry run: no files written");
        return Ok(report);
    }

    dataset::backup_movies(path).await?;
    dataset::save_movies(path, movies).await?;
    tracing::info!("Saved merged dataset to {}", path.display());

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppPaths, CleaningRules};
    use crate::error::SourceError;
    use crate::models::MetadataResponse;
    use crate::services::AvailabilityResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct FakePages {
        pages: Vec<Vec<&'static str>>,
        failures: Mutex<usize>,
        calls: Mutex<Vec<u32>>,
    }

    impl FakePages {
        fn new(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                failures: Mutex::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EpisodeSource for FakePages {
        async fn fetch_page(&self, page: u32) -> Result<Vec<RawEpisodeLabel>, SourceError> {
            self.calls.lock().unwrap().push(page);
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(SourceError::Malformed("short body".to_string()));
                }
            }
            let labels = self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default();
            Ok(labels
                .into_iter()
                .map(|text| RawEpisodeLabel::new(text, Some(format!("page-{}", page))))
                .collect())
        }
    }

    /// Knows Alien only, by its normalized title
    struct FakeOmdb {
        down: bool,
    }

    #[async_trait]
    impl MetadataSource for FakeOmdb {
        async fn query(
            &self,
            title: &str,
            _year: Option<&str>,
        ) -> Result<MetadataResponse, SourceError> {
            if self.down {
                return Err(SourceError::Malformed("offline".to_string()));
            }
            if title == "alien" {
                return Ok(MetadataResponse {
                    found: true,
                    external_id: Some("tt0078748".to_string()),
                    title: Some("Alien".to_string()),
                    year: Some("1979".to_string()),
                    rating: Some("8.5".to_string()),
                    ..Default::default()
                });
            }
            Ok(MetadataResponse::default())
        }
    }

    struct FakeStreaming;

    #[async_trait]
    impl AvailabilitySource for FakeStreaming {
        async fn query(
            &self,
            _external_id: &str,
            _country: &str,
        ) -> Result<AvailabilityResponse, SourceError> {
            Ok(serde_json::from_value(json!({
                "streamingInfo": {"us": {"hulu": [{"type": "subscription", "quality": "hd"}]}}
            }))
            .unwrap())
        }
    }

    const LABELS: [&str; 3] = [
        "Ep 1: Alien (1979)",
        "TRANSCRIPT Ep 1: Alien (1979)",
        "Ep 2: Predator (1987)",
    ];

    #[tokio::test]
    async fn test_scrape_stops_at_empty_page() {
        let source = FakePages::new(vec![vec![LABELS[0], LABELS[1]], vec![LABELS[2]], vec![]]);
        let labels = scrape_episodes(&source, 20, Duration::ZERO, RetryPolicy::none())
            .await
            .unwrap();

        assert_eq!(labels.len(), 3);
        assert_eq!(labels[2].source_url.as_deref(), Some("page-2"));
        assert_eq!(*source.calls.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_scrape_respects_page_limit() {
        let source = FakePages::new(vec![vec![LABELS[0]], vec![LABELS[2]], vec![LABELS[1]]]);
        let labels = scrape_episodes(&source, 2, Duration::ZERO, RetryPolicy::none())
            .await
            .unwrap();
        assert_eq!(labels.len(), 2);
    }

    #[tokio::test]
    async fn test_scrape_retries_then_fails_the_run() {
        let source = FakePages::new(vec![vec![LABELS[0]]]);
        *source.failures.lock().unwrap() = 1;
        let labels = scrape_episodes(&source, 1, Duration::ZERO, RetryPolicy::new(1, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(labels.len(), 1);

        let source = FakePages::new(vec![vec![LABELS[0]]]);
        *source.failures.lock().unwrap() = 5;
        let err = scrape_episodes(&source, 3, Duration::ZERO, RetryPolicy::new(2, Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Scrape { page: 1, .. }));
        assert_eq!(source.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_scrape_with_no_episodes_is_fatal() {
        let source = FakePages::new(vec![vec![]]);
        let err = scrape_episodes(&source, 5, Duration::ZERO, RetryPolicy::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoEpisodes));
    }

    async fn run_stages(omdb: FakeOmdb) -> (Vec<crate::models::CanonicalMovie>, RunStatistics) {
        let source = FakePages::new(vec![LABELS.to_vec()]);
        let labels = scrape_episodes(&source, 1, Duration::ZERO, RetryPolicy::none())
            .await
            .unwrap();
        let episodes = episodes_from_labels(&labels, &CleaningRules::default()).unwrap();

        let mut metadata_resolver = MetadataResolver::new(omdb, RetryPolicy::none(), Duration::ZERO);
        let metadata = lookup_metadata(&mut metadata_resolver, &episodes).await.unwrap();

        let mut availability_resolver =
            AvailabilityResolver::new(FakeStreaming, Duration::ZERO, Duration::ZERO);
        let availability = lookup_availability(&mut availability_resolver, &metadata, "us").await;

        let movies = dataset::assemble(&episodes, &metadata, &availability);
        let stats = RunStatistics::from_results(movies.len(), &metadata, &availability);
        (movies, stats)
    }

    #[tokio::test]
    async fn test_end_to_end_with_partial_metadata() {
        let (movies, stats) = run_stages(FakeOmdb { down: false }).await;

        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].imdb_id.as_deref(), Some("tt0078748"));
        assert_eq!(movies[0].streaming_options[0].service, "hulu");
        assert_eq!(movies[1].title, "Predator");
        assert_eq!(movies[1].imdb_id, None);
        assert_eq!(stats.successful_metadata, 1);
        assert_eq!(stats.successful_availability, 1);
        assert_eq!(stats.metadata_rate(), "50.0%");
    }

    #[tokio::test]
    async fn test_end_to_end_with_metadata_down() {
        let (movies, stats) = run_stages(FakeOmdb { down: true }).await;

        assert_eq!(movies.len(), 2);
        assert!(movies.iter().all(|m| m.imdb_id.is_none()));
        assert_eq!(movies[0].title, "Alien");
        assert_eq!(stats.successful_metadata, 0);
        assert_eq!(stats.availability_rate(), "0.0%");
    }

    /// Records every title it is asked for and never finds anything
    struct RecordingOmdb {
        queries: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MetadataSource for RecordingOmdb {
        async fn query(
            &self,
            title: &str,
            _year: Option<&str>,
        ) -> Result<MetadataResponse, SourceError> {
            self.queries.lock().unwrap().push(title.to_string());
            Ok(MetadataResponse::default())
        }
    }

    #[tokio::test]
    async fn test_metadata_is_queried_by_normalized_title() {
        let labels = vec![RawEpisodeLabel::new("Ep 7: Dr. Strangelove (1964)", None)];
        let episodes = episodes_from_labels(&labels, &CleaningRules::default()).unwrap();
        assert_eq!(episodes[0].normalized_title, "dr strangelove");

        let queries = Arc::new(Mutex::new(Vec::new()));
        let omdb = RecordingOmdb {
            queries: Arc::clone(&queries),
        };
        let mut resolver = MetadataResolver::new(omdb, RetryPolicy::none(), Duration::ZERO);
        let metadata = lookup_metadata(&mut resolver, &episodes).await.unwrap();
        assert!(metadata[0].is_none());

        let queries = queries.lock().unwrap().clone();
        assert_eq!(queries[0], "dr strangelove");
        assert!(queries.iter().all(|q| q != "Dr. Strangelove"));

        // Unresolved movies still publish the scraped title
        let movies = dataset::assemble(&episodes, &metadata, &[]);
        assert_eq!(movies[0].title, "Dr. Strangelove");
    }

    #[tokio::test]
    async fn test_availability_queries_each_id_once() {
        let record = MetadataRecord {
            external_id: "tt1".to_string(),
            title: "A".to_string(),
            year: "2000".to_string(),
            rating: None,
            votes: None,
            runtime: None,
            genre: None,
            director: None,
            actors: None,
            plot: None,
            poster: None,
        };
        let metadata = vec![Some(record.clone()), None, Some(record)];
        let mut resolver = AvailabilityResolver::new(FakeStreaming, Duration::ZERO, Duration::ZERO);

        let availability = lookup_availability(&mut resolver, &metadata, "us").await;
        assert_eq!(availability.len(), 1);
        assert_eq!(resolver.live_queries(), 1);
    }

    fn config_in(dir: &Path) -> AppConfig {
        AppConfig {
            paths: AppPaths {
                config_dir: dir.to_path_buf(),
                data_dir: dir.to_path_buf(),
            },
            omdb: Default::default(),
            streaming: Default::default(),
            scraper: Default::default(),
            cleaning: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_refresh_requires_api_key_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = refresh(&config, RunOptions::default()).await.unwrap_err();
        assert_eq!(err.stage(), "configuration");
        assert!(!dir.path().join("movies.json").exists());
    }

    #[tokio::test]
    async fn test_offline_refresh_keeps_ratings() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = DatasetStore::new(&config.paths);

        let mut alien = crate::models::CanonicalMovie {
            episode_number: Some("1".to_string()),
            title: "Alien".to_string(),
            year: "1979".to_string(),
            imdb_id: Some("tt0078748".to_string()),
            ..Default::default()
        };
        alien.ratings.rating = Some("8".to_string());
        store.save(vec![alien], &RunStatistics::default()).await.unwrap();

        let options = RunOptions {
            skip_scraping: true,
            skip_apis: true,
            skip_streaming: false,
        };
        let summary = refresh(&config, options).await.unwrap();
        assert_eq!(summary.episodes, 1);
        assert_eq!(summary.stats.successful_metadata, 1);
        assert_eq!(summary.ratings_carried, 1);
        assert_eq!(summary.metadata_queries, 0);
        assert_eq!(summary.availability_queries, 0);

        let reloaded = store.load().await.unwrap().unwrap();
        assert_eq!(reloaded.movies[0].ratings.rating.as_deref(), Some("8"));
        assert_eq!(reloaded.movies[0].imdb_id.as_deref(), Some("tt0078748"));
    }

    fn movie(title: &str, year: &str) -> crate::models::CanonicalMovie {
        crate::models::CanonicalMovie {
            title: title.to_string(),
            year: year.to_string(),
            ..Default::default()
        }
    }

    fn count_backups(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("movies.backup_"))
            .count()
    }

    #[tokio::test]
    async fn test_merge_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = DatasetStore::new(&config.paths);
        store
            .save(vec![movie("Alien", "1979")], &RunStatistics::default())
            .await
            .unwrap();

        let csv_path = dir.path().join("ratings.csv");
        std::fs::write(&csv_path, "Title,Year,AR,BR,JR,Rating\nAlien,1979.0,8,7,9,8\n").unwrap();
        let before = std::fs::read_to_string(store.movies_path()).unwrap();

        let report = merge_ratings_file(&config, &csv_path, None, true).await.unwrap();
        assert_eq!(report.matched(), 1);
        assert_eq!(std::fs::read_to_string(store.movies_path()).unwrap(), before);
        assert_eq!(count_backups(dir.path()), 0);

        merge_ratings_file(&config, &csv_path, None, false).await.unwrap();
        let merged = dataset::load_movies(store.movies_path()).await.unwrap();
        assert_eq!(merged.movies[0].ratings.jr.as_deref(), Some("9"));
        assert_eq!(count_backups(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_merge_output_is_loaded_backed_up_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = DatasetStore::new(&config.paths);
        store
            .save(vec![movie("Alien", "1979")], &RunStatistics::default())
            .await
            .unwrap();
        let configured_before = std::fs::read_to_string(store.movies_path()).unwrap();

        let other = tempfile::tempdir().unwrap();
        let output = other.path().join("movies.json");
        dataset::save_movies(&output, vec![movie("Precious", "2009")])
            .await
            .unwrap();

        let csv_path = dir.path().join("ratings.csv");
        std::fs::write(&csv_path, "Title,Year,AR,BR,JR,Rating\nPrecious,2009,7,6,8,7\n").unwrap();

        let report = merge_ratings_file(&config, &csv_path, Some(&output), false)
            .await
            .unwrap();
        assert_eq!(report.matched(), 1);

        let merged = dataset::load_movies(&output).await.unwrap();
        assert_eq!(merged.movies.len(), 1);
        assert_eq!(merged.movies[0].title, "Precious");
        assert_eq!(merged.movies[0].ratings.ar.as_deref(), Some("7"));

        assert_eq!(count_backups(other.path()), 1);
        assert_eq!(count_backups(dir.path()), 0);
        assert_eq!(
            std::fs::read_to_string(store.movies_path()).unwrap(),
            configured_before
        );
    }
}
