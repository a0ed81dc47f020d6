// Dataset persistence: movies.json and metadata.json

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::RunStatistics;
use crate::config::AppPaths;
use crate::error::PipelineError;
use crate::models::CanonicalMovie;

/// movies.json envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoviesFile {
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub total_movies: usize,
    pub movies: Vec<CanonicalMovie>,
}

impl MoviesFile {
    pub fn new(movies: Vec<CanonicalMovie>, now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            total_movies: movies.len(),
            movies,
        }
    }
}

/// metadata.json: run statistics for the published dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub last_updated: String,
    pub last_updated_readable: String,
    pub statistics: DatasetStatistics,
    pub data_sources: DataSources,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub total_movies: usize,
    pub successful_omdb_queries: usize,
    pub successful_streaming_queries: usize,
    pub omdb_success_rate: String,
    pub streaming_success_rate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSources {
    pub episodes: String,
    pub movie_data: String,
    pub streaming_data: String,
}

impl Default for DataSources {
    fn default() -> Self {
        Self {
            episodes: "Maximum Fun Friendly Fire podcast".to_string(),
            movie_data: "OMDb API".to_string(),
            streaming_data: "Streaming Availability API".to_string(),
        }
    }
}

impl DatasetMetadata {
    pub fn new(stats: &RunStatistics, now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            last_updated_readable: now.format("%B %d, %Y at %H:%M UTC").to_string(),
            statistics: DatasetStatistics {
                total_movies: stats.total,
                successful_omdb_queries: stats.successful_metadata,
                successful_streaming_queries: stats.successful_availability,
                omdb_success_rate: stats.metadata_rate(),
                streaming_success_rate: stats.availability_rate(),
            },
            data_sources: DataSources::default(),
        }
    }
}

/// Reads and writes the dataset files
#[derive(Debug, Clone)]
pub struct DatasetStore {
    movies_path: PathBuf,
    metadata_path: PathBuf,
}

impl DatasetStore {
    pub fn new(paths: &AppPaths) -> Self {
        Self::with_paths(paths.movies_path(), paths.metadata_path())
    }

    pub fn with_paths(movies_path: PathBuf, metadata_path: PathBuf) -> Self {
        Self {
            movies_path,
            metadata_path,
        }
    }

    pub fn movies_path(&self) -> &Path {
        &self.movies_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Previous dataset, or `None` when nothing has been written yet
    pub async fn load(&self) -> Result<Option<MoviesFile>, PipelineError> {
        if !fs::try_exists(&self.movies_path)
            .await
            .map_err(|source| io_error(&self.movies_path, source))?
        {
            return Ok(None);
        }
        load_movies(&self.movies_path).await.map(Some)
    }

    /// Write movies.json and metadata.json for a finished run
    pub async fn save(
        &self,
        movies: Vec<CanonicalMovie>,
        stats: &RunStatistics,
    ) -> Result<(), PipelineError> {
        let now = Utc::now();
        write_json(&self.movies_path, &MoviesFile::new(movies, now)).await?;
        write_json(&self.metadata_path, &DatasetMetadata::new(stats, now)).await?;

        tracing::info!("Saved {}", self.movies_path.display());
        tracing::info!("Saved {}", self.metadata_path.display());
        Ok(())
    }
}

/// Copy a movies file to `<stem>.backup_YYYYmmdd_HHMMSS.json` next to it
pub async fn backup_movies(path: &Path) -> Result<PathBuf, PipelineError> {
    let backup_path = backup_path(path, Utc::now());
    fs::copy(path, &backup_path)
        .await
        .map_err(|source| io_error(&backup_path, source))?;

    tracing::info!("Backup created: {}", backup_path.display());
    Ok(backup_path)
}

pub async fn load_movies(path: &Path) -> Result<MoviesFile, PipelineError> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|source| io_error(path, source))?;

    serde_json::from_str(&contents).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a movies envelope to an arbitrary path (merge output)
pub async fn save_movies(path: &Path, movies: Vec<CanonicalMovie>) -> Result<(), PipelineError> {
    write_json(path, &MoviesFile::new(movies, Utc::now())).await
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| io_error(parent, source))?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, json)
        .await
        .map_err(|source| io_error(path, source))
}

fn backup_path(movies_path: &Path, now: DateTime<Utc>) -> PathBuf {
    let stem = movies_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("movies");
    movies_path.with_file_name(format!("{}.backup_{}.json", stem, now.format("%Y%m%d_%H%M%S")))
}

fn io_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}
