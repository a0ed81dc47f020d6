// Error taxonomy for external sources and pipeline stages

use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to an external collaborator (podcast site, OMDb, streaming API)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream explicitly asked us to slow down (HTTP 429)
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited)
    }
}

/// Run-level failure; always names the stage that failed
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no valid episodes after cleaning")]
    NoEpisodes,

    #[error("batch length mismatch: {titles} titles but {years} years")]
    BatchLengthMismatch { titles: usize, years: usize },

    #[error("failed to scrape episode page {page}: {source}")]
    Scrape {
        page: u32,
        #[source]
        source: SourceError,
    },

    #[error("{service} API key is required (set {env_var} or add it to config.toml)")]
    MissingApiKey {
        service: &'static str,
        env_var: &'static str,
    },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dataset JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read ratings CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PipelineError {
    /// Pipeline stage the error belongs to, for run-level reporting
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Scrape { .. } => "scrape",
            PipelineError::NoEpisodes => "clean",
            PipelineError::BatchLengthMismatch { .. } => "metadata",
            PipelineError::MissingApiKey { .. } => "configuration",
            PipelineError::Io { .. } | PipelineError::Json { .. } => "persistence",
            PipelineError::Csv { .. } => "ratings",
        }
    }
}
