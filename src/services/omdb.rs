// OMDb metadata provider service
// API Documentation: https://www.omdbapi.com/

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::MetadataSource;
use crate::config::OmdbConfig;
use crate::error::{PipelineError, SourceError};
use crate::models::MetadataResponse;

/// OMDb marks absent fields with this literal
const NOT_AVAILABLE: &str = "N/A";

/// OMDb API client
pub struct OmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Title lookup response (`?t=`). Every field is a string, including numbers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbMovie {
    response: String,
    error: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    title: Option<String>,
    year: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    imdb_votes: Option<String>,
    runtime: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    actors: Option<String>,
    plot: Option<String>,
    poster: Option<String>,
}

impl From<OmdbMovie> for MetadataResponse {
    fn from(movie: OmdbMovie) -> Self {
        MetadataResponse {
            found: movie.response.eq_ignore_ascii_case("true"),
            external_id: available(movie.imdb_id),
            title: available(movie.title),
            year: available(movie.year),
            rating: available(movie.imdb_rating),
            votes: available(movie.imdb_votes),
            runtime: available(movie.runtime),
            genre: available(movie.genre),
            director: available(movie.director),
            actors: available(movie.actors),
            plot: available(movie.plot),
            poster: available(movie.poster),
            error: movie.error,
        }
    }
}

fn available(value: Option<String>) -> Option<String> {
    value.filter(|v| v != NOT_AVAILABLE && !v.trim().is_empty())
}

impl OmdbClient {
    /// Create a new OMDb client
    pub fn new(api_key: String, config: &OmdbConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: config.base_url.clone(),
        }
    }

    /// Create client from configuration; the API key is mandatory
    pub fn from_config(config: &OmdbConfig) -> Result<Self, PipelineError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(PipelineError::MissingApiKey {
                service: "OMDb",
                env_var: "OMDB_API_KEY",
            })?;
        Ok(Self::new(api_key, config))
    }

    fn title_url(&self, title: &str, year: Option<&str>) -> String {
        let mut url = format!(
            "{}?apikey={}&t={}&type=movie",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(title)
        );

        if let Some(y) = year {
            url.push_str(&format!("&y={}", urlencoding::encode(y)));
        }

        url
    }
}

/// Decode a title lookup body
fn parse_movie(body: &str) -> Result<MetadataResponse, SourceError> {
    let movie: OmdbMovie =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;
    Ok(movie.into())
}

#[async_trait]
impl MetadataSource for OmdbClient {
    async fn query(
        &self,
        title: &str,
        year: Option<&str>,
    ) -> Result<MetadataResponse, SourceError> {
        tracing::debug!("OMDb lookup: {} ({})", title, year.unwrap_or("any year"));

        let response = self.client.get(self.title_url(title, year)).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let body = response.text().await?;
        parse_movie(&body)
    }
}
