// Streaming availability service (RapidAPI)
// Returns per-country offers for an IMDb id

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use super::AvailabilitySource;
use crate::config::StreamingConfig;
use crate::error::{PipelineError, SourceError};

/// `/get` response: `streamingInfo` maps country -> service -> list of offers.
/// Offers are kept as raw JSON so one odd entry cannot fail the whole movie.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityResponse {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "streamingInfo", default)]
    pub streaming_info: HashMap<String, Map<String, Value>>,
}

/// One offer inside `streamingInfo`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOffer {
    #[serde(rename = "type")]
    pub offer_type: Option<String>,
    pub quality: Option<String>,
    pub link: Option<String>,
    pub price: Option<RawPrice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPrice {
    pub amount: Option<Value>,
}

/// Streaming availability API client
pub struct StreamingClient {
    client: Client,
    api_key: String,
    base_url: String,
    host: String,
}

impl StreamingClient {
    pub fn new(api_key: String, config: &StreamingConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            host: config.host.clone(),
        }
    }

    /// Create client from configuration; the RapidAPI key is mandatory
    pub fn from_config(config: &StreamingConfig) -> Result<Self, PipelineError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(PipelineError::MissingApiKey {
                service: "Streaming availability",
                env_var: "RAPIDAPI_KEY",
            })?;
        Ok(Self::new(api_key, config))
    }

    fn get_url(&self, external_id: &str) -> String {
        format!(
            "{}/get?imdb_id={}&output_language=en",
            self.base_url,
            urlencoding::encode(external_id)
        )
    }
}

#[async_trait]
impl AvailabilitySource for StreamingClient {
    // The endpoint returns every country at once; the resolver picks one
    async fn query(
        &self,
        external_id: &str,
        _country: &str,
    ) -> Result<AvailabilityResponse, SourceError> {
        tracing::debug!("Streaming lookup: {}", external_id);

        let response = self
            .client
            .get(self.get_url(external_id))
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_url() {
        let config = StreamingConfig {
            base_url: "https://api.example.com/".to_string(),
            ..Default::default()
        };
        let client = StreamingClient::new("key".to_string(), &config);
        assert_eq!(
            client.get_url("tt0078748"),
            "https://api.example.com/get?imdb_id=tt0078748&output_language=en"
        );
    }

    #[test]
    fn test_from_config_requires_key() {
        let err = StreamingClient::from_config(&StreamingConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.stage(), "configuration");
    }

    #[test]
    fn test_response_shape() {
        let body = r#"{
            "title": "Alien",
            "year": 1979,
            "streamingInfo": {
                "us": {
                    "hulu": [{"type": "subscription", "quality": "hd", "link": "https://hulu.com/alien"}],
                    "apple": [{"type": "rent", "quality": "uhd", "link": "https://apple.com/alien",
                               "price": {"amount": "3.99", "currency": "USD"}}]
                }
            }
        }"#;

        let response: AvailabilityResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.title.as_deref(), Some("Alien"));
        let us = &response.streaming_info["us"];
        assert_eq!(us.len(), 2);

        let offers: Vec<RawOffer> = serde_json::from_value(us["apple"].clone()).unwrap();
        let price = offers[0].price.as_ref().unwrap();
        assert_eq!(price.amount, Some(Value::String("3.99".to_string())));
    }

    #[test]
    fn test_missing_streaming_info_defaults_to_empty() {
        let response: AvailabilityResponse = serde_json::from_str(r#"{"title": "Obscure"}"#).unwrap();
        assert!(response.streaming_info.is_empty());
    }
}
