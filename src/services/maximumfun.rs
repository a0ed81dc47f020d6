// Maximum Fun podcast listing scraper
// Episode titles live in `div.latest-panel-loop-item-title h4` on each listing page

use async_trait::async_trait;
use reqwest::{header, Client};
use scraper::{Html, Selector};
use std::time::Duration;

use super::EpisodeSource;
use crate::config::ScraperConfig;
use crate::error::SourceError;
use crate::models::RawEpisodeLabel;

const EPISODE_TITLE_SELECTOR: &str = "div.latest-panel-loop-item-title h4";

/// Bodies shorter than this are error stubs, not listing pages
const MIN_PAGE_BYTES: usize = 100;

/// Listing page client for one podcast
pub struct MaximumFunScraper {
    client: Client,
    base_url: String,
}

impl MaximumFunScraper {
    pub fn new(config: &ScraperConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}?_paged={}", self.base_url, page)
    }
}

/// Extract episode labels from a listing page. Whitespace inside a title is
/// collapsed; empty titles are skipped.
pub fn parse_listing(html: &str, page_url: &str) -> Result<Vec<RawEpisodeLabel>, SourceError> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse(EPISODE_TITLE_SELECTOR).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let labels = document
        .select(&selector)
        .map(|heading| {
            heading
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .map(|text| RawEpisodeLabel::new(text, Some(page_url.to_string())))
        .collect();

    Ok(labels)
}

#[async_trait]
impl EpisodeSource for MaximumFunScraper {
    async fn fetch_page(&self, page: u32) -> Result<Vec<RawEpisodeLabel>, SourceError> {
        let url = self.page_url(page);
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "text/html")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let body = response.text().await?;
        if body.len() < MIN_PAGE_BYTES {
            return Err(SourceError::Malformed(format!(
                "page {} body is only {} bytes",
                page,
                body.len()
            )));
        }

        parse_listing(&body, &url)
    }
}
