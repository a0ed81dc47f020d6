use serde::{Deserialize, Serialize};

/// One episode label as scraped from the podcast site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEpisodeLabel {
    pub text: String,
    pub source_url: Option<String>,
}

impl RawEpisodeLabel {
    pub fn new(text: impl Into<String>, source_url: Option<String>) -> Self {
        Self {
            text: text.into(),
            source_url,
        }
    }
}

/// Parser output: every label yields one candidate, valid or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeCandidate {
    /// Raw token left of the first colon, e.g. "Ep 123" or "TRANSCRIPT Ep 1"
    pub number_token: Option<String>,
    pub title: String,
    /// Exactly four ASCII digits when present
    pub year: Option<String>,
    pub source_url: Option<String>,
}

/// A validated movie episode, ready for external lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeKey {
    pub number: Option<String>,
    pub title: String,
    pub year: String,
    /// Derived from `title`, see `episodes::normalize_title`
    pub normalized_title: String,
    pub source_url: Option<String>,
}

impl EpisodeKey {
    /// Combined search string. Title and year are concatenated without a
    /// separator, matching the historical feed format.
    pub fn search_key(&self) -> String {
        format!("{}{}", self.normalized_title, self.year)
    }
}

/// Raw answer from a metadata source for one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataResponse {
    pub found: bool,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub rating: Option<String>,
    pub votes: Option<String>,
    pub runtime: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub actors: Option<String>,
    pub plot: Option<String>,
    pub poster: Option<String>,
    /// Upstream reason when `found` is false
    pub error: Option<String>,
}

impl MetadataResponse {
    /// A response only counts as a hit when the source reports the record
    /// as found and hands back a non-empty identifier.
    pub fn into_record(self) -> Option<MetadataRecord> {
        if !self.found {
            return None;
        }
        let external_id = self.external_id.filter(|id| !id.trim().is_empty())?;
        Some(MetadataRecord {
            external_id,
            title: self.title.unwrap_or_default(),
            year: self.year.unwrap_or_default(),
            rating: self.rating,
            votes: self.votes,
            runtime: self.runtime,
            genre: self.genre,
            director: self.director,
            actors: self.actors,
            plot: self.plot,
            poster: self.poster,
        })
    }
}

/// Movie metadata; two records with the same `external_id` are the same movie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub external_id: String,
    pub title: String,
    pub year: String,
    pub rating: Option<String>,
    pub votes: Option<String>,
    pub runtime: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub actors: Option<String>,
    pub plot: Option<String>,
    pub poster: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferType {
    Subscription,
    Rent,
    Buy,
    Free,
}

impl OfferType {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "subscription" => Some(OfferType::Subscription),
            "rent" => Some(OfferType::Rent),
            "buy" => Some(OfferType::Buy),
            "free" => Some(OfferType::Free),
            _ => None,
        }
    }
}

/// One way to watch a movie on one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingOption {
    pub service: String,
    #[serde(rename = "type")]
    pub offer_type: OfferType,
    pub quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default)]
    pub link: String,
}

/// Viewing options for one movie in one country. Empty `options` means the
/// lookup succeeded and nothing is offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRecord {
    pub external_id: String,
    pub title: Option<String>,
    pub options: Vec<StreamingOption>,
}

/// Host rating fields added by the ratings merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostRatings {
    pub ar: Option<String>,
    pub br: Option<String>,
    pub jr: Option<String>,
    pub rating: Option<String>,
    pub rating_notes: String,
}

impl HostRatings {
    pub fn is_empty(&self) -> bool {
        self.ar.is_none()
            && self.br.is_none()
            && self.jr.is_none()
            && self.rating.is_none()
            && self.rating_notes.trim().is_empty()
    }
}

/// The persisted, joined unit: one per episode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalMovie {
    pub episode_number: Option<String>,
    pub episode_url: Option<String>,
    pub title: String,
    pub year: String,
    pub imdb_id: Option<String>,
    pub imdb_rating: Option<String>,
    pub imdb_votes: Option<String>,
    pub imdb_url: Option<String>,
    pub runtime: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub actors: Option<String>,
    pub plot: Option<String>,
    pub poster: Option<String>,
    pub streaming_options: Vec<StreamingOption>,
    #[serde(flatten)]
    pub ratings: HostRatings,
}

/// One row of the ratings export, values as they appear in the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingEntry {
    pub title: String,
    pub year: String,
    pub ar: Option<String>,
    pub br: Option<String>,
    pub jr: Option<String>,
    pub rating: Option<String>,
    pub rating_notes: Option<String>,
}
