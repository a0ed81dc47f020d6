// Dataset assembly
// Joins episodes, metadata and availability into one canonical movie per episode.

mod previous;
mod store;

pub use previous::PreviousRun;
pub use store::{backup_movies, load_movies, save_movies, DatasetStore};

use crate::models::{AvailabilityRecord, CanonicalMovie, EpisodeKey, MetadataRecord};

/// Plot text for movies the metadata source could not find
pub const METADATA_MISSING_NOTE: &str =
    "IMDb data not found for this movie. Episode information scraped from podcast website.";

pub fn imdb_url(external_id: &str) -> String {
    format!("https://www.imdb.com/title/{}", external_id)
}

/// Each found external id once, in first-seen order
pub fn distinct_ids(metadata: &[Option<MetadataRecord>]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for record in metadata.iter().flatten() {
        if !ids.contains(&record.external_id) {
            ids.push(record.external_id.clone());
        }
    }
    ids
}

/// Build exactly one movie per episode. `metadata[i]` belongs to
/// `episodes[i]`; availability is looked up by external id.
pub fn assemble(
    episodes: &[EpisodeKey],
    metadata: &[Option<MetadataRecord>],
    availability: &[Option<AvailabilityRecord>],
) -> Vec<CanonicalMovie> {
    episodes
        .iter()
        .enumerate()
        .map(|(i, episode)| {
            let record = metadata.get(i).and_then(Option::as_ref);
            let offers = record.and_then(|r| find_availability(availability, &r.external_id));
            build_movie(episode, record, offers)
        })
        .collect()
}

/// Linear scan, first match wins
fn find_availability<'a>(
    availability: &'a [Option<AvailabilityRecord>],
    external_id: &str,
) -> Option<&'a AvailabilityRecord> {
    availability
        .iter()
        .flatten()
        .find(|record| record.external_id == external_id)
}

fn build_movie(
    episode: &EpisodeKey,
    metadata: Option<&MetadataRecord>,
    availability: Option<&AvailabilityRecord>,
) -> CanonicalMovie {
    let streaming_options = availability
        .map(|record| record.options.clone())
        .unwrap_or_default();

    let Some(record) = metadata else {
        return CanonicalMovie {
            episode_number: episode.number.clone(),
            episode_url: episode.source_url.clone(),
            title: episode.title.clone(),
            year: episode.year.clone(),
            plot: Some(METADATA_MISSING_NOTE.to_string()),
            streaming_options,
            ..Default::default()
        };
    };

    let title = non_empty(&record.title).unwrap_or(&episode.title);
    let year = non_empty(&record.year).unwrap_or(&episode.year);

    CanonicalMovie {
        episode_number: episode.number.clone(),
        episode_url: episode.source_url.clone(),
        title: title.to_string(),
        year: year.to_string(),
        imdb_id: Some(record.external_id.clone()),
        imdb_rating: record.rating.clone(),
        imdb_votes: record.votes.clone(),
        imdb_url: Some(imdb_url(&record.external_id)),
        runtime: record.runtime.clone(),
        genre: record.genre.clone(),
        director: record.director.clone(),
        actors: record.actors.clone(),
        plot: record.plot.clone(),
        poster: record.poster.clone(),
        streaming_options,
        ratings: Default::default(),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Enrichment counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub total: usize,
    pub successful_metadata: usize,
    pub successful_availability: usize,
}

impl RunStatistics {
    /// Availability only counts when at least one option was found
    pub fn from_results(
        total: usize,
        metadata: &[Option<MetadataRecord>],
        availability: &[Option<AvailabilityRecord>],
    ) -> Self {
        Self {
            total,
            successful_metadata: metadata.iter().flatten().count(),
            successful_availability: availability
                .iter()
                .flatten()
                .filter(|record| !record.options.is_empty())
                .count(),
        }
    }

    pub fn metadata_rate(&self) -> String {
        format_rate(self.successful_metadata, self.total)
    }

    pub fn availability_rate(&self) -> String {
        format_rate(self.successful_availability, self.total)
    }
}

/// "87.5%", or "0%" when there is nothing to divide by
fn format_rate(count: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", count as f64 / total as f64 * 100.0)
}
