// Previous-run index
// Lets a refresh reuse the last published dataset instead of the network,
// and keeps merged ratings across refreshes.

use super::distinct_ids;
use crate::episodes::normalize_title;
use crate::models::{
    AvailabilityRecord, CanonicalMovie, EpisodeKey, MetadataRecord, RawEpisodeLabel,
};

#[derive(Debug, Clone, Default)]
pub struct PreviousRun {
    movies: Vec<CanonicalMovie>,
}

impl PreviousRun {
    pub fn new(movies: Vec<CanonicalMovie>) -> Self {
        Self { movies }
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    /// Rebuild raw labels so the parser sees the same shape it scrapes.
    /// The number token is left empty when unknown so a colon inside the
    /// title is never taken as the separator.
    pub fn labels(&self) -> Vec<RawEpisodeLabel> {
        self.movies
            .iter()
            .map(|movie| {
                let text = format!(
                    "{}: {} ({})",
                    movie.episode_number.as_deref().unwrap_or_default(),
                    movie.title,
                    movie.year
                );
                RawEpisodeLabel::new(text, movie.episode_url.clone())
            })
            .collect()
    }

    /// Episode number when both sides have one, otherwise normalized
    /// title and year
    pub fn find(&self, episode: &EpisodeKey) -> Option<&CanonicalMovie> {
        if let Some(number) = episode.number.as_deref() {
            let by_number = self
                .movies
                .iter()
                .find(|movie| movie.episode_number.as_deref() == Some(number));
            if by_number.is_some() {
                return by_number;
            }
        }

        self.movies.iter().find(|movie| {
            movie.year.trim() == episode.year && normalize_title(&movie.title) == episode.normalized_title
        })
    }

    /// Metadata as stored by the previous run, aligned with `episodes`
    pub fn metadata_for(&self, episodes: &[EpisodeKey]) -> Vec<Option<MetadataRecord>> {
        episodes
            .iter()
            .map(|episode| self.find(episode).and_then(stored_metadata))
            .collect()
    }

    /// Stored viewing options for each distinct found id, in the same order
    /// as a live lookup; ids with no stored options are left out
    pub fn availability_for(&self, metadata: &[Option<MetadataRecord>]) -> Vec<Option<AvailabilityRecord>> {
        distinct_ids(metadata)
            .into_iter()
            .map(|external_id| {
                self.movies
                    .iter()
                    .find(|movie| {
                        movie.imdb_id.as_deref() == Some(external_id.as_str())
                            && !movie.streaming_options.is_empty()
                    })
                    .map(|movie| AvailabilityRecord {
                        title: Some(movie.title.clone()),
                        options: movie.streaming_options.clone(),
                        external_id,
                    })
            })
            .collect()
    }

    /// Copy merged ratings onto freshly assembled movies. `movies[i]` must
    /// belong to `episodes[i]`. Returns how many movies kept their ratings.
    pub fn carry_over_ratings(&self, episodes: &[EpisodeKey], movies: &mut [CanonicalMovie]) -> usize {
        let mut carried = 0;
        for (episode, movie) in episodes.iter().zip(movies.iter_mut()) {
            let Some(previous) = self.find(episode) else {
                continue;
            };
            if !previous.ratings.is_empty() {
                movie.ratings = previous.ratings.clone();
                carried += 1;
            }
        }
        carried
    }
}

fn stored_metadata(movie: &CanonicalMovie) -> Option<MetadataRecord> {
    let external_id = movie.imdb_id.clone().filter(|id| !id.trim().is_empty())?;
    Some(MetadataRecord {
        external_id,
        title: movie.title.clone(),
        year: movie.year.clone(),
        rating: movie.imdb_rating.clone(),
        votes: movie.imdb_votes.clone(),
        runtime: movie.runtime.clone(),
        genre: movie.genre.clone(),
        director: movie.director.clone(),
        actors: movie.actors.clone(),
        plot: movie.plot.clone(),
        poster: movie.poster.clone(),
    })
}
