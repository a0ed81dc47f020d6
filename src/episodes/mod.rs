// Episode label parsing and cleaning

mod filter;
mod parser;

pub use filter::{clean_episodes, normalize_title};
pub use parser::parse_labels;

use crate::config::CleaningRules;
use crate::error::PipelineError;
use crate::models::{EpisodeKey, RawEpisodeLabel};

/// Parse and filter scraped labels into validated episode keys
pub fn episodes_from_labels(
    labels: &[RawEpisodeLabel],
    rules: &CleaningRules,
) -> Result<Vec<EpisodeKey>, PipelineError> {
    tracing::info!("Cleaning {} raw episodes", labels.len());
    clean_episodes(parse_labels(labels, rules), rules)
}
