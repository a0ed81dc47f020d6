// Episode filter and normalizer
// Decides which parsed candidates are real movie episodes and builds the
// normalized lookup key for each survivor.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::CleaningRules;
use crate::error::PipelineError;
use crate::models::{EpisodeCandidate, EpisodeKey};

static RE_NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{N}]+").unwrap());

/// Keep only movie episodes. An empty result is fatal for the run.
pub fn clean_episodes(
    candidates: Vec<EpisodeCandidate>,
    rules: &CleaningRules,
) -> Result<Vec<EpisodeKey>, PipelineError> {
    let total = candidates.len();
    let mut excluded = 0;
    let mut incomplete = 0;
    let mut episodes = Vec::with_capacity(total);

    for candidate in candidates {
        if is_excluded(&candidate, rules) {
            excluded += 1;
            tracing::debug!(
                "Excluding non-movie episode: {:?} {}",
                candidate.number_token,
                candidate.title
            );
            continue;
        }

        match validate(candidate, rules) {
            Some(episode) => {
                tracing::debug!("Episode key: {}", episode.search_key());
                episodes.push(episode);
            }
            None => incomplete += 1,
        }
    }

    if excluded > 0 {
        tracing::info!("Filtered out {} non-movie episodes", excluded);
    }
    if incomplete > 0 {
        tracing::info!("Dropped {} episodes missing a title or year", incomplete);
    }

    if episodes.is_empty() {
        return Err(PipelineError::NoEpisodes);
    }

    tracing::info!("Cleaned {}/{} valid episodes", episodes.len(), total);
    Ok(episodes)
}

/// Substring match, case-insensitive, on the raw number token or the title.
/// Matches anywhere in the string, so "Special" also drops "Specials".
pub fn is_excluded(candidate: &EpisodeCandidate, rules: &CleaningRules) -> bool {
    let number = candidate
        .number_token
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let title = candidate.title.to_lowercase();

    rules
        .exclude_patterns
        .iter()
        .map(|pattern| pattern.to_lowercase())
        .filter(|pattern| !pattern.is_empty())
        .any(|pattern| number.contains(&pattern) || title.contains(&pattern))
}

fn validate(candidate: EpisodeCandidate, rules: &CleaningRules) -> Option<EpisodeKey> {
    let number = candidate
        .number_token
        .as_deref()
        .and_then(|token| normalize_number(token, rules));
    let title = apply_title_fixes(&candidate.title, rules);
    let year = candidate.year?;

    if title.is_empty() {
        return None;
    }

    let normalized_title = normalize_title(&title);
    Some(EpisodeKey {
        number,
        title,
        year,
        normalized_title,
        source_url: candidate.source_url,
    })
}

/// "Ep 123" -> "123", "Episode 12" -> "12"; whole-token sentinels (a bare
/// "Ep" by default) map to their configured number
pub fn normalize_number(token: &str, rules: &CleaningRules) -> Option<String> {
    let mut number = token.trim();

    for prefix in &rules.number_prefixes {
        if let Some(rest) = number.strip_prefix(prefix.as_str()) {
            number = rest.trim_start();
        }
    }
    let number = number.trim();

    if let Some(sentinel) = rules.number_sentinels.iter().find(|s| s.token == number) {
        return Some(sentinel.number.clone());
    }

    (!number.is_empty()).then(|| number.to_string())
}

pub fn apply_title_fixes(title: &str, rules: &CleaningRules) -> String {
    rules
        .title_fixes
        .iter()
        .filter(|fix| !fix.find.is_empty())
        .fold(title.to_string(), |acc, fix| acc.replace(&fix.find, &fix.replace))
        .trim()
        .to_string()
}

/// Lowercase, collapse every run of non-alphanumeric characters to a single
/// space, trim. Idempotent.
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    RE_NON_ALNUM.replace_all(&lower, " ").trim().to_string()
}
