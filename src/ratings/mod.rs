// Fuzzy rating merger
// Matches rating rows onto canonical movies by year-gated title similarity.

mod loader;
mod similarity;

pub use loader::load_ratings;
pub use similarity::ratio;

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::models::{CanonicalMovie, HostRatings, RatingEntry};

/// Minimum similarity for a match
pub const MATCH_THRESHOLD: f64 = 0.90;

/// Number of match details shown in the report
const REPORT_DETAIL_LIMIT: usize = 10;

static RE_YEAR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d{4}\).*$").unwrap());
static RE_YEAR_IN_TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d{4})\)").unwrap());

const STRIPPED_PUNCTUATION: [char; 8] = [':', ',', '.', '!', '?', '-', '\'', '"'];

/// Drop "(1999)" and anything after it
pub fn clean_title(title: &str) -> String {
    RE_YEAR_SUFFIX.replace(title, "").trim().to_string()
}

/// Lowercase, drop a leading "the " (or a trailing ", the"), strip punctuation
pub fn normalize_for_match(title: &str) -> String {
    let lower = title.to_lowercase();
    let mut title = lower.trim();

    if let Some(rest) = title.strip_suffix(", the") {
        title = rest.trim_end();
    } else if let Some(rest) = title.strip_prefix("the ") {
        title = rest.trim_start();
    }

    title
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// "1979.0" -> "1979"; empty or "nan" -> None
pub fn normalize_year(raw: &str) -> Option<String> {
    let year = raw.trim();
    if year.is_empty() || year.eq_ignore_ascii_case("nan") {
        return None;
    }

    if let Ok(value) = year.parse::<f64>() {
        if value.is_finite() && value.fract() == 0.0 {
            return Some(format!("{}", value as i64));
        }
    }

    Some(year.to_string())
}

/// Year column first, then a "(1999)" inside the title
fn entry_year(entry: &RatingEntry) -> Option<String> {
    normalize_year(&entry.year).or_else(|| {
        RE_YEAR_IN_TITLE
            .captures(&entry.title)
            .map(|caps| caps[1].to_string())
    })
}

/// Empty, "n/a", "none" and "-" mean no rating
pub fn sanitize_value(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    let lower = value.to_lowercase();
    if value.is_empty() || matches!(lower.as_str(), "n/a" | "none" | "-" | "nan") {
        return None;
    }
    Some(value.to_string())
}

/// Best same-year candidate. The index is set only when the score clears
/// the threshold; the score is returned either way.
pub fn find_best_match(entry: &RatingEntry, movies: &[CanonicalMovie]) -> (Option<usize>, f64) {
    let title = clean_title(&entry.title);
    let Some(year) = entry_year(entry) else {
        return (None, 0.0);
    };
    if title.is_empty() {
        return (None, 0.0);
    }

    let wanted = normalize_for_match(&title);
    let mut best: Option<usize> = None;
    let mut best_score = 0.0;

    for (index, movie) in movies.iter().enumerate() {
        if movie.year.trim() != year {
            continue;
        }

        let score = ratio(&wanted, &normalize_for_match(&clean_title(&movie.title)));
        if score > best_score {
            best_score = score;
            best = Some(index);
        }
    }

    if best_score >= MATCH_THRESHOLD {
        (best, best_score)
    } else {
        (None, best_score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchDetail {
    pub rating_title: String,
    pub rating_year: String,
    pub movie_title: String,
    pub movie_year: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedRating {
    pub title: String,
    pub year: String,
    pub best_score: f64,
}

/// Outcome of one merge pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub total_movies: usize,
    pub total_ratings: usize,
    pub matches: Vec<MatchDetail>,
    pub unmatched: Vec<UnmatchedRating>,
}

impl MergeReport {
    pub fn matched(&self) -> usize {
        self.matches.len()
    }

    pub fn match_rate(&self) -> f64 {
        if self.total_ratings == 0 {
            return 0.0;
        }
        self.matched() as f64 / self.total_ratings as f64 * 100.0
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RATING MERGE REPORT")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Total movies in dataset: {}", self.total_movies)?;
        writeln!(f, "Total ratings in CSV: {}", self.total_ratings)?;
        writeln!(
            f,
            "Successfully matched: {} ({:.1}%)",
            self.matched(),
            self.match_rate()
        )?;
        writeln!(f, "Unmatched ratings: {}", self.unmatched.len())?;

        if !self.matches.is_empty() {
            writeln!(f)?;
            writeln!(f, "Matches:")?;
            for detail in self.matches.iter().take(REPORT_DETAIL_LIMIT) {
                writeln!(
                    f,
                    "  {} ({}) -> {} ({}) [{:.1}%]",
                    detail.rating_title,
                    detail.rating_year,
                    detail.movie_title,
                    detail.movie_year,
                    detail.confidence * 100.0
                )?;
            }
            if self.matches.len() > REPORT_DETAIL_LIMIT {
                writeln!(
                    f,
                    "  ... and {} more",
                    self.matches.len() - REPORT_DETAIL_LIMIT
                )?;
            }
        }

        if !self.unmatched.is_empty() {
            writeln!(f)?;
            writeln!(f, "Unmatched:")?;
            for entry in &self.unmatched {
                if entry.best_score > 0.0 {
                    writeln!(
                        f,
                        "  {} ({}) [best: {:.1}%]",
                        entry.title,
                        entry.year,
                        entry.best_score * 100.0
                    )?;
                } else {
                    writeln!(f, "  {} ({}) [No match]", entry.title, entry.year)?;
                }
            }
        }

        Ok(())
    }
}

/// Merge ratings onto movies in place. Rating fields of matched movies are
/// overwritten; a movie matched by several rows keeps the last one. Movies
/// no row matched keep whatever ratings they already had.
pub fn merge_ratings(movies: &mut [CanonicalMovie], ratings: &[RatingEntry]) -> MergeReport {
    let mut report = MergeReport {
        total_movies: movies.len(),
        total_ratings: ratings.len(),
        ..Default::default()
    };
    let mut hits: HashMap<usize, usize> = HashMap::new();

    for entry in ratings {
        let year = entry_year(entry).unwrap_or_default();
        let (index, score) = find_best_match(entry, movies);

        let Some(index) = index else {
            report.unmatched.push(UnmatchedRating {
                title: entry.title.clone(),
                year,
                best_score: score,
            });
            continue;
        };

        let movie = &mut movies[index];
        movie.ratings = HostRatings {
            ar: sanitize_value(entry.ar.as_deref()),
            br: sanitize_value(entry.br.as_deref()),
            jr: sanitize_value(entry.jr.as_deref()),
            rating: sanitize_value(entry.rating.as_deref()),
            rating_notes: entry
                .rating_notes
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        };

        let count = hits.entry(index).or_default();
        *count += 1;
        if *count > 1 {
            tracing::warn!(
                "{} ({}) matched by more than one rating row; keeping the last",
                movie.title,
                movie.year
            );
        }

        report.matches.push(MatchDetail {
            rating_title: entry.title.clone(),
            rating_year: year,
            movie_title: movie.title.clone(),
            movie_year: movie.year.clone(),
            confidence: score,
        });
    }

    tracing::info!(
        "Matched {}/{} ratings ({} unmatched)",
        report.matched(),
        report.total_ratings,
        report.unmatched.len()
    );

    report
}
