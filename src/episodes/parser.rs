// Episode label parser
// "Ep 123: Some Movie (1999)" -> number token, title, year

use crate::config::CleaningRules;
use crate::models::{EpisodeCandidate, RawEpisodeLabel};

/// Parse one scraped label. Never drops input: malformed labels still
/// produce a candidate, the filter decides what survives.
pub fn parse_label(label: &RawEpisodeLabel, rules: &CleaningRules) -> EpisodeCandidate {
    let text = fix_encoding_artifacts(label.text.trim(), rules);

    let (number_token, content) = match text.split_once(':') {
        Some((number, content)) => {
            let number = number.trim();
            let number = (!number.is_empty()).then(|| number.to_string());
            (number, content)
        }
        None => {
            tracing::debug!("No episode number in label: {}", text);
            (None, text.as_str())
        }
    };

    let content = strip_quotes(content, &rules.quote_chars);
    let (title, year) = split_title_year(&content);

    EpisodeCandidate {
        number_token,
        title,
        year,
        source_url: label.source_url.clone(),
    }
}

pub fn parse_labels(labels: &[RawEpisodeLabel], rules: &CleaningRules) -> Vec<EpisodeCandidate> {
    labels.iter().map(|label| parse_label(label, rules)).collect()
}

/// Replace known mis-decoded sequences (e.g. a UTF-8 right single quote read
/// as Windows-1252) with their configured replacement
pub fn fix_encoding_artifacts(text: &str, rules: &CleaningRules) -> String {
    rules
        .encoding_artifacts
        .iter()
        .filter(|artifact| !artifact.find.is_empty())
        .fold(text.to_string(), |acc, artifact| {
            acc.replace(&artifact.find, &artifact.replace)
        })
}

fn strip_quotes(text: &str, quote_chars: &[char]) -> String {
    text.chars().filter(|c| !quote_chars.contains(c)).collect()
}

/// Split "Title (1999)" on the first opening parenthesis. The year is the
/// token up to the closing parenthesis and only kept when it is four digits.
fn split_title_year(content: &str) -> (String, Option<String>) {
    let Some((title, rest)) = content.split_once('(') else {
        return (content.trim().to_string(), None);
    };

    let token = rest.split(')').next().unwrap_or_default().trim();
    let year = (token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()))
        .then(|| token.to_string());

    (title.trim().to_string(), year)
}
