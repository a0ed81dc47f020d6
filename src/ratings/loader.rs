// Ratings CSV loader
// Columns: Title (or Name), Year, AR, BR, JR, Rating, Rating Notes

use std::io::Read;
use std::path::Path;

use crate::error::PipelineError;
use crate::models::RatingEntry;

const EXPECTED_COLUMNS: [&str; 5] = ["Year", "AR", "BR", "JR", "Rating"];

/// Column positions resolved from the header row
#[derive(Debug, Default)]
struct Columns {
    title: Option<usize>,
    year: Option<usize>,
    ar: Option<usize>,
    br: Option<usize>,
    jr: Option<usize>,
    rating: Option<usize>,
    notes: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let position = |name: &str| names.iter().position(|h| h == name);

        let columns = Self {
            title: position("Title").or_else(|| position("Name")),
            year: position("Year"),
            ar: position("AR"),
            br: position("BR"),
            jr: position("JR"),
            rating: position("Rating"),
            notes: position("Rating Notes"),
        };

        let mut missing: Vec<&str> = EXPECTED_COLUMNS
            .iter()
            .copied()
            .filter(|name| position(name).is_none())
            .collect();
        if columns.title.is_none() {
            missing.insert(0, "Title/Name");
        }
        if !missing.is_empty() {
            tracing::warn!("Ratings CSV is missing columns: {}", missing.join(", "));
            tracing::info!("Available columns: {}", names.join(", "));
        }

        columns
    }
}

pub fn load_ratings(path: &Path) -> Result<Vec<RatingEntry>, PipelineError> {
    let file = std::fs::File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let entries = read_ratings(file).map_err(|source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Loaded {} ratings from {}", entries.len(), path.display());
    Ok(entries)
}

/// Parse ratings rows; values are kept as written, cleanup happens at merge time
pub fn read_ratings<R: Read>(reader: R) -> Result<Vec<RatingEntry>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::from_headers(reader.headers()?);
    let mut entries = Vec::new();

    for row in reader.records() {
        let row = row?;
        let field = |index: Option<usize>| index.and_then(|i| row.get(i)).map(str::to_string);

        entries.push(RatingEntry {
            title: field(columns.title).unwrap_or_default(),
            year: field(columns.year).unwrap_or_default(),
            ar: field(columns.ar),
            br: field(columns.br),
            jr: field(columns.jr),
            rating: field(columns.rating),
            rating_notes: field(columns.notes),
        });
    }

    Ok(entries)
}
