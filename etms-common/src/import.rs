//! CSV bulk import of tree records
//!
//! Each row is converted to a [`TreeInput`] and sent through the same
//! creation path as manual entry. A bad row is reported and skipped; the
//! remaining rows are still imported.

use crate::db::models::TreeInput;
use crate::db::trees::create_tree;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "common_name",
    "scientific_name",
    "family",
    "genus",
    "population",
    "latitude",
    "longitude",
    "year",
];

/// One CSV line as read
#[derive(Debug, Clone, Deserialize)]
pub struct CsvTreeRow {
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    pub genus: String,
    pub population: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub year: i32,
    #[serde(default)]
    pub healthy_count: Option<u32>,
    #[serde(default)]
    pub good_count: Option<u32>,
    #[serde(default)]
    pub bad_count: Option<u32>,
    #[serde(default)]
    pub deceased_count: Option<u32>,
    #[serde(default)]
    pub hectares: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CsvTreeRow {
    /// Rows without any count column count the whole population as `good`
    pub fn into_tree_input(self) -> TreeInput {
        let counts = [self.healthy_count, self.good_count, self.bad_count, self.deceased_count];
        let (healthy, good, bad, deceased) = if counts.iter().all(Option::is_none) {
            (0, self.population, 0, 0)
        } else {
            (
                self.healthy_count.unwrap_or(0),
                self.good_count.unwrap_or(0),
                self.bad_count.unwrap_or(0),
                self.deceased_count.unwrap_or(0),
            )
        };

        TreeInput {
            common_name: self.common_name,
            scientific_name: self.scientific_name,
            family: self.family,
            genus: self.genus,
            latitude: self.latitude,
            longitude: self.longitude,
            location_name: None,
            population: self.population,
            year: self.year,
            healthy_count: healthy,
            good_count: good,
            bad_count: bad,
            deceased_count: deceased,
            hectares: self.hectares.unwrap_or(0.0),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        }
    }
}

/// A rejected row; `row` is the spreadsheet line number (header is line 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    pub tree_ids: Vec<Uuid>,
}

/// Parsed file: rows that deserialized, plus rows that did not
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub rows: Vec<(usize, CsvTreeRow)>,
    pub errors: Vec<RowError>,
}

/// Parse CSV bytes; a missing required column rejects the whole file
pub fn parse_tree_csv(data: &[u8]) -> Result<ParsedCsv> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut parsed = ParsedCsv::default();
    // Blank lines and quoted newlines make record order differ from line order
    let mut last_line = 1;
    for record in reader.records() {
        let position = match &record {
            Ok(r) => r.position(),
            Err(e) => e.position(),
        };
        let row = position.map_or(last_line + 1, |p| p.line() as usize);
        last_line = row;

        match record.and_then(|r| r.deserialize::<CsvTreeRow>(Some(&headers))) {
            Ok(r) => parsed.rows.push((row, r)),
            Err(e) => parsed.errors.push(RowError { row, error: e.to_string() }),
        }
    }

    Ok(parsed)
}

/// Import every row of a CSV file for `owner`
pub async fn import_trees_csv(pool: &SqlitePool, data: &[u8], owner: Uuid) -> Result<ImportReport> {
    let parsed = parse_tree_csv(data)?;
    let mut report = ImportReport { errors: parsed.errors, ..Default::default() };

    for (row, record) in parsed.rows {
        let input = record.into_tree_input();
        match create_tree(pool, &input, owner).await {
            Ok(id) => {
                report.imported += 1;
                report.tree_ids.push(id);
            }
            // Database failures abort the import; row problems do not
            Err(Error::Database(e)) => return Err(Error::Database(e)),
            Err(e) => report.errors.push(RowError { row, error: e.to_string() }),
        }
    }

    report.errors.sort_by_key(|e| e.row);
    report.failed = report.errors.len();

    if report.failed > 0 {
        warn!(imported = report.imported, failed = report.failed, "CSV import finished with errors");
    } else {
        info!(imported = report.imported, "CSV import finished");
    }

    Ok(report)
}
