//! Species records and the tabular dataset loader.
//!
//! Records are loaded once from a CSV file and never mutated afterwards.
//! Numeric columns arrive as text and are coerced here; taxa are normalised
//! to one canonical spelling so filters and aggregates agree on identity.

use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::{classify, Category};

/// Columns that must be present in the header row.
const REQUIRED_COLUMNS: [&str; 5] = [
    "taxon",
    "risk_score",
    "temp_sensitivity",
    "habitat_loss_sens",
    "co2_sens",
];

/// One species as loaded from the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesRecord {
    /// Common or scientific name, when the source provides one.
    pub species: Option<String>,
    /// Canonical taxon identifier (see [`canonical_taxon`]).
    pub taxon: String,
    /// Baseline risk score before any climate adjustment.
    pub risk_score: f64,
    pub temp_sensitivity: f64,
    pub habitat_loss_sens: f64,
    pub co2_sens: f64,
    /// Category recorded in the source data.
    pub category: Category,
}

impl SpeciesRecord {
    /// Build a record from a baseline score and sensitivities.
    /// The baseline category is derived from the score.
    pub fn new(
        taxon: &str,
        risk_score: f64,
        temp_sensitivity: f64,
        habitat_loss_sens: f64,
        co2_sens: f64,
    ) -> Self {
        Self {
            species: None,
            taxon: canonical_taxon(taxon),
            risk_score,
            temp_sensitivity,
            habitat_loss_sens,
            co2_sens,
            category: classify(risk_score),
        }
    }
}

/// Normalise a taxon label: trim, collapse internal whitespace, lower-case.
pub fn canonical_taxon(raw: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let whitespace =
        WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern should compile"));
    whitespace.replace_all(raw.trim(), " ").to_lowercase()
}

/// Distinct taxa present in a dataset, in sorted order.
pub fn distinct_taxa(records: &[SpeciesRecord]) -> BTreeSet<String> {
    records.iter().map(|r| r.taxon.clone()).collect()
}

/// Errors raised while loading the species dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open species data {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("species data is missing required column {0:?}")]
    MissingColumn(&'static str),

    #[error("malformed species data: {0}")]
    Csv(#[from] csv::Error),
}

/// A row exactly as it appears in the file, before coercion.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    species: Option<String>,
    taxon: String,
    risk_score: String,
    temp_sensitivity: String,
    #[serde(alias = "habitat_loss_sensitivity")]
    habitat_loss_sens: String,
    #[serde(alias = "co2_sensitivity")]
    co2_sens: String,
    #[serde(default)]
    category: Option<String>,
}

fn coerce(column: &str, value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("{} is not a number: {:?}", column, value))?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(format!("{} is not finite: {:?}", column, value))
    }
}

impl RawRow {
    fn into_record(self) -> Result<SpeciesRecord, String> {
        let risk_score = coerce("risk_score", &self.risk_score)?;
        let temp_sensitivity = coerce("temp_sensitivity", &self.temp_sensitivity)?;
        let habitat_loss_sens = coerce("habitat_loss_sens", &self.habitat_loss_sens)?;
        let co2_sens = coerce("co2_sens", &self.co2_sens)?;

        let taxon = canonical_taxon(&self.taxon);
        if taxon.is_empty() {
            return Err("taxon is empty".to_string());
        }

        let category = match self.category.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => match label.parse::<Category>() {
                Ok(category) => category,
                Err(e) => {
                    log::warn!("{}; using category derived from risk_score", e);
                    classify(risk_score)
                }
            },
            _ => classify(risk_score),
        };

        Ok(SpeciesRecord {
            species: self.species.filter(|s| !s.trim().is_empty()),
            taxon,
            risk_score,
            temp_sensitivity,
            habitat_loss_sens,
            co2_sens,
            category,
        })
    }
}

/// Read species records from CSV text with a header row.
///
/// Rows whose numeric columns cannot be coerced are skipped with a warning.
pub fn read_species<R: io::Read>(reader: R) -> Result<Vec<SpeciesRecord>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        let present = headers.iter().any(|h| {
            h == column
                || (column == "habitat_loss_sens" && h == "habitat_loss_sensitivity")
                || (column == "co2_sens" && h == "co2_sensitivity")
        });
        if !present {
            return Err(LoadError::MissingColumn(column));
        }
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (index, row) in csv_reader.deserialize::<RawRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let outcome = row
            .map_err(|e| e.to_string())
            .and_then(RawRow::into_record);
        match outcome {
            Ok(record) => records.push(record),
            Err(reason) => {
                skipped += 1;
                log::warn!("Skipping species row at line {}: {}", line, reason);
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} malformed species rows", skipped);
    }
    log::info!(
        "Loaded {} species across {} taxa",
        records.len(),
        distinct_taxa(&records).len()
    );
    Ok(records)
}

/// Load species records from a CSV file.
pub fn load_species(path: &Path) -> Result<Vec<SpeciesRecord>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_species(io::BufReader::new(file))
}

/// Load species records, falling back to an empty dataset on failure.
///
/// The story keeps running on an empty dataset; every aggregate is then zero.
pub fn load_species_or_empty(path: &Path) -> Vec<SpeciesRecord> {
    match load_species(path) {
        Ok(records) => records,
        Err(e) => {
            log::error!("Error loading species data: {}", e);
            Vec::new()
        }
    }
}
