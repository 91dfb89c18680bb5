//! Scoring pass and reduction into view-model summaries.
//!
//! Aggregates carry counts only. Scored records are rebuilt on every pass
//! and borrowed from the dataset, never cached between ticks.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::category::{classify, Category};
use crate::risk::{score, ClimateParameters};
use crate::species::SpeciesRecord;

/// Which summary a scene asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
    /// Counts per category for each taxon.
    #[default]
    CategoryByTaxon,
    /// Counts of species in the worst category for each taxon.
    WorstByTaxon,
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" | "categorybytaxon" => Ok(ViewKind::CategoryByTaxon),
            "worst" | "worstbytaxon" | "extinct" => Ok(ViewKind::WorstByTaxon),
            other => Err(format!("unknown view kind: {}", other)),
        }
    }
}

/// A record with its climate-adjusted score and category.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSpecies<'a> {
    pub record: &'a SpeciesRecord,
    pub score: f64,
    pub category: Category,
}

/// Score and classify every record.
pub fn score_all<'a, I>(records: I, params: &ClimateParameters) -> Vec<ScoredSpecies<'a>>
where
    I: IntoIterator<Item = &'a SpeciesRecord>,
{
    records
        .into_iter()
        .map(|record| {
            let score = score(record, params);
            ScoredSpecies {
                record,
                score,
                category: classify(score),
            }
        })
        .collect()
}

/// Per-category counts, always holding all six categories.
pub type CategoryCounts = BTreeMap<Category, usize>;

fn empty_counts() -> CategoryCounts {
    Category::ALL.iter().map(|c| (*c, 0)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonCategoryCounts {
    pub taxon: String,
    pub counts: CategoryCounts,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonCount {
    pub taxon: String,
    pub count: usize,
}

/// Summary handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AggregateView {
    #[serde(rename_all = "camelCase")]
    CategoryByTaxon {
        taxa: Vec<TaxonCategoryCounts>,
        totals: CategoryCounts,
        species: usize,
    },
    #[serde(rename_all = "camelCase")]
    WorstByTaxon {
        category: Category,
        taxa: Vec<TaxonCount>,
        total: usize,
    },
}

impl AggregateView {
    pub fn kind(&self) -> ViewKind {
        match self {
            AggregateView::CategoryByTaxon { .. } => ViewKind::CategoryByTaxon,
            AggregateView::WorstByTaxon { .. } => ViewKind::WorstByTaxon,
        }
    }

    /// Number of species counted by this view.
    pub fn counted(&self) -> usize {
        match self {
            AggregateView::CategoryByTaxon { species, .. } => *species,
            AggregateView::WorstByTaxon { total, .. } => *total,
        }
    }
}

/// Score `records` under `params` and reduce them to the requested view.
///
/// Every taxon in `taxa` appears in the result, with zero counts if no record
/// belongs to it. Taxa are listed in sorted order.
pub fn recompute<'a, I>(
    records: I,
    taxa: &BTreeSet<String>,
    params: &ClimateParameters,
    kind: ViewKind,
) -> AggregateView
where
    I: IntoIterator<Item = &'a SpeciesRecord>,
{
    let scored = score_all(records, params);

    match kind {
        ViewKind::CategoryByTaxon => {
            let mut by_taxon: BTreeMap<&str, CategoryCounts> =
                taxa.iter().map(|t| (t.as_str(), empty_counts())).collect();
            let mut totals = empty_counts();

            for s in &scored {
                let counts = by_taxon
                    .entry(s.record.taxon.as_str())
                    .or_insert_with(empty_counts);
                *counts.entry(s.category).or_insert(0) += 1;
                *totals.entry(s.category).or_insert(0) += 1;
            }

            let taxa = by_taxon
                .into_iter()
                .map(|(taxon, counts)| TaxonCategoryCounts {
                    taxon: taxon.to_string(),
                    total: counts.values().sum(),
                    counts,
                })
                .collect();

            AggregateView::CategoryByTaxon {
                taxa,
                totals,
                species: scored.len(),
            }
        }
        ViewKind::WorstByTaxon => {
            let mut by_taxon: BTreeMap<&str, usize> =
                taxa.iter().map(|t| (t.as_str(), 0)).collect();

            for s in scored.iter().filter(|s| s.category == Category::WORST) {
                *by_taxon.entry(s.record.taxon.as_str()).or_insert(0) += 1;
            }

            let total: usize = by_taxon.values().sum();
            AggregateView::WorstByTaxon {
                category: Category::WORST,
                taxa: by_taxon
                    .into_iter()
                    .map(|(taxon, count)| TaxonCount {
                        taxon: taxon.to_string(),
                        count,
                    })
                    .collect(),
                total,
            }
        }
    }
}
