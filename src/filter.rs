//! Taxon filter state driven by checkbox input.

use std::collections::BTreeSet;

use crate::species::{canonical_taxon, distinct_taxa, SpeciesRecord};

/// The set of taxa currently included in aggregation.
///
/// Known taxa are fixed when the filter is built from a dataset, so the
/// included set can never name a taxon the dataset does not contain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    known: BTreeSet<String>,
    included: BTreeSet<String>,
}

impl FilterState {
    /// Build a filter that includes every taxon present in `records`.
    pub fn from_records(records: &[SpeciesRecord]) -> Self {
        let known = distinct_taxa(records);
        Self {
            included: known.clone(),
            known,
        }
    }

    /// Include or exclude a taxon. Unknown taxa are ignored.
    ///
    /// Returns whether the included set changed.
    pub fn toggle(&mut self, taxon: &str, included: bool) -> bool {
        let taxon = canonical_taxon(taxon);
        if !self.known.contains(&taxon) {
            log::debug!("Ignoring toggle for unknown taxon {:?}", taxon);
            return false;
        }
        if included {
            self.included.insert(taxon)
        } else {
            self.included.remove(&taxon)
        }
    }

    pub fn is_included(&self, taxon: &str) -> bool {
        self.included.contains(&canonical_taxon(taxon))
    }

    /// Include every known taxon again.
    pub fn include_all(&mut self) {
        self.included = self.known.clone();
    }

    pub fn known_taxa(&self) -> &BTreeSet<String> {
        &self.known
    }

    pub fn included_taxa(&self) -> &BTreeSet<String> {
        &self.included
    }

    /// Records whose taxon is currently included, in dataset order.
    pub fn apply<'a>(&self, records: &'a [SpeciesRecord]) -> Vec<&'a SpeciesRecord> {
        records
            .iter()
            .filter(|r| self.included.contains(&r.taxon))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Vec<SpeciesRecord> {
        vec![
            SpeciesRecord::new("Aves", 0.5, 1.0, 0.0, 0.0),
            SpeciesRecord::new("Amphibia", 1.5, 0.5, 0.0, 0.0),
            SpeciesRecord::new("aves", 2.5, 0.1, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_default_includes_everything() {
        let records = dataset();
        let filter = FilterState::from_records(&records);
        assert_eq!(filter.apply(&records).len(), records.len());
        assert_eq!(filter.known_taxa().len(), 2);
    }

    #[test]
    fn test_removing_a_taxon_never_increases_count() {
        let records = dataset();
        let mut filter = FilterState::from_records(&records);
        let full = filter.apply(&records).len();

        assert!(filter.toggle("AVES", false));
        let reduced = filter.apply(&records).len();
        assert!(reduced < full);
        assert_eq!(reduced, 1);
        assert!(!filter.is_included("aves"));
        assert!(filter.is_included("amphibia"));

        // Already excluded: no change.
        assert!(!filter.toggle("aves", false));
    }

    #[test]
    fn test_unknown_taxon_is_ignored() {
        let records = dataset();
        let mut filter = FilterState::from_records(&records);
        assert!(!filter.toggle("reptilia", true));
        assert!(!filter.is_included("reptilia"));
        assert_eq!(filter.included_taxa().len(), 2);
    }

    #[test]
    fn test_apply_does_not_touch_dataset() {
        let records = dataset();
        let snapshot = records.clone();
        let mut filter = FilterState::from_records(&records);
        filter.toggle("amphibia", false);
        let _ = filter.apply(&records);
        assert_eq!(records, snapshot);
    }

    #[test]
    fn test_include_all_restores() {
        let records = dataset();
        let mut filter = FilterState::from_records(&records);
        filter.toggle("amphibia", false);
        filter.toggle("aves", false);
        assert!(filter.apply(&records).is_empty());
        filter.include_all();
        assert_eq!(filter.apply(&records).len(), 3);
    }

    #[test]
    fn test_empty_dataset() {
        let filter = FilterState::from_records(&[]);
        assert!(filter.known_taxa().is_empty());
        assert!(filter.apply(&[]).is_empty());
    }
}
