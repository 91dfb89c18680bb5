//! IUCN-style risk categories and the score classifier.
//!
//! Six categories, totally ordered from least to most at-risk. Every float
//! maps to exactly one of them through half-open unit bins.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A discrete risk category, ordered from least to most at-risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Least Concern.
    LC,
    /// Near Threatened.
    NT,
    /// Vulnerable.
    VU,
    /// Endangered.
    EN,
    /// Critically Endangered.
    CR,
    /// Extinct.
    EX,
}

impl Category {
    /// All categories in ascending risk order.
    pub const ALL: [Category; 6] = [
        Category::LC,
        Category::NT,
        Category::VU,
        Category::EN,
        Category::CR,
        Category::EX,
    ];

    /// The number of categories.
    pub const COUNT: usize = 6;

    /// The most at-risk category.
    pub const WORST: Category = Category::EX;

    /// Position in ascending risk order (LC = 0, EX = 5).
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Two-letter code, as used in the dataset.
    pub fn code(self) -> &'static str {
        match self {
            Category::LC => "LC",
            Category::NT => "NT",
            Category::VU => "VU",
            Category::EN => "EN",
            Category::CR => "CR",
            Category::EX => "EX",
        }
    }

    /// Full IUCN label.
    pub fn full_name(self) -> &'static str {
        match self {
            Category::LC => "Least Concern",
            Category::NT => "Near Threatened",
            Category::VU => "Vulnerable",
            Category::EN => "Endangered",
            Category::CR => "Critically Endangered",
            Category::EX => "Extinct",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when a category label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown risk category label: {0:?}")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    /// Accepts the two-letter code or the full name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| {
                c.code().eq_ignore_ascii_case(trimmed) || c.full_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Map a continuous risk score to its category.
///
/// Bins are `[-inf,1)`, `[1,2)`, `[2,3)`, `[3,4)`, `[4,5)`, `[5,inf)`.
/// NaN falls into LC so the function stays total.
pub fn classify(score: f64) -> Category {
    if score >= 5.0 {
        Category::EX
    } else if score >= 4.0 {
        Category::CR
    } else if score >= 3.0 {
        Category::EN
    } else if score >= 2.0 {
        Category::VU
    } else if score >= 1.0 {
        Category::NT
    } else {
        Category::LC
    }
}
