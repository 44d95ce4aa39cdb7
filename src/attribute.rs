//! The closed set of queryable attributes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoastIndexError};

/// Column holding the free-text review used by the similarity ranker.
pub const REVIEW_COLUMN: &str = "review";

/// An attribute a query may select or constrain.
///
/// Attribute names are resolved into this enum once, at the query boundary;
/// nothing downstream compares attribute strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Attribute {
    /// Price per 100 g in USD (`100g_USD`).
    Price,
    /// Review score (`rating`).
    Rating,
    /// Review date, normalized to a number by the record store (`review_date`).
    ReviewDate,
    /// Roasting company (`roaster`).
    Roaster,
    /// Roast level (`roast`).
    Roast,
    /// Country of the roaster (`loc_country`).
    Country,
    /// Bean origin region (`origin`).
    Origin,
}

impl Attribute {
    /// Every attribute, numeric ones first.
    pub const ALL: [Attribute; 7] = [
        Attribute::Price,
        Attribute::Rating,
        Attribute::ReviewDate,
        Attribute::Roaster,
        Attribute::Roast,
        Attribute::Country,
        Attribute::Origin,
    ];

    /// The three numeric attributes an index can be built over.
    pub const NUMERIC: [Attribute; 3] = [Attribute::Price, Attribute::Rating, Attribute::ReviewDate];

    /// Column name in the record store.
    pub fn column(&self) -> &'static str {
        match self {
            Attribute::Price => "100g_USD",
            Attribute::Rating => "rating",
            Attribute::ReviewDate => "review_date",
            Attribute::Roaster => "roaster",
            Attribute::Roast => "roast",
            Attribute::Country => "loc_country",
            Attribute::Origin => "origin",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Attribute::Price | Attribute::Rating | Attribute::ReviewDate
        )
    }

    pub fn is_categorical(&self) -> bool {
        !self.is_numeric()
    }
}

impl FromStr for Attribute {
    type Err = RoastIndexError;

    fn from_str(name: &str) -> Result<Self> {
        Attribute::ALL
            .into_iter()
            .find(|attr| attr.column() == name.trim())
            .ok_or_else(|| RoastIndexError::InvalidAttribute(name.to_string()))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}
