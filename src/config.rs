//! Index configuration.
//!
//! Serializable settings for the index builders and for review-date
//! normalization, loadable from JSON (and TOML with the `toml` feature).

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoastIndexError};

/// How a "Month Year" review date is turned into a sortable number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateEncoding {
    /// Absolute `YYYYMM`, e.g. "June 2020" becomes `202006`.
    #[default]
    YearMonth,
    /// Months elapsed since an epoch month, e.g. "June 2020" with a January
    /// 2017 epoch becomes `41`. Dates before the epoch are negative.
    MonthsSince { year: i32, month: u32 },
}

impl DateEncoding {
    /// Encode a calendar month.
    pub fn encode(&self, year: i32, month: u32) -> i64 {
        match *self {
            DateEncoding::YearMonth => i64::from(year) * 100 + i64::from(month),
            DateEncoding::MonthsSince {
                year: epoch_year,
                month: epoch_month,
            } => {
                i64::from(year - epoch_year) * 12 + (i64::from(month) - i64::from(epoch_month))
            }
        }
    }
}

/// What to do with a review date that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateParsePolicy {
    /// Fail the load with `InvalidFormat` naming the offending value.
    #[default]
    Strict,
    /// Store `0` for the unparsable date and keep loading.
    ZeroOnError,
}

/// Settings shared by the index builders.
///
/// # Example
///
/// ```rust
/// use roastindex::IndexConfig;
///
/// let config = IndexConfig::default();
/// assert_eq!(config.rtree_max_entries, 5);
///
/// let json = r#"{ "octree_capacity": 8, "rtree_max_entries": 16 }"#;
/// let config = IndexConfig::from_json_str(json).unwrap();
/// assert_eq!(config.octree_capacity, 8);
/// assert_eq!(config.octree_max_depth, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Points an octree leaf holds before it subdivides.
    #[serde(default = "IndexConfig::default_octree_capacity")]
    pub octree_capacity: usize,

    /// Depth at which octree leaves stop subdividing and accept any number
    /// of points.
    #[serde(default = "IndexConfig::default_octree_max_depth")]
    pub octree_max_depth: usize,

    /// Entries an R-tree node holds before it splits.
    #[serde(default = "IndexConfig::default_rtree_max_entries")]
    pub rtree_max_entries: usize,

    /// Epoch year for [`DateEncoding::MonthsSince`] as used by the range tree.
    #[serde(default = "IndexConfig::default_date_epoch_year")]
    pub date_epoch_year: i32,

    /// Epoch month (1-12) for [`DateEncoding::MonthsSince`].
    #[serde(default = "IndexConfig::default_date_epoch_month")]
    pub date_epoch_month: u32,
}

impl IndexConfig {
    const fn default_octree_capacity() -> usize {
        4
    }

    const fn default_octree_max_depth() -> usize {
        16
    }

    const fn default_rtree_max_entries() -> usize {
        5
    }

    const fn default_date_epoch_year() -> i32 {
        2017
    }

    const fn default_date_epoch_month() -> u32 {
        1
    }

    pub fn with_octree_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Octree capacity must be greater than zero");
        self.octree_capacity = capacity;
        self
    }

    pub fn with_octree_max_depth(mut self, depth: usize) -> Self {
        self.octree_max_depth = depth;
        self
    }

    /// Set the R-tree node fan-out. A node needs room for two entries to
    /// split into two non-empty halves.
    pub fn with_rtree_max_entries(mut self, max_entries: usize) -> Self {
        assert!(max_entries >= 2, "R-tree nodes need at least two entries");
        self.rtree_max_entries = max_entries;
        self
    }

    pub fn with_date_epoch(mut self, year: i32, month: u32) -> Self {
        assert!((1..=12).contains(&month), "Epoch month must be between 1 and 12");
        self.date_epoch_year = year;
        self.date_epoch_month = month;
        self
    }

    /// The months-since-epoch encoding built from this configuration.
    pub fn months_since_epoch(&self) -> DateEncoding {
        DateEncoding::MonthsSince {
            year: self.date_epoch_year,
            month: self.date_epoch_month,
        }
    }

    /// Check the settings the index builders rely on.
    pub fn validate(&self) -> Result<()> {
        if self.octree_capacity == 0 {
            return Err(RoastIndexError::Validation(
                "Octree capacity must be greater than zero".to_string(),
            ));
        }
        if self.rtree_max_entries < 2 {
            return Err(RoastIndexError::Validation(format!(
                "R-tree nodes need at least two entries, got {}",
                self.rtree_max_entries
            )));
        }
        if !(1..=12).contains(&self.date_epoch_month) {
            return Err(RoastIndexError::Validation(format!(
                "Epoch month must be between 1 and 12, got {}",
                self.date_epoch_month
            )));
        }
        Ok(())
    }

    /// Load configuration from a JSON string; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string; missing fields take defaults.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: IndexConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            octree_capacity: Self::default_octree_capacity(),
            octree_max_depth: Self::default_octree_max_depth(),
            rtree_max_entries: Self::default_rtree_max_entries(),
            date_epoch_year: Self::default_date_epoch_year(),
            date_epoch_month: Self::default_date_epoch_month(),
        }
    }
}
