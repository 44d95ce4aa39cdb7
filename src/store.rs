//! The record store: an immutable snapshot of review rows.
//!
//! Loading from disk is a thin JSON front end; the indexes only consume the
//! store through [`RecordStore::project`] and row lookups by [`RowId`].

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use parking_lot::RwLock;
use roastindex_types::point::{Coords, Point};
use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::config::{DateEncoding, DateParsePolicy, IndexConfig};
use crate::error::{Result, RoastIndexError};
use crate::index::IndexKind;

/// Position of a row in its record store.
pub type RowId = usize;

/// Column layout of the coffee review dataset.
pub const COFFEE_COLUMNS: [&str; 9] = [
    "name",
    "roaster",
    "roast",
    "loc_country",
    "origin",
    "100g_USD",
    "rating",
    "review_date",
    "review",
];

/// A single field of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    /// Trimmed, lower-cased rendering used for categorical comparison.
    pub fn normalized(&self) -> String {
        self.to_string().trim().to_lowercase()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// One dataset entry: a fixed-arity tuple of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

/// How the `review_date` column is normalized while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    pub date_encoding: DateEncoding,
    pub date_policy: DateParsePolicy,
}

impl LoadOptions {
    /// The date convention an index variant expects.
    ///
    /// The range tree works on months since the configured epoch and maps
    /// unparsable dates to zero; the other variants use strict `YYYYMM`.
    pub fn for_index(kind: IndexKind, config: &IndexConfig) -> Self {
        match kind {
            IndexKind::RangeTree => Self {
                date_encoding: config.months_since_epoch(),
                date_policy: DateParsePolicy::ZeroOnError,
            },
            IndexKind::KdTree | IndexKind::Octree | IndexKind::RTree => Self::default(),
        }
    }
}

/// Parse a "Month Year" date such as "June 2020" and encode it.
pub fn parse_review_date(text: &str, encoding: DateEncoding, policy: DateParsePolicy) -> Result<i64> {
    match NaiveDate::parse_from_str(&format!("1 {}", text.trim()), "%d %B %Y") {
        Ok(date) => Ok(encoding.encode(date.year(), date.month())),
        Err(_) if policy == DateParsePolicy::ZeroOnError => {
            log::debug!("Storing 0 for unparsable review date {:?}", text);
            Ok(0)
        }
        Err(e) => Err(RoastIndexError::InvalidFormat(format!(
            "Invalid date format: {:?} ({})",
            text, e
        ))),
    }
}

/// An immutable, ordered collection of rows sharing one column layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordStore {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RecordStore {
    /// Create a store, checking every row against the column count.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, rows: Vec<Row>) -> Result<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(RoastIndexError::InvalidFormat(format!(
                "Row {} has {} fields, expected {}",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Load a JSON array of objects keyed by [`COFFEE_COLUMNS`].
    ///
    /// Review dates given as "Month Year" strings are normalized with
    /// `options`; numeric dates are taken as already normalized.
    pub fn from_json_reader<R: Read>(reader: R, options: LoadOptions) -> Result<Self> {
        let records: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_reader(reader)?;
        Self::from_json_records(records, options)
    }

    /// Same as [`from_json_reader`](Self::from_json_reader) for an in-memory string.
    pub fn from_json_str(json: &str, options: LoadOptions) -> Result<Self> {
        let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(json)?;
        Self::from_json_records(records, options)
    }

    fn from_json_records(
        records: Vec<serde_json::Map<String, serde_json::Value>>,
        options: LoadOptions,
    ) -> Result<Self> {
        let mut rows = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            let mut values = Vec::with_capacity(COFFEE_COLUMNS.len());
            for column in COFFEE_COLUMNS {
                let field = record.get(column).ok_or_else(|| {
                    RoastIndexError::InvalidFormat(format!(
                        "Record {} is missing column {}",
                        idx, column
                    ))
                })?;
                values.push(json_field(column, field, options)?);
            }
            rows.push(Row::new(values));
        }
        log::debug!("Loaded {} records", rows.len());
        Self::new(COFFEE_COLUMNS, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a named column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| RoastIndexError::InvalidAttribute(name.to_string()))
    }

    /// Index of the column backing `attr`.
    pub fn attribute_index(&self, attr: Attribute) -> Result<usize> {
        self.column_index(attr.column())
    }

    /// Project every row onto the given numeric columns.
    ///
    /// Fails with `InvalidFormat` if a projected field is not a number.
    pub fn project(&self, columns: &[usize]) -> Result<Vec<(RowId, Point)>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(id, row)| {
                let coords = columns
                    .iter()
                    .map(|&col| {
                        row.get(col).and_then(Value::as_number).ok_or_else(|| {
                            RoastIndexError::InvalidFormat(format!(
                                "Row {} column {} is not numeric",
                                id, self.columns[col]
                            ))
                        })
                    })
                    .collect::<Result<Coords>>()?;
                let point = Point::from_coords(coords);
                if !point.is_finite() {
                    return Err(RoastIndexError::InvalidFormat(format!(
                        "Row {} has a non-finite value in an indexed column",
                        id
                    )));
                }
                Ok((id, point))
            })
            .collect()
    }
}

fn json_field(column: &str, field: &serde_json::Value, options: LoadOptions) -> Result<Value> {
    match field {
        serde_json::Value::Number(n) => n.as_f64().map(Value::Number).ok_or_else(|| {
            RoastIndexError::InvalidFormat(format!("Column {} holds {} which is not an f64", column, n))
        }),
        serde_json::Value::String(s) if column == Attribute::ReviewDate.column() => {
            let encoded = parse_review_date(s, options.date_encoding, options.date_policy)?;
            Ok(Value::Number(encoded as f64))
        }
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        other => Err(RoastIndexError::InvalidFormat(format!(
            "Column {} holds unsupported value {}",
            column, other
        ))),
    }
}

/// A lazily filled, shareable copy of the parsed record store.
///
/// Independent query pipelines read the snapshot concurrently; the loader
/// runs only when the cache is empty.
///
/// # Examples
///
/// ```rust
/// use roastindex::store::{RecordStore, SnapshotCache};
///
/// let cache = SnapshotCache::new();
/// let store = cache.get_or_load(|| RecordStore::new(["rating"], Vec::new()))?;
/// assert!(store.is_empty());
/// # Ok::<(), roastindex::RoastIndexError>(())
/// ```
#[derive(Debug, Default)]
pub struct SnapshotCache {
    inner: RwLock<Option<Arc<RecordStore>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached snapshot, if one has been loaded.
    pub fn get(&self) -> Option<Arc<RecordStore>> {
        self.inner.read().clone()
    }

    /// Return the cached snapshot or fill the cache with `load`.
    ///
    /// A failed load leaves the cache empty.
    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<RecordStore>>
    where
        F: FnOnce() -> Result<RecordStore>,
    {
        if let Some(store) = self.inner.read().as_ref() {
            return Ok(Arc::clone(store));
        }

        let mut guard = self.inner.write();
        // Another thread may have loaded while we waited for the write lock.
        if let Some(store) = guard.as_ref() {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(load()?);
        *guard = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Drop the cached snapshot so the next access reloads.
    pub fn invalidate(&self) {
        self.inner.write().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"name": "Ethiopia Guji", "roaster": "A Roaster", "roast": "Light",
         "loc_country": "United States", "origin": "Ethiopia", "100g_USD": 10.0,
         "rating": 90, "review_date": "January 2020", "review": "fruity and bright"},
        {"name": "House Blend", "roaster": "B Roaster", "roast": "Medium",
         "loc_country": "Taiwan", "origin": "Colombia", "100g_USD": 20.5,
         "rating": 85, "review_date": "June 2020", "review": "chocolate notes"}
    ]"#;

    #[test]
    fn test_parse_review_date() {
        let ym = parse_review_date("June 2020", DateEncoding::YearMonth, DateParsePolicy::Strict);
        assert_eq!(ym.unwrap(), 202006);

        let rel = parse_review_date(
            " December 2017 ",
            DateEncoding::MonthsSince {
                year: 2017,
                month: 1,
            },
            DateParsePolicy::Strict,
        );
        assert_eq!(rel.unwrap(), 11);
    }

    #[test]
    fn test_malformed_date_policies() {
        let err = parse_review_date("2020-06", DateEncoding::YearMonth, DateParsePolicy::Strict)
            .unwrap_err();
        match err {
            RoastIndexError::InvalidFormat(msg) => assert!(msg.contains("2020-06")),
            other => panic!("unexpected error: {other:?}"),
        }

        let zero =
            parse_review_date("someday", DateEncoding::YearMonth, DateParsePolicy::ZeroOnError);
        assert_eq!(zero.unwrap(), 0);
    }

    #[test]
    fn test_load_json() {
        let store = RecordStore::from_json_str(SAMPLE, LoadOptions::default()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.columns().len(), COFFEE_COLUMNS.len());

        let date_col = store.attribute_index(Attribute::ReviewDate).unwrap();
        assert_eq!(store.rows()[1].get(date_col), Some(&Value::Number(202006.0)));

        let roast_col = store.attribute_index(Attribute::Roast).unwrap();
        assert_eq!(store.rows()[0].get(roast_col).unwrap().normalized(), "light");
    }

    #[test]
    fn test_load_json_range_tree_convention() {
        let options = LoadOptions::for_index(IndexKind::RangeTree, &IndexConfig::default());
        let store = RecordStore::from_json_str(SAMPLE, options).unwrap();
        let date_col = store.attribute_index(Attribute::ReviewDate).unwrap();
        assert_eq!(store.rows()[0].get(date_col), Some(&Value::Number(36.0)));
    }

    #[test]
    fn test_load_json_rejects_bad_date() {
        let json = SAMPLE.replace("June 2020", "Juneuary 2020");
        let err = RecordStore::from_json_str(&json, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, RoastIndexError::InvalidFormat(_)));
    }

    #[test]
    fn test_project_rows() {
        let store = RecordStore::from_json_str(SAMPLE, LoadOptions::default()).unwrap();
        let cols = [
            store.attribute_index(Attribute::Price).unwrap(),
            store.attribute_index(Attribute::Rating).unwrap(),
        ];
        let points = store.project(&cols).unwrap();
        assert_eq!(points[1], (1, Point::new(&[20.5, 85.0])));

        let text_col = store.attribute_index(Attribute::Roaster).unwrap();
        assert!(matches!(
            store.project(&[text_col]),
            Err(RoastIndexError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_project_rejects_non_finite() {
        let rows = vec![
            Row::new(vec![Value::Number(1.0)]),
            Row::new(vec![Value::Number(f64::INFINITY)]),
        ];
        let store = RecordStore::new(["rating"], rows).unwrap();
        assert!(matches!(
            store.project(&[0]),
            Err(RoastIndexError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_row_arity_checked() {
        let rows = vec![Row::new(vec![Value::Number(1.0)])];
        assert!(RecordStore::new(["a", "b"], rows).is_err());
    }

    #[test]
    fn test_snapshot_cache_loads_once() {
        let cache = SnapshotCache::new();
        assert!(cache.get().is_none());

        let mut loads = 0;
        let first = cache
            .get_or_load(|| {
                loads += 1;
                RecordStore::from_json_str(SAMPLE, LoadOptions::default())
            })
            .unwrap();
        let second = cache
            .get_or_load(|| {
                loads += 1;
                RecordStore::from_json_str(SAMPLE, LoadOptions::default())
            })
            .unwrap();
        assert_eq!(loads, 1);
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
