//! Query coordinator.
//!
//! One synchronous pipeline per query: validate the request, project the
//! store onto the indexed axes, build the chosen index, run the range query
//! with the categorical filter, then optionally re-rank by review similarity.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::attribute::{Attribute, REVIEW_COLUMN};
use crate::config::IndexConfig;
use crate::error::Result;
use crate::filter::CategoricalFilter;
use crate::index::{AxisConditions, IndexKind, IndexedPoint};
use crate::query::QueryRequest;
use crate::similarity::SimilarityRanker;
use crate::store::{RecordStore, RowId, Value};

/// One output row: every field of the stored row, plus the distance when
/// ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub row_id: RowId,
    pub values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distance: Option<f64>,
}

impl ResultRow {
    /// The row's fields, with the distance appended when present.
    pub fn into_values(self) -> Vec<Value> {
        let mut values = self.values;
        values.extend(self.distance.map(Value::Number));
        values
    }
}

/// Rows returned by [`QueryEngine::execute`], in output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub index: IndexKind,
    /// Column names of the store, in the order of each row's values.
    pub columns: Vec<String>,
    /// Attributes the request selected.
    pub selected: Vec<Attribute>,
    pub rows: Vec<ResultRow>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_ids(&self) -> Vec<RowId> {
        self.rows.iter().map(|r| r.row_id).collect()
    }

    /// True when rows carry a similarity distance.
    pub fn is_ranked(&self) -> bool {
        self.rows.first().is_some_and(|r| r.distance.is_some())
    }
}

/// Runs queries against a record store.
///
/// # Example
///
/// ```rust
/// use roastindex::{IndexKind, QueryBuilder, QueryEngine, RecordStore, Row, Value};
///
/// let rows = vec![
///     Row::new(vec![Value::from(10.0), Value::from(90.0), Value::from(202001.0)]),
///     Row::new(vec![Value::from(20.0), Value::from(85.0), Value::from(202006.0)]),
///     Row::new(vec![Value::from(30.0), Value::from(95.0), Value::from(202012.0)]),
/// ];
/// let store = RecordStore::new(["100g_USD", "rating", "review_date"], rows)?;
///
/// let request = QueryBuilder::new()
///     .select("100g_USD")
///     .select("rating")
///     .select("review_date")
///     .range("100g_USD", Some(15.0), Some(25.0))
///     .range("rating", Some(80.0), Some(100.0))
///     .build()?;
///
/// let result = QueryEngine::default().execute(&store, IndexKind::KdTree, &request)?;
/// assert_eq!(result.row_ids(), vec![1]);
/// # Ok::<(), roastindex::RoastIndexError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    config: IndexConfig,
}

impl QueryEngine {
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Execute `request` against `store` using an index of kind `kind`.
    ///
    /// Every returned row carries all of the store's columns. Without
    /// keywords the rows come back in ascending row order. With keywords
    /// they come back nearest first, at most `num_neighbors` of them; a
    /// keyword string with no words returns no rows.
    pub fn execute(
        &self,
        store: &RecordStore,
        kind: IndexKind,
        request: &QueryRequest,
    ) -> Result<QueryResult> {
        if let Err(e) = self.config.validate().and_then(|_| request.validate()) {
            log::warn!("Rejected query: {}", e);
            return Err(e);
        }

        for &attr in &request.selected {
            store.attribute_index(attr)?;
        }
        let filter = CategoricalFilter::new(&request.conditions, store)?;

        let mut candidates = self.candidates(store, kind, request, &filter)?;
        candidates.sort_unstable();
        log::trace!("{} query matched {} rows", kind, candidates.len());

        let ranked: Vec<(RowId, Option<f64>)> = match request.keyword_list() {
            Some(keywords) => {
                if keywords.is_empty() {
                    log::debug!("Keyword query has no words, returning no rows");
                }
                let k = request.num_neighbors.unwrap_or(0);
                rank(store, &candidates, &keywords, k)?
            }
            None => candidates.into_iter().map(|id| (id, None)).collect(),
        };

        let rows = ranked
            .into_iter()
            .filter_map(|(row_id, distance)| {
                let row = store.row(row_id)?;
                Some(ResultRow {
                    row_id,
                    values: row.values().to_vec(),
                    distance,
                })
            })
            .collect();

        Ok(QueryResult {
            index: kind,
            columns: store.columns().to_vec(),
            selected: request.selected.clone(),
            rows,
        })
    }

    /// Rows passing the numeric and categorical conditions, in any order.
    fn candidates(
        &self,
        store: &RecordStore,
        kind: IndexKind,
        request: &QueryRequest,
        filter: &CategoricalFilter,
    ) -> Result<Vec<RowId>> {
        let axes = indexed_axes(request);
        let accept = |id: RowId| filter.matches_id(store, id);

        if axes.is_empty() {
            log::debug!("No numeric axis to index, scanning {} rows", store.len());
            return Ok((0..store.len()).filter(|&id| accept(id)).collect());
        }

        let columns = axes
            .iter()
            .map(|&attr| store.attribute_index(attr))
            .collect::<Result<Vec<_>>>()?;
        let points: Vec<IndexedPoint> = store
            .project(&columns)?
            .into_iter()
            .map(IndexedPoint::from)
            .collect();

        let mut conditions = AxisConditions::new(axes.len());
        for (axis, &attr) in axes.iter().enumerate() {
            if let Some(numeric) = request.conditions.numeric().find(|(a, _)| *a == attr) {
                for comparison in numeric.1.comparisons() {
                    conditions.push(axis, comparison);
                }
            }
        }

        let index = kind.build(points, axes.len(), &self.config);
        log::debug!("Built {} over {} points on {} axes", kind, index.len(), axes.len());
        Ok(index.query_conditions(&conditions, &accept))
    }
}

/// Numeric attributes to index: selected ones in order, then conditioned ones.
fn indexed_axes(request: &QueryRequest) -> SmallVec<[Attribute; 3]> {
    let mut axes: SmallVec<[Attribute; 3]> = SmallVec::new();
    let conditioned = request.conditions.numeric().map(|(attr, _)| attr);
    for attr in request.selected.iter().copied().chain(conditioned) {
        if attr.is_numeric() && !axes.contains(&attr) {
            axes.push(attr);
        }
    }
    axes
}

fn rank(
    store: &RecordStore,
    candidates: &[RowId],
    keywords: &[&str],
    k: usize,
) -> Result<Vec<(RowId, Option<f64>)>> {
    let review = store.column_index(REVIEW_COLUMN)?;
    let texts: Vec<String> = candidates
        .iter()
        .map(|&id| {
            store
                .row(id)
                .and_then(|row| row.get(review))
                .map(|value| value.as_text().map_or_else(|| value.to_string(), str::to_string))
                .unwrap_or_default()
        })
        .collect();

    Ok(SimilarityRanker::new(&texts)
        .nearest(keywords, k)
        .into_iter()
        .map(|n| (candidates[n.position], Some(n.distance)))
        .collect())
}
