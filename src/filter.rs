//! Categorical predicate applied to range-query candidates.

use crate::attribute::Attribute;
use crate::error::Result;
use crate::query::{CategoricalCondition, ConditionSet};
use crate::store::{RecordStore, Row, RowId};

/// Conjunction of categorical conditions, resolved against one store.
///
/// A row passes when, for every constrained attribute, its trimmed and
/// lower-cased field equals one of the accepted values. Partial matches do
/// not count: `"light"` does not accept `"Light Roast"`.
#[derive(Debug, Clone, Default)]
pub struct CategoricalFilter {
    predicates: Vec<(Attribute, usize, CategoricalCondition)>,
}

impl CategoricalFilter {
    /// Resolve every categorical condition in `conditions` to a column of `store`.
    pub fn new(conditions: &ConditionSet, store: &RecordStore) -> Result<Self> {
        let predicates = conditions
            .categorical()
            .map(|(attr, cond)| Ok((attr, store.attribute_index(attr)?, cond.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { predicates })
    }

    /// True when no categorical condition applies.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|(_, column, cond)| {
            row.get(*column)
                .is_some_and(|value| cond.accepts(&value.normalized()))
        })
    }

    /// Check a row by id. Unknown ids never match.
    pub fn matches_id(&self, store: &RecordStore, id: RowId) -> bool {
        store.row(id).is_some_and(|row| self.matches(row))
    }

    /// Keep the candidates that pass, preserving their order.
    pub fn apply(&self, store: &RecordStore, candidates: Vec<RowId>) -> Vec<RowId> {
        if self.is_empty() {
            return candidates;
        }
        candidates
            .into_iter()
            .filter(|&id| self.matches_id(store, id))
            .collect()
    }
}
