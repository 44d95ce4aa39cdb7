//! Query builder for string-keyed requests
//!
//! Attribute names arrive as strings from whatever front end drives the
//! engine. The builder resolves each one into an [`Attribute`] as it is
//! added, and reports the first failure from [`QueryBuilder::build`].

use crate::attribute::Attribute;
use crate::error::{Result, RoastIndexError};
use crate::query::{CategoricalCondition, Condition, ConditionSet, NumericCondition, QueryRequest};

/// Builder for a [`QueryRequest`].
///
/// # Example
///
/// ```rust
/// use roastindex::QueryBuilder;
///
/// let request = QueryBuilder::new()
///     .select("100g_USD")
///     .select("rating")
///     .range("100g_USD", Some(15.0), Some(25.0))
///     .comparisons("rating", [">= 80"])
///     .categorical("roast", "Light, Medium")
///     .build()?;
///
/// assert_eq!(request.selected.len(), 2);
/// assert_eq!(request.conditions.len(), 3);
/// # Ok::<(), roastindex::RoastIndexError>(())
/// ```
#[derive(Debug, Default)]
pub struct QueryBuilder {
    selected: Vec<Attribute>,
    conditions: ConditionSet,
    keywords: Option<String>,
    num_neighbors: Option<usize>,
    error: Option<RoastIndexError>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to the output columns, in call order.
    pub fn select(mut self, name: &str) -> Self {
        if let Some(attr) = self.resolve(name) {
            self.selected.push(attr);
        }
        self
    }

    /// Inclusive numeric range; `None` leaves that side unbounded.
    pub fn range(self, name: &str, min: Option<f64>, max: Option<f64>) -> Self {
        self.condition(name, NumericCondition::range(min, max))
    }

    /// Comparison tokens such as `">= 80"` or `"< 4.5"`, all of which must hold.
    pub fn comparisons<I, S>(mut self, name: &str, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match NumericCondition::parse_tokens(tokens) {
            Ok(condition) => self.condition(name, condition),
            Err(e) => {
                self.fail(e);
                self
            }
        }
    }

    /// Accepted values as one comma-delimited string.
    pub fn categorical(self, name: &str, values: &str) -> Self {
        self.condition(name, CategoricalCondition::parse(values))
    }

    /// Accepted values as a list.
    pub fn categorical_values<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.condition(name, CategoricalCondition::from_values(values))
    }

    /// Rank the result by review similarity and keep `num_neighbors` rows.
    pub fn keywords(mut self, keywords: impl Into<String>, num_neighbors: usize) -> Self {
        self.keywords = Some(keywords.into());
        self.num_neighbors = Some(num_neighbors);
        self
    }

    /// Finish the request, returning the first error met while building.
    ///
    /// The request is validated before it is returned.
    pub fn build(self) -> Result<QueryRequest> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let request = QueryRequest {
            selected: self.selected,
            conditions: self.conditions,
            keywords: self.keywords,
            num_neighbors: self.num_neighbors,
        };
        request.validate()?;
        Ok(request)
    }

    fn condition(mut self, name: &str, condition: impl Into<Condition>) -> Self {
        if let Some(attr) = self.resolve(name) {
            self.conditions.insert(attr, condition);
        }
        self
    }

    fn resolve(&mut self, name: &str) -> Option<Attribute> {
        match name.parse::<Attribute>() {
            Ok(attr) => Some(attr),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn fail(&mut self, error: RoastIndexError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}
