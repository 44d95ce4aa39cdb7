//! Query conditions and the validated query request.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::error::{Result, RoastIndexError};

/// Most attributes a single query may select.
pub const MAX_SELECTED: usize = 4;

/// A comparison operator in a condition token such as `">= 80"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One parsed comparison token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub op: CompareOp,
    pub value: f64,
}

impl Comparison {
    pub fn new(op: CompareOp, value: f64) -> Self {
        Self { op, value }
    }

    /// Check whether a single value satisfies the comparison.
    pub fn matches(&self, v: f64) -> bool {
        match self.op {
            CompareOp::Ge => v >= self.value,
            CompareOp::Le => v <= self.value,
            CompareOp::Gt => v > self.value,
            CompareOp::Lt => v < self.value,
        }
    }

    /// Check whether some value in `[min, max]` could satisfy the comparison.
    pub fn admits_extent(&self, min: f64, max: f64) -> bool {
        match self.op {
            CompareOp::Ge => max >= self.value,
            CompareOp::Le => min <= self.value,
            CompareOp::Gt => max > self.value,
            CompareOp::Lt => min < self.value,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.value)
    }
}

impl FromStr for Comparison {
    type Err = RoastIndexError;

    /// Parse tokens like `">= 80"`, `"<4.5"` or `"'> 202001'"`.
    fn from_str(token: &str) -> Result<Self> {
        let cleaned = strip_quotes(token);
        let (op, rest) = if let Some(rest) = cleaned.strip_prefix(">=") {
            (CompareOp::Ge, rest)
        } else if let Some(rest) = cleaned.strip_prefix("<=") {
            (CompareOp::Le, rest)
        } else if let Some(rest) = cleaned.strip_prefix('>') {
            (CompareOp::Gt, rest)
        } else if let Some(rest) = cleaned.strip_prefix('<') {
            (CompareOp::Lt, rest)
        } else {
            return Err(RoastIndexError::Validation(format!(
                "Condition {:?} must start with >=, <=, > or <",
                token
            )));
        };

        let value: f64 = rest.trim().parse().map_err(|_| {
            RoastIndexError::Validation(format!("Condition {:?} has no numeric operand", token))
        })?;
        if value.is_nan() {
            return Err(RoastIndexError::Validation(format!(
                "Condition {:?} compares against NaN",
                token
            )));
        }
        Ok(Self { op, value })
    }
}

fn strip_quotes(s: &str) -> String {
    s.trim().replace(['\'', '"'], "").trim().to_string()
}

/// A condition on a numeric attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericCondition {
    /// Inclusive range; a missing bound is unbounded.
    Range { min: Option<f64>, max: Option<f64> },
    /// Every comparison must hold.
    Comparisons(Vec<Comparison>),
}

impl NumericCondition {
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        NumericCondition::Range { min, max }
    }

    /// Parse a list of comparison tokens.
    pub fn parse_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .map(|t| t.as_ref().parse::<Comparison>())
            .collect::<Result<Vec<_>>>()
            .map(NumericCondition::Comparisons)
    }

    /// The condition in comparison form. A range becomes `>=` / `<=` tokens.
    pub fn comparisons(&self) -> Vec<Comparison> {
        match self {
            NumericCondition::Range { min, max } => min
                .map(|v| Comparison::new(CompareOp::Ge, v))
                .into_iter()
                .chain(max.map(|v| Comparison::new(CompareOp::Le, v)))
                .collect(),
            NumericCondition::Comparisons(list) => list.clone(),
        }
    }

    fn validate(&self, attr: Attribute) -> Result<()> {
        match self {
            NumericCondition::Range { min, max } => {
                if min.is_some_and(f64::is_nan) || max.is_some_and(f64::is_nan) {
                    return Err(RoastIndexError::Validation(format!(
                        "Range on {} has a NaN bound",
                        attr
                    )));
                }
                if let (Some(lo), Some(hi)) = (min, max)
                    && lo > hi
                {
                    return Err(RoastIndexError::Validation(format!(
                        "Range on {} has min {} greater than max {}",
                        attr, lo, hi
                    )));
                }
                Ok(())
            }
            NumericCondition::Comparisons(list) => match list.iter().find(|c| c.value.is_nan()) {
                Some(_) => Err(RoastIndexError::Validation(format!(
                    "Comparison on {} uses a NaN operand",
                    attr
                ))),
                None => Ok(()),
            },
        }
    }
}

/// A set of accepted values for a categorical attribute.
///
/// Values are stored trimmed and lower-cased; a field matches when its
/// normalized text equals one of them exactly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoricalCondition {
    accepted: Vec<String>,
}

impl CategoricalCondition {
    /// Accept each value of a list.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted: Vec<String> = values
            .into_iter()
            .map(|v| strip_quotes(v.as_ref()).to_lowercase())
            .filter(|v| !v.is_empty())
            .collect();
        accepted.dedup();
        Self { accepted }
    }

    /// Parse a delimited string such as `"Light, Medium"` or `"Kenya OR Ethiopia"`.
    pub fn parse(text: &str) -> Self {
        Self::from_values(
            text.split(',')
                .flat_map(|part| part.split(" OR "))
                .collect::<Vec<_>>(),
        )
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    /// Check whether an already normalized field value is accepted.
    pub fn accepts(&self, normalized: &str) -> bool {
        self.accepted.iter().any(|v| v == normalized)
    }
}

impl From<&str> for CategoricalCondition {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

/// A condition on one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Numeric(NumericCondition),
    Categorical(CategoricalCondition),
}

impl From<NumericCondition> for Condition {
    fn from(c: NumericCondition) -> Self {
        Condition::Numeric(c)
    }
}

impl From<CategoricalCondition> for Condition {
    fn from(c: CategoricalCondition) -> Self {
        Condition::Categorical(c)
    }
}

/// Conditions keyed by attribute. At most one condition per attribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionSet {
    conditions: BTreeMap<Attribute, Condition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the condition on `attr`, replacing any earlier one.
    pub fn insert(&mut self, attr: Attribute, condition: impl Into<Condition>) {
        self.conditions.insert(attr, condition.into());
    }

    pub fn get(&self, attr: Attribute) -> Option<&Condition> {
        self.conditions.get(&attr)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &Condition)> {
        self.conditions.iter().map(|(attr, c)| (*attr, c))
    }

    pub fn numeric(&self) -> impl Iterator<Item = (Attribute, &NumericCondition)> {
        self.iter().filter_map(|(attr, c)| match c {
            Condition::Numeric(n) => Some((attr, n)),
            Condition::Categorical(_) => None,
        })
    }

    pub fn categorical(&self) -> impl Iterator<Item = (Attribute, &CategoricalCondition)> {
        self.iter().filter_map(|(attr, c)| match c {
            Condition::Categorical(cat) => Some((attr, cat)),
            Condition::Numeric(_) => None,
        })
    }
}

/// A fully resolved query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub selected: Vec<Attribute>,
    pub conditions: ConditionSet,
    pub keywords: Option<String>,
    pub num_neighbors: Option<usize>,
}

impl QueryRequest {
    pub fn new(selected: Vec<Attribute>, conditions: ConditionSet) -> Self {
        Self {
            selected,
            conditions,
            keywords: None,
            num_neighbors: None,
        }
    }

    /// Rank the filtered rows by similarity of their review to `keywords`.
    pub fn with_keywords(mut self, keywords: impl Into<String>, num_neighbors: usize) -> Self {
        self.keywords = Some(keywords.into());
        self.num_neighbors = Some(num_neighbors);
        self
    }

    /// Whitespace-separated keywords, `None` when no keyword string was
    /// given or it is empty.
    ///
    /// A string of only whitespace still counts as a keyword query; its list
    /// is empty and ranks nothing.
    pub fn keyword_list(&self) -> Option<Vec<&str>> {
        self.keywords
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(|text| text.split_whitespace().collect())
    }

    /// Reject malformed requests before anything is built.
    pub fn validate(&self) -> Result<()> {
        if self.selected.is_empty() || self.selected.len() > MAX_SELECTED {
            return Err(RoastIndexError::Validation(format!(
                "Select between 1 and {} attributes, got {}",
                MAX_SELECTED,
                self.selected.len()
            )));
        }

        let has_keywords = self.keyword_list().is_some();
        if self.conditions.is_empty() && !has_keywords {
            return Err(RoastIndexError::Validation(
                "Query needs at least one condition or a keyword query".to_string(),
            ));
        }
        if has_keywords && self.num_neighbors.unwrap_or(0) == 0 {
            return Err(RoastIndexError::Validation(
                "num_neighbors must be a positive number when keywords are given".to_string(),
            ));
        }

        for (attr, condition) in self.conditions.iter() {
            match (condition, attr.is_numeric()) {
                (Condition::Numeric(numeric), true) => numeric.validate(attr)?,
                (Condition::Categorical(_), false) => {}
                (Condition::Numeric(_), false) => {
                    return Err(RoastIndexError::Validation(format!(
                        "{} is categorical and takes a list of values",
                        attr
                    )));
                }
                (Condition::Categorical(_), true) => {
                    return Err(RoastIndexError::Validation(format!(
                        "{} is numeric and takes a range or comparisons",
                        attr
                    )));
                }
            }
        }
        Ok(())
    }
}
