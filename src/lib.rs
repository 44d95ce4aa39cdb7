//! Multi-attribute range queries over coffee review records.
//!
//! Four swappable indexes (KD-tree, octree, range tree, R-tree) answer
//! axis-aligned range queries over up to three numeric attributes. Results
//! can be narrowed by categorical filters and re-ranked by keyword
//! similarity of the review text.
//!
//! ```rust
//! use roastindex::{IndexKind, QueryBuilder, QueryEngine, RecordStore, Row, Value};
//!
//! let rows = vec![
//!     Row::new(vec![Value::from(12.5), Value::from(93.0), Value::from("Light")]),
//!     Row::new(vec![Value::from(4.0), Value::from(88.0), Value::from("Dark")]),
//! ];
//! let store = RecordStore::new(["100g_USD", "rating", "roast"], rows)?;
//!
//! let request = QueryBuilder::new()
//!     .select("rating")
//!     .comparisons("rating", ["> 90"])
//!     .categorical("roast", "light")
//!     .build()?;
//!
//! let result = QueryEngine::default().execute(&store, IndexKind::RTree, &request)?;
//! assert_eq!(result.row_ids(), vec![0]);
//! # Ok::<(), roastindex::RoastIndexError>(())
//! ```

pub mod attribute;
pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod index;
pub mod query;
pub mod similarity;
pub mod store;

pub use attribute::Attribute;
pub use builder::QueryBuilder;
pub use config::{DateEncoding, DateParsePolicy, IndexConfig};
pub use engine::{QueryEngine, QueryResult, ResultRow};
pub use error::{Result, RoastIndexError};
pub use filter::CategoricalFilter;
pub use index::{AxisConditions, IndexKind, IndexedPoint, RangeIndex};
pub use query::{
    CategoricalCondition, CompareOp, Comparison, Condition, ConditionSet, NumericCondition,
    QueryRequest,
};
pub use similarity::{Neighbor, SimilarityRanker};
pub use store::{LoadOptions, RecordStore, Row, RowId, SnapshotCache, Value};

pub use roastindex_types::bbox::{BoundingBox, QueryBox};
pub use roastindex_types::point::Point;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{QueryBuilder, QueryEngine, Result, RoastIndexError};

    pub use crate::{Attribute, IndexConfig, IndexKind, QueryRequest, QueryResult};

    pub use crate::{RecordStore, Row, SnapshotCache, Value};

    pub use crate::index::RangeIndex;
}
