//! Range indexes over projected record points.
//!
//! Four interchangeable structures share the [`RangeIndex`] contract: build
//! once from a set of points, then answer axis-aligned range queries with the
//! ids of the rows whose points fall inside the range.
//!
//! - [`KdTree`]: balanced median partition along a cycling axis
//! - [`Octree`]: equal-volume 3-D subdivision with bounded leaves
//! - [`RangeTree`]: layered BST with associative trees per extra dimension
//! - [`RTree`]: bounding-box grouping with incremental insertion

use std::fmt;
use std::str::FromStr;

use roastindex_types::bbox::{BoundingBox, QueryBox};
use roastindex_types::point::Point;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::{DateEncoding, IndexConfig};
use crate::error::{Result, RoastIndexError};
use crate::query::{CompareOp, Comparison};
use crate::store::RowId;

pub mod kdtree;
pub mod octree;
pub mod range_tree;
pub mod rtree;

pub use kdtree::KdTree;
pub use octree::Octree;
pub use range_tree::RangeTree;
pub use rtree::RTree;

/// A projected point together with the row it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    pub point: Point,
    pub row: RowId,
}

impl IndexedPoint {
    pub fn new(point: Point, row: RowId) -> Self {
        Self { point, row }
    }
}

impl From<(RowId, Point)> for IndexedPoint {
    fn from((row, point): (RowId, Point)) -> Self {
        Self { point, row }
    }
}

/// The contract every index variant implements.
pub trait RangeIndex {
    /// Which variant this is.
    fn kind(&self) -> IndexKind;

    /// Number of indexed points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows whose point lies inside `range` (bounds inclusive), in an
    /// index-defined order.
    fn query(&self, range: &QueryBox) -> Vec<RowId>;

    /// Rows whose point satisfies every comparison and that `accept` admits.
    ///
    /// Box-based variants translate the comparisons into an inclusive box
    /// and filter afterwards; the R-tree evaluates both during traversal.
    fn query_conditions(
        &self,
        conditions: &AxisConditions,
        accept: &dyn Fn(RowId) -> bool,
    ) -> Vec<RowId> {
        let range = conditions.to_query_box();
        if !range.is_well_formed() {
            log::warn!("Rejecting range query with a NaN bound");
            return Vec::new();
        }
        if range.is_empty() {
            return Vec::new();
        }
        self.query(&range)
            .into_iter()
            .filter(|&row| accept(row))
            .collect()
    }
}

/// The four index variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    KdTree,
    Octree,
    RangeTree,
    RTree,
}

impl IndexKind {
    pub const ALL: [IndexKind; 4] = [
        IndexKind::KdTree,
        IndexKind::Octree,
        IndexKind::RangeTree,
        IndexKind::RTree,
    ];

    /// Build an index of this kind over `dims`-dimensional points.
    pub fn build(
        self,
        points: Vec<IndexedPoint>,
        dims: usize,
        config: &IndexConfig,
    ) -> Box<dyn RangeIndex + Send + Sync> {
        match self {
            IndexKind::KdTree => Box::new(KdTree::build(points, dims)),
            IndexKind::Octree => Box::new(Octree::build(
                points,
                config.octree_capacity,
                config.octree_max_depth,
            )),
            IndexKind::RangeTree => Box::new(RangeTree::build(points, dims)),
            IndexKind::RTree => {
                let mut tree = RTree::new(dims, config.rtree_max_entries);
                for entry in points {
                    tree.insert(entry);
                }
                Box::new(tree)
            }
        }
    }

    /// Review-date encoding this variant's data is expected in.
    pub fn date_encoding(self, config: &IndexConfig) -> DateEncoding {
        match self {
            IndexKind::RangeTree => config.months_since_epoch(),
            IndexKind::KdTree | IndexKind::Octree | IndexKind::RTree => DateEncoding::YearMonth,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexKind::KdTree => "kd_tree",
            IndexKind::Octree => "octree",
            IndexKind::RangeTree => "range_tree",
            IndexKind::RTree => "r_tree",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = RoastIndexError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "kdtree" | "kd" => Ok(IndexKind::KdTree),
            "octree" | "quadtree" => Ok(IndexKind::Octree),
            "rangetree" => Ok(IndexKind::RangeTree),
            "rtree" => Ok(IndexKind::RTree),
            _ => Err(RoastIndexError::Validation(format!(
                "Unknown index kind: {}",
                s
            ))),
        }
    }
}

/// Per-axis comparison lists, the operator form of a range query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisConditions {
    axes: SmallVec<[Vec<Comparison>; 3]>,
}

impl AxisConditions {
    /// Conditions over `dims` axes, none of them constrained yet.
    pub fn new(dims: usize) -> Self {
        Self {
            axes: (0..dims).map(|_| Vec::new()).collect(),
        }
    }

    pub fn dims(&self) -> usize {
        self.axes.len()
    }

    pub fn push(&mut self, axis: usize, comparison: Comparison) {
        self.axes[axis].push(comparison);
    }

    pub fn on_axis(&self, axis: usize) -> &[Comparison] {
        &self.axes[axis]
    }

    /// The inclusive box equivalent to these comparisons.
    ///
    /// Strict bounds move to the adjacent representable value, so the box
    /// admits exactly the same coordinates as the comparisons.
    pub fn to_query_box(&self) -> QueryBox {
        let mut range = QueryBox::unbounded(self.dims());
        for (axis, comparisons) in self.axes.iter().enumerate() {
            for cmp in comparisons {
                match cmp.op {
                    CompareOp::Ge => range.tighten_min(axis, cmp.value),
                    CompareOp::Gt => range.tighten_min(axis, cmp.value.next_up()),
                    CompareOp::Le => range.tighten_max(axis, cmp.value),
                    CompareOp::Lt => range.tighten_max(axis, cmp.value.next_down()),
                }
            }
        }
        range
    }

    /// Check whether a box could hold a satisfying point.
    ///
    /// A box fails only when some comparison excludes its whole extent on
    /// that axis.
    pub fn admits_box(&self, bbox: &BoundingBox) -> bool {
        self.axes.iter().enumerate().all(|(axis, comparisons)| {
            comparisons
                .iter()
                .all(|cmp| cmp.admits_extent(bbox.min(axis), bbox.max(axis)))
        })
    }

    /// Check whether a point satisfies every comparison.
    pub fn admits_point(&self, point: &Point) -> bool {
        self.axes.iter().enumerate().all(|(axis, comparisons)| {
            comparisons.iter().all(|cmp| cmp.matches(point.get(axis)))
        })
    }
}
