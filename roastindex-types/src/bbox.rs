use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::point::{Coords, Point};

/// A closed axis-aligned box with finite extent.
///
/// Used for R-tree entries and octree regions. A box built from a single
/// point is degenerate (zero extent on every axis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    mins: Coords,
    maxs: Coords,
}

impl BoundingBox {
    /// Create a box from per-axis minimum and maximum coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use roastindex_types::bbox::BoundingBox;
    ///
    /// let bbox = BoundingBox::new(&[0.0, 0.0], &[10.0, 5.0]);
    /// assert_eq!(bbox.extent(0), 10.0);
    /// ```
    pub fn new(mins: &[f64], maxs: &[f64]) -> Self {
        assert_eq!(mins.len(), maxs.len(), "mins and maxs differ in length");
        Self {
            mins: SmallVec::from_slice(mins),
            maxs: SmallVec::from_slice(maxs),
        }
    }

    /// The degenerate box covering exactly one point.
    pub fn from_point(point: &Point) -> Self {
        Self::new(point.coords(), point.coords())
    }

    /// The tight box around a set of points, or `None` if the set is empty.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        points
            .into_iter()
            .map(Self::from_point)
            .reduce(|a, b| a.union(&b))
    }

    /// Number of axes.
    pub fn dims(&self) -> usize {
        self.mins.len()
    }

    /// Minimum coordinate on `axis`.
    #[inline]
    pub fn min(&self, axis: usize) -> f64 {
        self.mins[axis]
    }

    /// Maximum coordinate on `axis`.
    #[inline]
    pub fn max(&self, axis: usize) -> f64 {
        self.maxs[axis]
    }

    /// Length of the box along `axis`.
    pub fn extent(&self, axis: usize) -> f64 {
        self.maxs[axis] - self.mins[axis]
    }

    /// Sum of the extents on every axis.
    ///
    /// Unlike the product of extents this stays informative for degenerate
    /// boxes, so it is the size measure used when choosing an R-tree subtree.
    pub fn extent_sum(&self) -> f64 {
        (0..self.dims()).map(|axis| self.extent(axis)).sum()
    }

    /// The smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mins = self
            .mins
            .iter()
            .zip(&other.mins)
            .map(|(a, b)| a.min(*b))
            .collect();
        let maxs = self
            .maxs
            .iter()
            .zip(&other.maxs)
            .map(|(a, b)| a.max(*b))
            .collect();
        BoundingBox { mins, maxs }
    }

    /// Growth of [`extent_sum`](Self::extent_sum) needed to also cover `other`.
    pub fn enlargement(&self, other: &BoundingBox) -> f64 {
        self.union(other).extent_sum() - self.extent_sum()
    }

    /// Check if a point lies inside the box (boundaries included).
    pub fn contains_point(&self, point: &Point) -> bool {
        (0..self.dims()).all(|axis| {
            let v = point.get(axis);
            v >= self.mins[axis] && v <= self.maxs[axis]
        })
    }

    /// Check if `other` lies completely inside this box.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        (0..self.dims()).all(|axis| {
            other.mins[axis] >= self.mins[axis] && other.maxs[axis] <= self.maxs[axis]
        })
    }

    /// Check if this box overlaps a query box.
    ///
    /// The box is excluded only when, on some axis, it lies entirely below
    /// the query minimum or entirely above the query maximum.
    pub fn intersects(&self, query: &QueryBox) -> bool {
        !(0..self.dims())
            .any(|axis| self.maxs[axis] < query.min(axis) || self.mins[axis] > query.max(axis))
    }

    /// Split a 3-D box into eight equal octants at the midpoint of each axis.
    ///
    /// Octant `i` takes the upper half of axis `a` when bit `a` of `i` is set,
    /// so octant 0 is the lower corner and octant 7 the upper corner.
    pub fn octants(&self) -> [BoundingBox; 8] {
        assert_eq!(self.dims(), 3, "octants are defined for 3-D boxes only");
        let mid: [f64; 3] = std::array::from_fn(|axis| (self.mins[axis] + self.maxs[axis]) / 2.0);

        std::array::from_fn(|i| {
            let mut mins = self.mins.clone();
            let mut maxs = self.maxs.clone();
            for axis in 0..3 {
                if i & (1 << axis) == 0 {
                    maxs[axis] = mid[axis];
                } else {
                    mins[axis] = mid[axis];
                }
            }
            BoundingBox { mins, maxs }
        })
    }
}

/// An axis-aligned range query.
///
/// Every bound is inclusive. An unbounded side is stored as an infinite
/// value, so `f64::NEG_INFINITY..=f64::INFINITY` matches every finite
/// coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBox {
    mins: Coords,
    maxs: Coords,
}

impl QueryBox {
    /// A box with no bound on any of its `dims` axes.
    pub fn unbounded(dims: usize) -> Self {
        Self {
            mins: SmallVec::from_elem(f64::NEG_INFINITY, dims),
            maxs: SmallVec::from_elem(f64::INFINITY, dims),
        }
    }

    /// Create a query box from explicit inclusive bounds.
    pub fn new(mins: &[f64], maxs: &[f64]) -> Self {
        assert_eq!(mins.len(), maxs.len(), "mins and maxs differ in length");
        Self {
            mins: SmallVec::from_slice(mins),
            maxs: SmallVec::from_slice(maxs),
        }
    }

    /// Set the bounds on `axis`; `None` leaves that side unbounded.
    pub fn set_range(&mut self, axis: usize, min: Option<f64>, max: Option<f64>) {
        self.mins[axis] = min.unwrap_or(f64::NEG_INFINITY);
        self.maxs[axis] = max.unwrap_or(f64::INFINITY);
    }

    /// Raise the lower bound on `axis` to at least `min`. A NaN `min` is
    /// kept, leaving the box malformed.
    pub fn tighten_min(&mut self, axis: usize, min: f64) {
        if min.is_nan() || min > self.mins[axis] {
            self.mins[axis] = min;
        }
    }

    /// Lower the upper bound on `axis` to at most `max`. A NaN `max` is
    /// kept, leaving the box malformed.
    pub fn tighten_max(&mut self, axis: usize, max: f64) {
        if max.is_nan() || max < self.maxs[axis] {
            self.maxs[axis] = max;
        }
    }

    /// Number of axes.
    pub fn dims(&self) -> usize {
        self.mins.len()
    }

    /// Inclusive lower bound on `axis`.
    #[inline]
    pub fn min(&self, axis: usize) -> f64 {
        self.mins[axis]
    }

    /// Inclusive upper bound on `axis`.
    #[inline]
    pub fn max(&self, axis: usize) -> f64 {
        self.maxs[axis]
    }

    /// Returns `true` if no axis carries a NaN bound.
    pub fn is_well_formed(&self) -> bool {
        self.mins.iter().chain(&self.maxs).all(|v| !v.is_nan())
    }

    /// Returns `true` if no point can satisfy the box.
    pub fn is_empty(&self) -> bool {
        (0..self.dims()).any(|axis| self.mins[axis] > self.maxs[axis])
    }

    /// Check if `value` satisfies the bound on `axis`.
    #[inline]
    pub fn contains_on(&self, axis: usize, value: f64) -> bool {
        value >= self.mins[axis] && value <= self.maxs[axis]
    }

    /// Check if `point` lies inside the box on every axis.
    pub fn contains(&self, point: &Point) -> bool {
        (0..self.dims()).all(|axis| self.contains_on(axis, point.get(axis)))
    }

    /// Extend the box to `dims` axes; the new axes are unbounded.
    pub fn padded(&self, dims: usize) -> Self {
        let mut padded = self.clone();
        while padded.mins.len() < dims {
            padded.mins.push(f64::NEG_INFINITY);
            padded.maxs.push(f64::INFINITY);
        }
        padded
    }
}
