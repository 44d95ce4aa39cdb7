use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::MAX_AXES;

/// Coordinates of a point, stored inline for up to three axes.
pub type Coords = SmallVec<[f64; MAX_AXES]>;

/// A record projected onto one to three numeric axes.
///
/// Points are used purely for index partitioning. The axis order is the order
/// in which the attributes were selected for the query.
///
/// # Examples
///
/// ```
/// use roastindex_types::point::Point;
///
/// let point = Point::new(&[10.0, 90.0]);
/// assert_eq!(point.dims(), 2);
/// assert_eq!(point.get(1), 90.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    coords: Coords,
}

impl Point {
    /// Create a point from its coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `coords` is empty or longer than [`MAX_AXES`].
    pub fn new(coords: &[f64]) -> Self {
        assert!(
            (1..=MAX_AXES).contains(&coords.len()),
            "a point has between 1 and {} axes, got {}",
            MAX_AXES,
            coords.len()
        );
        Self {
            coords: SmallVec::from_slice(coords),
        }
    }

    /// Create a point from already collected coordinates.
    pub fn from_coords(coords: Coords) -> Self {
        Self::new(&coords)
    }

    /// Number of axes.
    #[inline]
    pub fn dims(&self) -> usize {
        self.coords.len()
    }

    /// Coordinate on `axis`.
    #[inline]
    pub fn get(&self, axis: usize) -> f64 {
        self.coords[axis]
    }

    /// All coordinates in axis order.
    #[inline]
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Returns `true` if every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(|c| c.is_finite())
    }

    /// Extend the point to `dims` axes, filling new axes with `fill`.
    ///
    /// Axes beyond the current dimensionality are added; a point that already
    /// has `dims` or more axes is returned unchanged.
    pub fn padded(&self, dims: usize, fill: f64) -> Self {
        let mut coords = self.coords.clone();
        while coords.len() < dims.min(MAX_AXES) {
            coords.push(fill);
        }
        Self { coords }
    }
}
