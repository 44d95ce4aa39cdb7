//! # roastindex-types
//!
//! Geometric primitives shared by the roastindex range indexes.
//!
//! - **Point**: `Point`, a projection of a record onto one to three numeric axes
//! - **Boxes**: `BoundingBox` (closed, finite extent) and `QueryBox`
//!   (inclusive bounds, any side may be unbounded)
//!
//! All types are serializable with Serde.
//!
//! ## Examples
//!
//! ```rust
//! use roastindex_types::bbox::QueryBox;
//! use roastindex_types::point::Point;
//!
//! let point = Point::new(&[20.0, 85.0, 202006.0]);
//!
//! let mut query = QueryBox::unbounded(3);
//! query.set_range(0, Some(15.0), Some(25.0));
//! query.set_range(1, Some(80.0), Some(100.0));
//! assert!(query.contains(&point));
//! ```

pub mod bbox;
pub mod point;

/// Largest number of numeric axes an index is built over.
pub const MAX_AXES: usize = 3;
