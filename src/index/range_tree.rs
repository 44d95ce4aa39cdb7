//! Layered range tree for one to three dimensions.
//!
//! The primary tree is a balanced BST on the first axis. For every axis but
//! the last, each node carries an associative tree: a range tree over the
//! same points as the node's subtree, keyed on the next axis. A query finds
//! the split node on the current axis, walks the two boundary paths, and
//! hands every canonical subtree to its associative tree one axis deeper.
//!
//! Space is O(n log^(d-1) n); a query costs O(log^d n + k).

use roastindex_types::bbox::QueryBox;
use roastindex_types::point::Point;

use super::{IndexKind, IndexedPoint, RangeIndex};
use crate::store::RowId;

#[derive(Debug, Clone)]
struct RangeNode {
    entry: IndexedPoint,
    left: Option<Box<RangeNode>>,
    right: Option<Box<RangeNode>>,
    /// Tree over this subtree's points keyed on the next axis.
    assoc: Option<Box<RangeNode>>,
}

impl RangeNode {
    #[inline]
    fn key(&self, axis: usize) -> f64 {
        self.entry.point.get(axis)
    }

    #[cfg(test)]
    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// A multi-level range tree with associative structures.
///
/// # Example
///
/// ```
/// use roastindex::index::{IndexedPoint, RangeIndex, RangeTree};
/// use roastindex_types::bbox::QueryBox;
/// use roastindex_types::point::Point;
///
/// let points = vec![
///     IndexedPoint::new(Point::new(&[10.0, 90.0, 36.0]), 0),
///     IndexedPoint::new(Point::new(&[20.0, 85.0, 41.0]), 1),
///     IndexedPoint::new(Point::new(&[30.0, 95.0, 47.0]), 2),
/// ];
/// let tree = RangeTree::build(points, 3);
///
/// let mut range = QueryBox::unbounded(3);
/// range.set_range(0, Some(15.0), Some(25.0));
/// range.set_range(1, Some(80.0), Some(100.0));
/// assert_eq!(tree.query(&range), vec![1]);
/// ```
#[derive(Debug, Clone)]
pub struct RangeTree {
    root: Option<Box<RangeNode>>,
    dims: usize,
    len: usize,
}

impl RangeTree {
    /// Build a range tree over the first `dims` axes of the points.
    pub fn build(mut points: Vec<IndexedPoint>, dims: usize) -> Self {
        let dims = dims.clamp(1, roastindex_types::MAX_AXES);
        let len = points.len();
        points.sort_by(|a, b| a.point.get(0).total_cmp(&b.point.get(0)));

        let tree = Self {
            root: build_level(&points, 0, dims),
            dims,
            len,
        };
        log::debug!(
            "Built {}-D range tree over {} points ({} nodes including associative trees)",
            dims,
            len,
            tree.node_count()
        );
        tree
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Total nodes across the primary and all associative trees.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&RangeNode> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.left.as_deref());
            stack.extend(node.right.as_deref());
            stack.extend(node.assoc.as_deref());
        }
        count
    }
}

/// Build one level from points already sorted on `axis`.
fn build_level(sorted: &[IndexedPoint], axis: usize, dims: usize) -> Option<Box<RangeNode>> {
    if sorted.is_empty() {
        return None;
    }

    let assoc = if axis + 1 < dims {
        let mut resorted = sorted.to_vec();
        resorted.sort_by(|a, b| a.point.get(axis + 1).total_cmp(&b.point.get(axis + 1)));
        build_level(&resorted, axis + 1, dims)
    } else {
        None
    };

    let mid = sorted.len() / 2;
    Some(Box::new(RangeNode {
        entry: sorted[mid].clone(),
        left: build_level(&sorted[..mid], axis, dims),
        right: build_level(&sorted[mid + 1..], axis, dims),
        assoc,
    }))
}

/// Descend to the first node whose key on `axis` lies in `[lo, hi]`.
fn find_split_node(root: Option<&RangeNode>, axis: usize, lo: f64, hi: f64) -> Option<&RangeNode> {
    let mut node = root;
    while let Some(n) = node {
        let key = n.key(axis);
        if hi < key {
            node = n.left.as_deref();
        } else if lo > key {
            node = n.right.as_deref();
        } else {
            break;
        }
    }
    node
}

/// Check the point against the box on `axis` and every later axis.
///
/// Earlier axes are already guaranteed by the canonical subtree that led
/// to this level.
#[inline]
fn contains_from(range: &QueryBox, axis: usize, dims: usize, point: &Point) -> bool {
    (axis..dims).all(|a| range.contains_on(a, point.get(a)))
}

fn search(root: Option<&RangeNode>, axis: usize, dims: usize, range: &QueryBox, out: &mut Vec<RowId>) {
    if axis + 1 == dims {
        search_1d(root, axis, range, out);
        return;
    }

    let (lo, hi) = (range.min(axis), range.max(axis));
    let Some(split) = find_split_node(root, axis, lo, hi) else {
        return;
    };
    if contains_from(range, axis, dims, &split.entry.point) {
        out.push(split.entry.row);
    }

    // Left boundary path: right subtrees hanging off it are canonical.
    let mut node = split.left.as_deref();
    while let Some(n) = node {
        if contains_from(range, axis, dims, &n.entry.point) {
            out.push(n.entry.row);
        }
        if lo <= n.key(axis) {
            if let Some(right) = n.right.as_deref() {
                search(right.assoc.as_deref(), axis + 1, dims, range, out);
            }
            node = n.left.as_deref();
        } else {
            node = n.right.as_deref();
        }
    }

    // Right boundary path: left subtrees hanging off it are canonical.
    let mut node = split.right.as_deref();
    while let Some(n) = node {
        if contains_from(range, axis, dims, &n.entry.point) {
            out.push(n.entry.row);
        }
        if hi >= n.key(axis) {
            if let Some(left) = n.left.as_deref() {
                search(left.assoc.as_deref(), axis + 1, dims, range, out);
            }
            node = n.right.as_deref();
        } else {
            node = n.left.as_deref();
        }
    }
}

/// Plain BST range search on the last axis.
fn search_1d(root: Option<&RangeNode>, axis: usize, range: &QueryBox, out: &mut Vec<RowId>) {
    let (lo, hi) = (range.min(axis), range.max(axis));
    let Some(split) = find_split_node(root, axis, lo, hi) else {
        return;
    };

    let mut stack = vec![split];
    while let Some(n) = stack.pop() {
        let key = n.key(axis);
        if key < lo {
            stack.extend(n.right.as_deref());
        } else if key > hi {
            stack.extend(n.left.as_deref());
        } else {
            out.push(n.entry.row);
            stack.extend(n.right.as_deref());
            stack.extend(n.left.as_deref());
        }
    }
}

impl RangeIndex for RangeTree {
    fn kind(&self) -> IndexKind {
        IndexKind::RangeTree
    }

    fn len(&self) -> usize {
        self.len
    }

    fn query(&self, range: &QueryBox) -> Vec<RowId> {
        let range = range.padded(self.dims);
        let mut results = Vec::new();
        search(self.root.as_deref(), 0, self.dims, &range, &mut results);
        results
    }
}
