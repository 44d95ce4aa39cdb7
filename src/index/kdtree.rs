//! KD-tree over up to three axes.
//!
//! Nodes are kept in a flat arena and reference their children by index. The
//! tree is built once by recursive median partition and never mutated.

use roastindex_types::bbox::QueryBox;

use super::{IndexKind, IndexedPoint, RangeIndex};
use crate::store::RowId;

type NodeId = usize;

#[derive(Debug, Clone)]
struct KdNode {
    entry: IndexedPoint,
    /// Splitting axis, `depth % dims`.
    axis: usize,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// A balanced KD-tree built by median splits along a cycling axis.
///
/// At depth `d` the splitting axis is `d % dims`. Every point in a node's
/// left subtree has a value on that axis no greater than the node's, every
/// point in the right subtree a value no smaller.
///
/// # Example
///
/// ```
/// use roastindex::index::{IndexedPoint, KdTree, RangeIndex};
/// use roastindex_types::bbox::QueryBox;
/// use roastindex_types::point::Point;
///
/// let points = vec![
///     IndexedPoint::new(Point::new(&[10.0, 90.0]), 0),
///     IndexedPoint::new(Point::new(&[20.0, 85.0]), 1),
///     IndexedPoint::new(Point::new(&[30.0, 95.0]), 2),
/// ];
/// let tree = KdTree::build(points, 2);
///
/// let range = QueryBox::new(&[15.0, 80.0], &[25.0, 100.0]);
/// assert_eq!(tree.query(&range), vec![1]);
/// ```
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    root: Option<NodeId>,
    dims: usize,
}

impl KdTree {
    /// Build a tree over `dims`-dimensional points.
    ///
    /// An empty input produces an empty tree.
    pub fn build(points: Vec<IndexedPoint>, dims: usize) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(points.len()),
            root: None,
            dims: dims.max(1),
        };
        tree.root = tree.build_recursive(points, 0);
        log::debug!(
            "Built KD-tree over {} points in {} dimension(s), depth {}",
            tree.nodes.len(),
            tree.dims,
            tree.depth()
        );
        tree
    }

    fn build_recursive(&mut self, mut entries: Vec<IndexedPoint>, depth: usize) -> Option<NodeId> {
        if entries.is_empty() {
            return None;
        }

        let axis = depth % self.dims;
        entries.sort_by(|a, b| a.point.get(axis).total_cmp(&b.point.get(axis)));

        let median = entries.len() / 2;
        let right = entries.split_off(median + 1);
        let entry = entries.pop()?;
        let left = entries;

        let id = self.nodes.len();
        self.nodes.push(KdNode {
            entry,
            axis,
            left: None,
            right: None,
        });

        let left = self.build_recursive(left, depth + 1);
        let right = self.build_recursive(right, depth + 1);
        self.nodes[id].left = left;
        self.nodes[id].right = right;
        Some(id)
    }

    /// Number of levels from the root to the deepest leaf.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((id, level)) = stack.pop() {
            deepest = deepest.max(level);
            let node = &self.nodes[id];
            stack.extend(node.left.map(|c| (c, level + 1)));
            stack.extend(node.right.map(|c| (c, level + 1)));
        }
        deepest
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

impl RangeIndex for KdTree {
    fn kind(&self) -> IndexKind {
        IndexKind::KdTree
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn query(&self, range: &QueryBox) -> Vec<RowId> {
        let mut results = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if range.contains(&node.entry.point) {
                results.push(node.entry.row);
            }

            let split = node.entry.point.get(node.axis);
            // Right is pushed first so the left subtree is visited first.
            if split <= range.max(node.axis)
                && let Some(right) = node.right
            {
                stack.push(right);
            }
            if split >= range.min(node.axis)
                && let Some(left) = node.left
            {
                stack.push(left);
            }
        }

        results
    }
}
