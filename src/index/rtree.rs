//! R-tree with incremental insertion.
//!
//! Nodes live in an arena and know their parent, so an insertion can walk
//! back up from the leaf it landed in, splitting overfull nodes and
//! re-tightening bounding boxes all the way to the root.

use roastindex_types::bbox::{BoundingBox, QueryBox};
use roastindex_types::point::Point;

use super::{AxisConditions, IndexKind, IndexedPoint, RangeIndex};
use crate::store::RowId;

type NodeId = usize;

#[derive(Debug, Clone)]
enum NodeEntries {
    Leaf(Vec<IndexedPoint>),
    Internal(Vec<NodeId>),
}

#[derive(Debug, Clone)]
struct RNode {
    /// Tight box around everything below; `None` only for an empty root.
    bbox: Option<BoundingBox>,
    parent: Option<NodeId>,
    entries: NodeEntries,
}

impl RNode {
    fn leaf(parent: Option<NodeId>) -> Self {
        Self {
            bbox: None,
            parent,
            entries: NodeEntries::Leaf(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        match &self.entries {
            NodeEntries::Leaf(points) => points.len(),
            NodeEntries::Internal(children) => children.len(),
        }
    }
}

/// An R-tree over points with a fixed fan-out.
///
/// A node holding more than `max_entries` entries is split in two around
/// the median of the first axis.
///
/// # Example
///
/// ```
/// use roastindex::index::{IndexedPoint, RTree, RangeIndex};
/// use roastindex_types::bbox::QueryBox;
/// use roastindex_types::point::Point;
///
/// let mut tree = RTree::new(2, 5);
/// for i in 0..20 {
///     tree.insert(IndexedPoint::new(Point::new(&[i as f64, 100.0 - i as f64]), i));
/// }
///
/// let mut hits = tree.query(&QueryBox::new(&[3.0, 90.0], &[12.0, 100.0]));
/// hits.sort();
/// assert_eq!(hits, vec![3, 4, 5, 6, 7, 8, 9, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct RTree {
    nodes: Vec<RNode>,
    root: NodeId,
    dims: usize,
    max_entries: usize,
    len: usize,
}

impl RTree {
    /// Create an empty tree for `dims`-dimensional points.
    ///
    /// # Panics
    ///
    /// Panics if `max_entries` is less than two.
    pub fn new(dims: usize, max_entries: usize) -> Self {
        assert!(max_entries >= 2, "an R-tree node must hold at least two entries");
        Self {
            nodes: vec![RNode::leaf(None)],
            root: 0,
            dims: dims.max(1),
            max_entries,
            len: 0,
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of levels, counting the leaf level.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while let NodeEntries::Internal(children) = &self.nodes[id].entries {
            match children.first() {
                Some(&child) => id = child,
                None => break,
            }
            height += 1;
        }
        height
    }

    /// Insert a point into the leaf whose box needs the least enlargement.
    pub fn insert(&mut self, entry: IndexedPoint) {
        debug_assert_eq!(entry.point.dims(), self.dims);
        let leaf = self.choose_leaf(&entry.point);
        if let NodeEntries::Leaf(points) = &mut self.nodes[leaf].entries {
            points.push(entry);
        }
        self.len += 1;

        let mut current = leaf;
        loop {
            self.refresh_bbox(current);
            if self.nodes[current].len() > self.max_entries {
                self.split(current);
                self.refresh_bbox(current);
            }
            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    fn choose_leaf(&self, point: &Point) -> NodeId {
        let target = BoundingBox::from_point(point);
        let mut id = self.root;
        while let NodeEntries::Internal(children) = &self.nodes[id].entries {
            let mut best: Option<(NodeId, f64)> = None;
            for &child in children {
                let growth = self.nodes[child]
                    .bbox
                    .as_ref()
                    .map_or(0.0, |bbox| bbox.enlargement(&target));
                // Strictly smaller only, so ties go to the earliest child.
                if best.is_none_or(|(_, least)| growth < least) {
                    best = Some((child, growth));
                }
            }
            match best {
                Some((child, _)) => id = child,
                None => break,
            }
        }
        id
    }

    /// Move the upper half of an overfull node into a new sibling.
    fn split(&mut self, id: NodeId) {
        let sibling = self.nodes.len();
        let parent = self.nodes[id].parent;

        let entries = std::mem::replace(&mut self.nodes[id].entries, NodeEntries::Leaf(Vec::new()));
        let (kept, sibling_entries) = match entries {
            NodeEntries::Leaf(mut points) => {
                points.sort_by(|a, b| a.point.get(0).total_cmp(&b.point.get(0)));
                let upper = points.split_off(points.len() / 2);
                (NodeEntries::Leaf(points), NodeEntries::Leaf(upper))
            }
            NodeEntries::Internal(mut children) => {
                children.sort_by(|&a, &b| {
                    min_on_first_axis(&self.nodes[a]).total_cmp(&min_on_first_axis(&self.nodes[b]))
                });
                let upper = children.split_off(children.len() / 2);
                (NodeEntries::Internal(children), NodeEntries::Internal(upper))
            }
        };
        self.nodes[id].entries = kept;

        if let NodeEntries::Internal(moved) = &sibling_entries {
            for &child in moved {
                self.nodes[child].parent = Some(sibling);
            }
        }
        self.nodes.push(RNode {
            bbox: None,
            parent,
            entries: sibling_entries,
        });
        self.refresh_bbox(sibling);

        match parent {
            Some(parent) => {
                if let NodeEntries::Internal(children) = &mut self.nodes[parent].entries {
                    let at = children
                        .iter()
                        .position(|&c| c == id)
                        .map_or(children.len(), |p| p + 1);
                    children.insert(at, sibling);
                }
            }
            None => {
                let root = self.nodes.len();
                self.nodes.push(RNode {
                    bbox: None,
                    parent: None,
                    entries: NodeEntries::Internal(vec![id, sibling]),
                });
                self.nodes[id].parent = Some(root);
                self.nodes[sibling].parent = Some(root);
                self.root = root;
                log::trace!("R-tree grew to height {}", self.height());
            }
        }
    }

    /// Recompute a node's box from its current entries.
    fn refresh_bbox(&mut self, id: NodeId) {
        let bbox = match &self.nodes[id].entries {
            NodeEntries::Leaf(points) => BoundingBox::enclosing(points.iter().map(|p| &p.point)),
            NodeEntries::Internal(children) => children
                .iter()
                .filter_map(|&c| self.nodes[c].bbox.clone())
                .reduce(|acc, bbox| acc.union(&bbox)),
        };
        self.nodes[id].bbox = bbox;
    }

    /// Depth-first search pruning subtrees whose box `descend` rejects.
    fn search<B, P>(&self, descend: B, report: P) -> Vec<RowId>
    where
        B: Fn(&BoundingBox) -> bool,
        P: Fn(&IndexedPoint) -> bool,
    {
        let mut results = Vec::new();
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            match node.bbox.as_ref() {
                Some(bbox) if descend(bbox) => {}
                _ => continue,
            }
            match &node.entries {
                NodeEntries::Leaf(points) => {
                    results.extend(points.iter().filter(|p| report(p)).map(|p| p.row));
                }
                NodeEntries::Internal(children) => stack.extend(children.iter().rev()),
            }
        }

        results
    }
}

fn min_on_first_axis(node: &RNode) -> f64 {
    node.bbox.as_ref().map_or(f64::INFINITY, |bbox| bbox.min(0))
}

impl RangeIndex for RTree {
    fn kind(&self) -> IndexKind {
        IndexKind::RTree
    }

    fn len(&self) -> usize {
        self.len
    }

    fn query(&self, range: &QueryBox) -> Vec<RowId> {
        let range = range.padded(self.dims);
        self.search(|bbox| bbox.intersects(&range), |p| range.contains(&p.point))
    }

    fn query_conditions(
        &self,
        conditions: &AxisConditions,
        accept: &dyn Fn(RowId) -> bool,
    ) -> Vec<RowId> {
        self.search(
            |bbox| conditions.admits_box(bbox),
            |p| conditions.admits_point(&p.point) && accept(p.row),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CompareOp, Comparison};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_tree(seed: u64, n: usize, dims: usize, max_entries: usize) -> (RTree, Vec<IndexedPoint>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tree = RTree::new(dims, max_entries);
        let mut points = Vec::with_capacity(n);
        for row in 0..n {
            let coords: Vec<f64> = (0..dims).map(|_| rng.gen_range(0.0..100.0)).collect();
            let entry = IndexedPoint::new(Point::new(&coords), row);
            tree.insert(entry.clone());
            points.push(entry);
        }
        (tree, points)
    }

    fn check_node(tree: &RTree, id: NodeId, depth: usize, leaf_depths: &mut Vec<usize>) -> usize {
        let node = &tree.nodes[id];
        assert!(node.len() <= tree.max_entries, "node {} holds {} entries", id, node.len());
        let bbox = node.bbox.as_ref().expect("non-empty nodes have a box");

        match &node.entries {
            NodeEntries::Leaf(points) => {
                let tight = BoundingBox::enclosing(points.iter().map(|p| &p.point)).unwrap();
                assert_eq!(bbox, &tight);
                leaf_depths.push(depth);
                points.len()
            }
            NodeEntries::Internal(children) => {
                let tight = children
                    .iter()
                    .map(|&c| tree.nodes[c].bbox.clone().unwrap())
                    .reduce(|a, b| a.union(&b))
                    .unwrap();
                assert_eq!(bbox, &tight);
                children
                    .iter()
                    .map(|&c| {
                        assert_eq!(tree.nodes[c].parent, Some(id));
                        check_node(tree, c, depth + 1, leaf_depths)
                    })
                    .sum()
            }
        }
    }

    #[test]
    fn test_empty_tree() {
        let tree = RTree::new(3, 5);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert!(tree.query(&QueryBox::unbounded(3)).is_empty());
    }

    #[test]
    fn test_invariants_after_inserts() {
        let (tree, _) = random_tree(11, 400, 3, 5);
        assert_eq!(tree.len(), 400);
        assert!(tree.height() > 1);

        let mut leaf_depths = Vec::new();
        let counted = check_node(&tree, tree.root, 0, &mut leaf_depths);
        assert_eq!(counted, 400);
        assert!(leaf_depths.windows(2).all(|w| w[0] == w[1]), "leaves share one level");
    }

    #[test]
    fn test_query_matches_brute_force() {
        let (tree, points) = random_tree(5, 300, 2, 4);
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..40 {
            let a: f64 = rng.gen_range(0.0..100.0);
            let b: f64 = rng.gen_range(0.0..100.0);
            let mut range = QueryBox::unbounded(2);
            range.set_range(0, Some(a.min(b)), Some(a.max(b)));
            range.set_range(1, Some(rng.gen_range(0.0..50.0)), None);

            let mut expected: Vec<RowId> = points
                .iter()
                .filter(|p| range.contains(&p.point))
                .map(|p| p.row)
                .collect();
            expected.sort_unstable();
            let mut got = tree.query(&range);
            got.sort_unstable();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn test_conditions_with_strict_operators_and_filter() {
        let mut tree = RTree::new(1, 3);
        for (row, v) in [70.0, 80.0, 85.0, 90.0, 95.0, 80.0].into_iter().enumerate() {
            tree.insert(IndexedPoint::new(Point::new(&[v]), row));
        }

        let mut conditions = AxisConditions::new(1);
        conditions.push(0, Comparison::new(CompareOp::Gt, 80.0));
        conditions.push(0, Comparison::new(CompareOp::Le, 90.0));

        let mut got = tree.query_conditions(&conditions, &|_| true);
        got.sort_unstable();
        assert_eq!(got, vec![2, 3]);

        let got = tree.query_conditions(&conditions, &|row| row != 2);
        assert_eq!(got, vec![3]);
    }

    #[test]
    fn test_identical_points() {
        let mut tree = RTree::new(2, 2);
        for row in 0..10 {
            tree.insert(IndexedPoint::new(Point::new(&[1.0, 1.0]), row));
        }
        let mut leaf_depths = Vec::new();
        assert_eq!(check_node(&tree, tree.root, 0, &mut leaf_depths), 10);
        assert_eq!(tree.query(&QueryBox::new(&[1.0, 1.0], &[1.0, 1.0])).len(), 10);
    }
}
