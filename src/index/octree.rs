//! Octree over three axes.
//!
//! Points are inserted one at a time. A leaf that would exceed its capacity
//! splits into eight equal octants and hands every point it held down to
//! them, so points only ever live in leaves.

use roastindex_types::bbox::{BoundingBox, QueryBox};

use super::{IndexKind, IndexedPoint, RangeIndex};
use crate::store::RowId;

const OCTREE_DIMS: usize = 3;

#[derive(Debug, Clone)]
struct OctreeNode {
    region: BoundingBox,
    entries: Vec<IndexedPoint>,
    children: Option<Box<[OctreeNode; 8]>>,
}

impl OctreeNode {
    fn leaf(region: BoundingBox) -> Self {
        Self {
            region,
            entries: Vec::new(),
            children: None,
        }
    }

    fn insert(
        &mut self,
        entry: IndexedPoint,
        depth: usize,
        capacity: usize,
        max_depth: usize,
    ) -> bool {
        if let Some(children) = self.children.as_mut() {
            return match children
                .iter_mut()
                .find(|child| child.region.contains_point(&entry.point))
            {
                Some(child) => child.insert(entry, depth + 1, capacity, max_depth),
                None => false,
            };
        }

        if self.entries.len() < capacity || depth >= max_depth {
            self.entries.push(entry);
            return true;
        }

        self.subdivide(depth, capacity, max_depth);
        self.insert(entry, depth, capacity, max_depth)
    }

    fn subdivide(&mut self, depth: usize, capacity: usize, max_depth: usize) {
        let mut children = Box::new(self.region.octants().map(OctreeNode::leaf));
        for entry in std::mem::take(&mut self.entries) {
            // The first octant containing the point wins, matching insertion.
            if let Some(child) = children
                .iter_mut()
                .find(|child| child.region.contains_point(&entry.point))
            {
                child.insert(entry, depth + 1, capacity, max_depth);
            }
        }
        self.children = Some(children);
    }
}

/// A point octree with capacity-bounded leaves.
///
/// Indexes over fewer than three axes are padded with a constant `0.0`
/// coordinate, so the octree answers 1-D and 2-D queries as well.
///
/// # Example
///
/// ```
/// use roastindex::index::{IndexedPoint, Octree, RangeIndex};
/// use roastindex_types::bbox::QueryBox;
/// use roastindex_types::point::Point;
///
/// let points = (0..20)
///     .map(|i| IndexedPoint::new(Point::new(&[i as f64, 0.0, 0.0]), i))
///     .collect();
/// let tree = Octree::build(points, 4, 16);
///
/// let mut hits = tree.query(&QueryBox::new(&[5.0, 0.0, 0.0], &[7.0, 0.0, 0.0]));
/// hits.sort();
/// assert_eq!(hits, vec![5, 6, 7]);
/// ```
#[derive(Debug, Clone)]
pub struct Octree {
    root: Option<OctreeNode>,
    capacity: usize,
    max_depth: usize,
    len: usize,
}

impl Octree {
    /// Create an empty octree covering `region`.
    ///
    /// # Panics
    ///
    /// Panics if `region` is not three-dimensional.
    pub fn new(region: BoundingBox, capacity: usize, max_depth: usize) -> Self {
        assert_eq!(region.dims(), OCTREE_DIMS, "octree regions are 3-D");
        Self {
            root: Some(OctreeNode::leaf(region)),
            capacity: capacity.max(1),
            max_depth,
            len: 0,
        }
    }

    /// Build an octree whose root region is the tight box around `points`.
    pub fn build(points: Vec<IndexedPoint>, capacity: usize, max_depth: usize) -> Self {
        let points: Vec<IndexedPoint> = points
            .into_iter()
            .map(|p| IndexedPoint::new(p.point.padded(OCTREE_DIMS, 0.0), p.row))
            .collect();

        let Some(region) = BoundingBox::enclosing(points.iter().map(|p| &p.point)) else {
            return Self {
                root: None,
                capacity: capacity.max(1),
                max_depth,
                len: 0,
            };
        };

        let mut tree = Self::new(region, capacity, max_depth);
        for entry in points {
            tree.insert(entry);
        }
        log::debug!(
            "Built octree over {} points (capacity {}, max depth {})",
            tree.len,
            tree.capacity,
            tree.max_depth
        );
        tree
    }

    /// Insert a point. Returns `false` if it lies outside the root region.
    pub fn insert(&mut self, entry: IndexedPoint) -> bool {
        let Some(root) = self.root.as_mut() else {
            return false;
        };
        let entry = IndexedPoint::new(entry.point.padded(OCTREE_DIMS, 0.0), entry.row);
        if !root.region.contains_point(&entry.point) {
            log::warn!(
                "Rejecting point {:?} for row {} outside the octree region",
                entry.point.coords(),
                entry.row
            );
            return false;
        }

        let inserted = root.insert(entry, 0, self.capacity, self.max_depth);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    /// The root region, or `None` for an empty tree built from no points.
    pub fn region(&self) -> Option<&BoundingBox> {
        self.root.as_ref().map(|root| &root.region)
    }
}

impl RangeIndex for Octree {
    fn kind(&self) -> IndexKind {
        IndexKind::Octree
    }

    fn len(&self) -> usize {
        self.len
    }

    fn query(&self, range: &QueryBox) -> Vec<RowId> {
        let range = range.padded(OCTREE_DIMS);
        let mut results = Vec::new();
        let mut stack: Vec<&OctreeNode> = self.root.iter().collect();

        while let Some(node) = stack.pop() {
            if !node.region.intersects(&range) {
                continue;
            }
            results.extend(
                node.entries
                    .iter()
                    .filter(|e| range.contains(&e.point))
                    .map(|e| e.row),
            );
            if let Some(children) = node.children.as_ref() {
                stack.extend(children.iter().rev());
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roastindex_types::point::Point;

    fn cloud(n: usize) -> Vec<IndexedPoint> {
        (0..n)
            .map(|i| {
                let x = ((i * 37) % 101) as f64;
                let y = ((i * 11) % 53) as f64 / 2.0;
                let z = 202001.0 + (i % 12) as f64;
                IndexedPoint::new(Point::new(&[x, y, z]), i)
            })
            .collect()
    }

    fn check_invariants(node: &OctreeNode, depth: usize, tree: &Octree, seen: &mut usize) {
        for entry in &node.entries {
            assert!(node.region.contains_point(&entry.point));
        }
        *seen += node.entries.len();
        match node.children.as_ref() {
            Some(children) => {
                assert!(node.entries.is_empty(), "split nodes hold no points");
                for child in children.iter() {
                    assert!(node.region.contains_box(&child.region));
                    check_invariants(child, depth + 1, tree, seen);
                }
            }
            None => {
                if depth < tree.max_depth {
                    assert!(node.entries.len() <= tree.capacity);
                }
            }
        }
    }

    #[test]
    fn test_containment_and_capacity() {
        let tree = Octree::build(cloud(500), 4, 16);
        assert_eq!(tree.len(), 500);

        let mut seen = 0;
        check_invariants(tree.root.as_ref().unwrap(), 0, &tree, &mut seen);
        assert_eq!(seen, 500);
    }

    #[test]
    fn test_duplicates_stop_at_max_depth() {
        let points = (0..50)
            .map(|i| IndexedPoint::new(Point::new(&[1.0, 1.0, 1.0]), i))
            .collect();
        let tree = Octree::build(points, 2, 5);
        assert_eq!(tree.len(), 50);
        assert_eq!(tree.query(&QueryBox::unbounded(3)).len(), 50);
    }

    #[test]
    fn test_shallow_depth_cap_with_distinct_points() {
        let points = cloud(400);
        let tree = Octree::build(points.clone(), 2, 1);
        assert_eq!(tree.len(), 400);

        let mut seen = 0;
        check_invariants(tree.root.as_ref().unwrap(), 0, &tree, &mut seen);
        assert_eq!(seen, 400);

        let root = tree.root.as_ref().unwrap();
        let children = root.children.as_ref().unwrap();
        assert!(children.iter().all(|child| child.children.is_none()));
        assert!(children.iter().any(|child| child.entries.len() > 2));

        let mut range = QueryBox::unbounded(3);
        range.set_range(0, Some(10.0), Some(70.0));
        range.set_range(1, Some(5.0), None);
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

    #[test]
    fn test_rejects_point_outside_region() {
        let region = BoundingBox::new(&[0.0, 0.0, 0.0], &[10.0, 10.0, 10.0]);
        let mut tree = Octree::new(region, 4, 8);
        assert!(tree.insert(IndexedPoint::new(Point::new(&[5.0, 5.0, 5.0]), 0)));
        assert!(!tree.insert(IndexedPoint::new(Point::new(&[11.0, 5.0, 5.0]), 1)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_query_matches_brute_force() {
        let points = cloud(300);
        let tree = Octree::build(points.clone(), 4, 16);

        let mut range = QueryBox::unbounded(3);
        range.set_range(0, Some(20.0), Some(60.0));
        range.set_range(1, None, Some(12.5));
        range.set_range(2, Some(202004.0), None);

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

    #[test]
    fn test_two_dimensional_points_are_padded() {
        let points = vec![
            IndexedPoint::new(Point::new(&[1.0, 2.0]), 0),
            IndexedPoint::new(Point::new(&[3.0, 4.0]), 1),
        ];
        let tree = Octree::build(points, 1, 8);
        assert_eq!(tree.region().unwrap().dims(), 3);
        assert_eq!(tree.query(&QueryBox::new(&[2.0, 0.0], &[5.0, 5.0])), vec![1]);
    }

    #[test]
    fn test_empty_build() {
        let tree = Octree::build(Vec::new(), 4, 16);
        assert!(tree.is_empty());
        assert!(tree.region().is_none());
        assert!(tree.query(&QueryBox::unbounded(3)).is_empty());
    }
}
