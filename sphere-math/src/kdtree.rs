//! Three-dimensional k-d tree for nearest-neighbour lookups
//!
//! Built once over a fixed point set and queried many times. Used to seed
//! point location on the sphere and to detect coincident grid points, both
//! of which would otherwise be O(n) scans per query.

use nalgebra::Vector3;

/// A single tree node referring back into the point array
#[derive(Debug, Clone)]
struct KdNode {
    /// Index of the point stored at this node
    point: usize,
    /// Splitting axis (0 = x, 1 = y, 2 = z)
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Static k-d tree over 3D points
///
/// Point indices returned by queries are positions in the slice passed to
/// [`KdTree::build`], so callers can keep their own index correspondence.
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<Vector3<f64>>,
    nodes: Vec<KdNode>,
    root: Option<usize>,
}

impl KdTree {
    /// Build a balanced tree by recursive median splits, cycling x, y, z
    pub fn build(points: &[Vector3<f64>]) -> Self {
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = Self::build_recursive(points, &mut indices, 0, &mut nodes);

        Self {
            points: points.to_vec(),
            nodes,
            root,
        }
    }

    fn build_recursive(
        points: &[Vector3<f64>],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let axis = depth % 3;
        let median = indices.len() / 2;

        // Ties on the axis coordinate fall back to index order so the layout
        // does not depend on the sort implementation.
        indices.select_nth_unstable_by(median, |&a, &b| {
            points[a][axis]
                .total_cmp(&points[b][axis])
                .then(a.cmp(&b))
        });

        let point = indices[median];
        let node_id = nodes.len();
        nodes.push(KdNode {
            point,
            axis,
            left: None,
            right: None,
        });

        let (lower, upper) = indices.split_at_mut(median);
        let left = Self::build_recursive(points, lower, depth + 1, nodes);
        let right = Self::build_recursive(points, &mut upper[1..], depth + 1, nodes);

        nodes[node_id].left = left;
        nodes[node_id].right = right;

        Some(node_id)
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the tree holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Find the closest point to `query`
    ///
    /// # Returns
    /// `Some((index, squared_distance))`, or `None` for an empty tree or a
    /// query with a non-finite component.
    /// Equidistant candidates resolve to the lowest index.
    pub fn nearest(&self, query: &Vector3<f64>) -> Option<(usize, f64)> {
        let root = self.root?;
        if !query.iter().all(|c| c.is_finite()) {
            return None;
        }

        let mut best = (usize::MAX, f64::INFINITY);
        self.nearest_recursive(root, query, &mut best);
        (best.0 != usize::MAX).then_some(best)
    }

    fn nearest_recursive(&self, node_id: usize, query: &Vector3<f64>, best: &mut (usize, f64)) {
        let node = &self.nodes[node_id];
        let point = &self.points[node.point];

        let dist = (point - query).norm_squared();
        if dist < best.1 || (dist == best.1 && node.point < best.0) {
            *best = (node.point, dist);
        }

        let delta = query[node.axis] - point[node.axis];
        let (near, far) = if delta < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(near) = near {
            self.nearest_recursive(near, query, best);
        }

        // `<=` keeps equidistant points on the far side reachable for the
        // lowest-index tie break
        if let Some(far) = far {
            if delta * delta <= best.1 {
                self.nearest_recursive(far, query, best);
            }
        }
    }

    /// Collect every point within `radius` (inclusive) of `query`
    ///
    /// Indices are returned in ascending order.
    pub fn within_radius(&self, query: &Vector3<f64>, radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        if let Some(root) = self.root {
            self.within_recursive(root, query, radius * radius, radius, &mut found);
        }
        found.sort_unstable();
        found
    }

    fn within_recursive(
        &self,
        node_id: usize,
        query: &Vector3<f64>,
        radius_sq: f64,
        radius: f64,
        found: &mut Vec<usize>,
    ) {
        let node = &self.nodes[node_id];
        let point = &self.points[node.point];

        if (point - query).norm_squared() <= radius_sq {
            found.push(node.point);
        }

        let delta = query[node.axis] - point[node.axis];

        if let Some(left) = node.left {
            if delta <= radius {
                self.within_recursive(left, query, radius_sq, radius, found);
            }
        }
        if let Some(right) = node.right {
            if delta >= -radius {
                self.within_recursive(right, query, radius_sq, radius, found);
            }
        }
    }
}
