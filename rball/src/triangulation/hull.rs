//! Incremental 3D convex hull of points on the unit sphere.
//!
//! For points on a sphere the hull faces are exactly the spherical Delaunay
//! triangles. Points are inserted in index order so the resulting face list
//! is reproducible for a given input.

use std::collections::{HashMap, VecDeque};

use nalgebra::Vector3;
use sphere_math::triple_product;

use super::Degeneracy;

/// Relative height above a face plane for a point to count as visible
const VISIBILITY_EPSILON: f64 = 1e-12;

/// Minimum extent when picking the initial tetrahedron
const SIMPLEX_EPSILON: f64 = 1e-12;

/// Minimum distance of every face plane from the origin
const ORIGIN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
struct HullFace {
    vertices: [usize; 3],
    /// Outward unit normal
    normal: Vector3<f64>,
    /// Plane offset, `normal · vertices[0]`
    offset: f64,
    alive: bool,
}

impl HullFace {
    fn new(points: &[Vector3<f64>], vertices: [usize; 3]) -> Self {
        let [a, b, c] = vertices.map(|v| points[v]);
        let normal = (b - a).cross(&(c - a)).normalize();
        Self {
            vertices,
            normal,
            offset: normal.dot(&a),
            alive: true,
        }
    }

    fn height(&self, p: &Vector3<f64>) -> f64 {
        self.normal.dot(p) - self.offset
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }
}

struct HullBuilder<'a> {
    points: &'a [Vector3<f64>],
    faces: Vec<HullFace>,
    /// Directed edge (u, v) -> face holding it in counter-clockwise order
    edges: HashMap<(usize, usize), usize>,
}

impl<'a> HullBuilder<'a> {
    fn new(points: &'a [Vector3<f64>]) -> Self {
        Self {
            points,
            faces: Vec::with_capacity(2 * points.len()),
            edges: HashMap::with_capacity(6 * points.len()),
        }
    }

    fn add_face(&mut self, vertices: [usize; 3], inserting: usize) -> Result<usize, Degeneracy> {
        let face = HullFace::new(self.points, vertices);
        if !face.normal.iter().all(|c| c.is_finite()) {
            return Err(Degeneracy::Uninsertable { index: inserting });
        }

        let id = self.faces.len();
        for edge in face.edges() {
            if self.edges.insert(edge, id).is_some() {
                return Err(Degeneracy::Uninsertable { index: inserting });
            }
        }
        self.faces.push(face);
        Ok(id)
    }

    fn remove_face(&mut self, id: usize) {
        self.faces[id].alive = false;
        for edge in self.faces[id].edges() {
            self.edges.remove(&edge);
        }
    }

    fn neighbour(&self, edge: (usize, usize)) -> Option<usize> {
        self.edges.get(&(edge.1, edge.0)).copied()
    }

    /// Pick four well-spread, non-coplanar points and seed the hull with them
    fn seed_tetrahedron(&mut self) -> Result<[usize; 4], Degeneracy> {
        let points = self.points;
        let p0 = points[0];

        let i1 = argmax(points, |p| (p - p0).norm_squared());
        let p1 = points[i1];
        if (p1 - p0).norm_squared() < SIMPLEX_EPSILON {
            return Err(Degeneracy::Coplanar);
        }

        let axis = p1 - p0;
        let i2 = argmax(points, |p| (p - p0).cross(&axis).norm_squared());
        let p2 = points[i2];
        if (p2 - p0).cross(&axis).norm_squared() < SIMPLEX_EPSILON {
            return Err(Degeneracy::Coplanar);
        }

        let i3 = argmax(points, |p| triple_product(&(p - p0), &axis, &(p2 - p0)).abs());
        if triple_product(&(points[i3] - p0), &axis, &(p2 - p0)).abs() < SIMPLEX_EPSILON {
            return Err(Degeneracy::Coplanar);
        }

        let simplex = [0, i1, i2, i3];
        let centroid = simplex.iter().map(|&i| points[i]).sum::<Vector3<f64>>() / 4.0;

        for [a, b, c] in [[0, i1, i2], [0, i1, i3], [0, i2, i3], [i1, i2, i3]] {
            let normal = (points[b] - points[a]).cross(&(points[c] - points[a]));
            let vertices = if normal.dot(&(points[a] - centroid)) < 0.0 {
                [a, c, b]
            } else {
                [a, b, c]
            };
            self.add_face(vertices, c)?;
        }

        Ok(simplex)
    }

    /// Find a face the point can see, starting from `start`
    ///
    /// Walks toward the point's direction across face adjacency; once the
    /// hull encloses the origin the face hit by the ray through `p` is always
    /// visible. Falls back to a full scan when the walk stalls.
    fn find_visible(&self, start: usize, p: &Vector3<f64>) -> Option<usize> {
        let mut face = start;
        let mut steps = 0;
        let max_steps = self.faces.len();

        while steps < max_steps && self.faces[face].alive {
            let hull_face = &self.faces[face];
            if hull_face.height(p) > VISIBILITY_EPSILON {
                return Some(face);
            }

            let [a, b, c] = hull_face.vertices.map(|v| self.points[v]);
            let tests = [
                (triple_product(p, &b, &c), (hull_face.vertices[1], hull_face.vertices[2])),
                (triple_product(p, &c, &a), (hull_face.vertices[2], hull_face.vertices[0])),
                (triple_product(p, &a, &b), (hull_face.vertices[0], hull_face.vertices[1])),
            ];
            let (worst, edge) = tests
                .iter()
                .copied()
                .fold((0.0, None), |acc, (value, edge)| {
                    if value < acc.0 {
                        (value, Some(edge))
                    } else {
                        acc
                    }
                });

            match edge.and_then(|e| self.neighbour(e)) {
                Some(next) if worst < 0.0 => face = next,
                _ => break,
            }
            steps += 1;
        }

        // Full scan: the face the point rises highest above
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.alive)
            .map(|(id, f)| (id, f.height(p)))
            .filter(|&(_, h)| h > VISIBILITY_EPSILON)
            .fold(None, |best: Option<(usize, f64)>, (id, h)| match best {
                Some((_, best_h)) if best_h >= h => best,
                _ => Some((id, h)),
            })
            .map(|(id, _)| id)
    }

    /// Add one point, replacing every face it can see
    fn insert(&mut self, index: usize, start: usize) -> Result<usize, Degeneracy> {
        let p = self.points[index];
        let seed = self
            .find_visible(start, &p)
            .ok_or(Degeneracy::Uninsertable { index })?;

        // Grow the visible region from the seed so it stays connected
        let mut visible = vec![seed];
        let mut is_visible: HashMap<usize, bool> = HashMap::new();
        is_visible.insert(seed, true);
        let mut queue = VecDeque::from([seed]);

        while let Some(face) = queue.pop_front() {
            for edge in self.faces[face].edges() {
                let Some(next) = self.neighbour(edge) else {
                    return Err(Degeneracy::Uninsertable { index });
                };
                if is_visible.contains_key(&next) {
                    continue;
                }
                let seen = self.faces[next].height(&p) > VISIBILITY_EPSILON;
                is_visible.insert(next, seen);
                if seen {
                    visible.push(next);
                    queue.push_back(next);
                }
            }
        }

        let mut horizon = Vec::new();
        for &face in &visible {
            for edge in self.faces[face].edges() {
                let twin = self.neighbour(edge);
                if !twin.is_some_and(|t| is_visible.get(&t).copied().unwrap_or(false)) {
                    horizon.push(edge);
                }
            }
        }

        for &face in &visible {
            self.remove_face(face);
        }

        let mut last = seed;
        for (u, v) in horizon {
            last = self.add_face([u, v, index], index)?;
        }
        Ok(last)
    }

    fn finish(self) -> Vec<[usize; 3]> {
        self.faces
            .into_iter()
            .filter(|f| f.alive)
            .map(|f| f.vertices)
            .collect()
    }
}

/// Index of the first point maximising `score`
fn argmax<F>(points: &[Vector3<f64>], score: F) -> usize
where
    F: Fn(&Vector3<f64>) -> f64,
{
    let mut best = (0, f64::NEG_INFINITY);
    for (i, p) in points.iter().enumerate() {
        let s = score(p);
        if s > best.1 {
            best = (i, s);
        }
    }
    best.0
}

/// Triangulate unit vectors into counter-clockwise (seen from outside) faces
///
/// Callers must reject coincident points beforehand; a repeated point is
/// reported as [`Degeneracy::Uninsertable`].
pub(super) fn convex_hull(points: &[Vector3<f64>]) -> Result<Vec<[usize; 3]>, Degeneracy> {
    let mut builder = HullBuilder::new(points);
    let simplex = builder.seed_tetrahedron()?;

    let mut last = 0;
    for index in 0..points.len() {
        if simplex.contains(&index) {
            continue;
        }
        last = builder.insert(index, last)?;
    }

    let mut used = vec![false; points.len()];
    for face in builder.faces.iter().filter(|f| f.alive) {
        if face.offset <= ORIGIN_EPSILON {
            return Err(Degeneracy::OriginNotEnclosed);
        }
        for &v in &face.vertices {
            used[v] = true;
        }
    }
    if let Some(index) = used.iter().position(|&u| !u) {
        return Err(Degeneracy::Uninsertable { index });
    }

    Ok(builder.finish())
}
