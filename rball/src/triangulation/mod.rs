//! Spherical Delaunay triangulation with point location.
//!
//! The mesh is the convex hull of the grid points projected onto the unit
//! sphere. Every point of the sphere falls inside (or on the boundary of) at
//! least one face, so point location always succeeds on a well-formed mesh.
//!
//! Location seeds a visibility walk at the face of the nearest grid vertex
//! (found through a k-d tree) and steps across the edge the query lies
//! furthest outside of until the enclosing face is reached. Barycentric
//! weights are the planar coordinates of the query's central projection onto
//! that face.

mod hull;

use std::collections::{BTreeSet, HashMap};

use nalgebra::Vector3;
use sphere_math::{lonlat_to_xyz, triple_product, KdTree};
use thiserror::Error;

use crate::config::{InvalidToleranceError, LocateConfig};
use crate::coords::SphericalPoint;

/// Tolerance on raw edge orientation tests; admits queries lying on an edge
const ORIENTATION_EPSILON: f64 = 1e-14;

/// Squared chord length under which two grid points count as coincident
const COINCIDENT_EPSILON: f64 = 1e-12;

/// Why a point set cannot be triangulated over the whole sphere
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Degeneracy {
    #[error("at least 4 points are required, got {count}")]
    TooFewPoints { count: usize },

    #[error("points {first} and {second} coincide")]
    CoincidentPoints { first: usize, second: usize },

    #[error("all points lie in a single plane")]
    Coplanar,

    #[error("points do not surround the sphere centre")]
    OriginNotEnclosed,

    #[error("point {index} could not be inserted into the mesh")]
    Uninsertable { index: usize },

    #[error("coordinate {index} is not finite")]
    NonFinite { index: usize },

    #[error("got {lons} longitudes but {lats} latitudes")]
    LengthMismatch { lons: usize, lats: usize },
}

/// Errors from building or querying a triangulation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("degenerate mesh: {0}")]
    Degenerate(#[from] Degeneracy),

    #[error("query (lon={lon:.6}, lat={lat:.6}) could not be located in the mesh")]
    QueryOutsideMesh { lon: f64, lat: f64 },
}

/// The enclosing face of a query and its barycentric weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Face index into [`SphericalTriangulation::faces`]
    pub face: usize,
    /// Grid point indices of the face corners
    pub vertices: [usize; 3],
    /// Non-negative weights summing to 1, one per entry of `vertices`
    pub weights: [f64; 3],
}

/// Triangulated mesh over a fixed set of sphere points
#[derive(Debug, Clone)]
pub struct SphericalTriangulation {
    lons: Vec<f64>,
    lats: Vec<f64>,
    points: Vec<Vector3<f64>>,
    /// Counter-clockwise seen from outside the sphere
    faces: Vec<[usize; 3]>,
    /// `neighbours[f][k]` is the face across the edge opposite corner `k`
    neighbours: Vec<[usize; 3]>,
    /// Lowest-index face touching each vertex
    vertex_faces: Vec<usize>,
    tree: KdTree,
    locate_config: LocateConfig,
}

impl SphericalTriangulation {
    /// Triangulate points given as longitude/latitude pairs in radians
    ///
    /// # Errors
    /// `MeshError::Degenerate` when fewer than 4 points are given, two points
    /// coincide, or the points cannot cover the sphere.
    pub fn build(lons: &[f64], lats: &[f64]) -> Result<Self, MeshError> {
        if lons.len() != lats.len() {
            return Err(Degeneracy::LengthMismatch {
                lons: lons.len(),
                lats: lats.len(),
            }
            .into());
        }
        if lons.len() < 4 {
            return Err(Degeneracy::TooFewPoints { count: lons.len() }.into());
        }
        if let Some(index) = lons
            .iter()
            .zip(lats)
            .position(|(lon, lat)| !lon.is_finite() || !lat.is_finite())
        {
            return Err(Degeneracy::NonFinite { index }.into());
        }

        let points: Vec<Vector3<f64>> = lons
            .iter()
            .zip(lats)
            .map(|(&lon, &lat)| lonlat_to_xyz(lon, lat))
            .collect();

        let tree = KdTree::build(&points);
        check_coincident(&points, &tree)?;

        let faces = hull::convex_hull(&points)?;
        let neighbours = face_neighbours(&faces)?;

        let mut vertex_faces = vec![usize::MAX; points.len()];
        for (f, face) in faces.iter().enumerate() {
            for &v in face {
                if vertex_faces[v] == usize::MAX {
                    vertex_faces[v] = f;
                }
            }
        }

        log::debug!(
            "triangulated {} points into {} faces",
            points.len(),
            faces.len()
        );

        Ok(Self {
            lons: lons.to_vec(),
            lats: lats.to_vec(),
            points,
            faces,
            neighbours,
            vertex_faces,
            tree,
            locate_config: LocateConfig::default(),
        })
    }

    /// Triangulate a slice of native coordinates
    pub fn from_points(points: &[SphericalPoint]) -> Result<Self, MeshError> {
        let lons: Vec<f64> = points.iter().map(|p| p.lon).collect();
        let lats: Vec<f64> = points.iter().map(|p| p.lat).collect();
        Self::build(&lons, &lats)
    }

    /// Replace the point-location parameters
    ///
    /// # Errors
    /// `InvalidToleranceError` when the boundary tolerance is outside
    /// `[0, MAX_BOUNDARY_TOLERANCE]`.
    pub fn with_locate_config(
        mut self,
        locate_config: LocateConfig,
    ) -> Result<Self, InvalidToleranceError> {
        locate_config.validate()?;
        self.locate_config = locate_config;
        Ok(self)
    }

    pub fn locate_config(&self) -> &LocateConfig {
        &self.locate_config
    }

    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// Unit vectors of the mesh vertices, in input order
    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Index of the grid vertex closest to a position
    pub fn nearest_vertex(&self, lon: f64, lat: f64) -> Option<usize> {
        self.tree
            .nearest(&lonlat_to_xyz(lon, lat))
            .map(|(index, _)| index)
    }

    /// Locate a longitude/latitude pair in radians
    pub fn locate(&self, lon: f64, lat: f64) -> Result<Location, MeshError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(MeshError::QueryOutsideMesh { lon, lat });
        }
        self.locate_xyz(&lonlat_to_xyz(lon, lat))
            .ok_or(MeshError::QueryOutsideMesh { lon, lat })
    }

    pub fn locate_point(&self, point: &SphericalPoint) -> Result<Location, MeshError> {
        self.locate(point.lon, point.lat)
    }

    /// Locate a unit vector, returning `None` for a non-finite query or on
    /// numerical failure
    pub fn locate_xyz(&self, query: &Vector3<f64>) -> Option<Location> {
        if !query.iter().all(|c| c.is_finite()) {
            return None;
        }
        let (nearest, _) = self.tree.nearest(query)?;
        let mut face = self.vertex_faces[nearest];

        // A visibility walk on a Delaunay mesh never revisits a face, so
        // more steps than faces means the geometry has gone wrong.
        for _ in 0..self.faces.len() {
            let tests = self.orientation_tests(face, query);
            let (worst, corner) = tests
                .iter()
                .enumerate()
                .fold((f64::INFINITY, 0), |acc, (k, &t)| if t < acc.0 { (t, k) } else { acc });

            if worst >= -ORIENTATION_EPSILON {
                if let Some(location) = self.barycentric(face, tests) {
                    return Some(location);
                }
                break;
            }
            face = self.neighbours[face][corner];
        }

        log::warn!("location walk did not converge for {query:?}; scanning all faces");
        self.locate_by_scan(query)
    }

    /// First face, in index order, that contains the query
    fn locate_by_scan(&self, query: &Vector3<f64>) -> Option<Location> {
        (0..self.faces.len()).find_map(|face| {
            let tests = self.orientation_tests(face, query);
            if tests.iter().all(|&t| t >= -ORIENTATION_EPSILON) {
                self.barycentric(face, tests)
            } else {
                None
            }
        })
    }

    /// Signed volumes `q·(b×c)`, `q·(c×a)`, `q·(a×b)` for face (a, b, c)
    ///
    /// All are non-negative exactly when `q` lies in the face's spherical
    /// triangle; entry `k` is negative when `q` is beyond the edge opposite
    /// corner `k`.
    fn orientation_tests(&self, face: usize, query: &Vector3<f64>) -> [f64; 3] {
        let [a, b, c] = self.faces[face].map(|v| &self.points[v]);
        [
            triple_product(query, b, c),
            triple_product(query, c, a),
            triple_product(query, a, b),
        ]
    }

    fn barycentric(&self, face: usize, tests: [f64; 3]) -> Option<Location> {
        let total: f64 = tests.iter().sum();
        // Non-positive total means the query points away from this face
        if total.is_nan() || total <= 0.0 {
            return None;
        }

        let tolerance = self.locate_config.boundary_tolerance;
        let mut weights = tests.map(|t| {
            let w = t / total;
            if w < tolerance {
                0.0
            } else {
                w
            }
        });

        let kept: f64 = weights.iter().sum();
        if kept.is_nan() || kept <= 0.0 {
            return None;
        }
        for w in &mut weights {
            *w /= kept;
        }

        Some(Location {
            face,
            vertices: self.faces[face],
            weights,
        })
    }

    /// Unique undirected mesh edges, smaller index first, in sorted order
    pub fn segments(&self) -> Vec<(usize, usize)> {
        let mut segments = BTreeSet::new();
        for &[a, b, c] in &self.faces {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                segments.insert((u.min(v), u.max(v)));
            }
        }
        segments.into_iter().collect()
    }
}

/// Reject point sets containing two (numerically) identical directions
fn check_coincident(points: &[Vector3<f64>], tree: &KdTree) -> Result<(), MeshError> {
    let radius = COINCIDENT_EPSILON.sqrt();
    for (i, p) in points.iter().enumerate() {
        if let Some(&j) = tree.within_radius(p, radius).iter().find(|&&j| j != i) {
            return Err(Degeneracy::CoincidentPoints {
                first: i.min(j),
                second: i.max(j),
            }
            .into());
        }
    }
    Ok(())
}

/// For every face, the faces across the edges opposite each corner
fn face_neighbours(faces: &[[usize; 3]]) -> Result<Vec<[usize; 3]>, Degeneracy> {
    let mut edge_faces: HashMap<(usize, usize), usize> = HashMap::with_capacity(faces.len() * 3);
    for (f, &[a, b, c]) in faces.iter().enumerate() {
        for edge in [(a, b), (b, c), (c, a)] {
            edge_faces.insert(edge, f);
        }
    }

    faces
        .iter()
        .map(|&[a, b, c]| {
            // Opposite corner k: edges (b, c), (c, a), (a, b); the neighbour
            // holds each edge reversed
            let across = |u: usize, v: usize| {
                edge_faces
                    .get(&(v, u))
                    .copied()
                    .ok_or(Degeneracy::Uninsertable { index: u })
            };
            Ok([across(b, c)?, across(c, a)?, across(a, b)?])
        })
        .collect()
}
