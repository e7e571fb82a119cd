//! Icosahedral sample grid on the unit sphere.
//!
//! The grid starts from a pole-aligned icosahedron and recursively splits
//! every triangular face into four through its normalised edge midpoints.
//! Optionally the normalised centroid of every final face is appended, which
//! brings the point distribution closer to equal-area while keeping the
//! triangulation fast.
//!
//! # Point counts
//!
//! | Level | Vertices | Faces | With face points |
//! |-------|----------|-------|------------------|
//! | 0     | 12       | 20    | 32               |
//! | 1     | 42       | 80    | 122              |
//! | 2     | 162      | 320   | 482              |
//! | L     | 10·4^L+2 | 20·4^L| 30·4^L+2         |

use std::collections::HashMap;

use nalgebra::Vector3;
use sphere_math::{lonlat_from_unit, lonlat_to_xyz};
use thiserror::Error;

use crate::config::GridConfig;

/// Deepest refinement accepted; level 9 already holds ~2.6 million vertices
pub const MAX_REFINEMENT_LEVEL: u32 = 9;

/// Errors raised while generating a grid
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("refinement level {level} exceeds the maximum of {max}")]
    RefinementTooDeep { level: u32, max: u32 },
}

/// Sample points produced by [`GridGenerator::generate`]
///
/// All arrays share one ordering: index `i` of `lons`, `lats` and `xyz`
/// describes the same sample.
#[derive(Debug, Clone)]
pub struct GridPoints {
    lons: Vec<f64>,
    lats: Vec<f64>,
    xyz: Vec<Vector3<f64>>,
    faces: Vec<[usize; 3]>,
}

impl GridPoints {
    /// Number of sample points
    pub fn n_grid_points(&self) -> usize {
        self.xyz.len()
    }

    /// Longitudes in radians
    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// Latitudes in radians
    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    /// Azimuthal angle, identical to [`GridPoints::lons`]
    pub fn phi(&self) -> &[f64] {
        &self.lons
    }

    /// Elevation angle, identical to [`GridPoints::lats`]
    pub fn theta(&self) -> &[f64] {
        &self.lats
    }

    /// Cartesian unit vectors of the sample points
    pub fn xyz(&self) -> &[Vector3<f64>] {
        &self.xyz
    }

    /// Faces of the refined icosahedron, before face points are added
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }
}

/// Generates icosahedral sample grids at a chosen refinement level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGenerator {
    refinement_level: u32,
    include_face_points: bool,
}

impl Default for GridGenerator {
    fn default() -> Self {
        Self::from_config(&GridConfig::default())
    }
}

impl GridGenerator {
    pub fn new(refinement_level: u32, include_face_points: bool) -> Self {
        Self {
            refinement_level,
            include_face_points,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(config.refinement_level, config.include_face_points)
    }

    pub fn refinement_level(&self) -> u32 {
        self.refinement_level
    }

    pub fn include_face_points(&self) -> bool {
        self.include_face_points
    }

    /// Number of points `generate` will produce
    pub fn expected_point_count(&self) -> usize {
        let scale = 4_usize.pow(self.refinement_level);
        let vertices = 10 * scale + 2;
        if self.include_face_points {
            vertices + 20 * scale
        } else {
            vertices
        }
    }

    /// Build the grid
    ///
    /// # Returns
    /// * `Ok(GridPoints)` - Vertices first, then face centroids if enabled
    /// * `Err(GridError::RefinementTooDeep)` - Level above [`MAX_REFINEMENT_LEVEL`]
    pub fn generate(&self) -> Result<GridPoints, GridError> {
        if self.refinement_level > MAX_REFINEMENT_LEVEL {
            return Err(GridError::RefinementTooDeep {
                level: self.refinement_level,
                max: MAX_REFINEMENT_LEVEL,
            });
        }

        let (mut xyz, mut faces) = base_icosahedron();
        for _ in 0..self.refinement_level {
            faces = subdivide(&mut xyz, &faces);
        }

        if self.include_face_points {
            xyz.reserve(faces.len());
            for [a, b, c] in &faces {
                let centroid = (xyz[*a] + xyz[*b] + xyz[*c]).normalize();
                xyz.push(centroid);
            }
        }

        let mut lons = Vec::with_capacity(xyz.len());
        let mut lats = Vec::with_capacity(xyz.len());
        for v in &xyz {
            let (lon, lat) = lonlat_from_unit(v);
            lons.push(lon);
            lats.push(lat);
        }

        log::debug!(
            "generated icosahedral grid: level={}, face_points={}, points={}",
            self.refinement_level,
            self.include_face_points,
            xyz.len()
        );

        Ok(GridPoints {
            lons,
            lats,
            xyz,
            faces,
        })
    }
}

/// The 12 vertices and 20 faces of a pole-aligned icosahedron
///
/// Vertex 0 is the north pole, 1-5 the upper ring at latitude atan(1/2),
/// 6-10 the lower ring rotated by 36°, and 11 the south pole.
fn base_icosahedron() -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let ring_lat = 0.5_f64.atan();
    let step = 72.0_f64.to_radians();
    let offset = 36.0_f64.to_radians();

    let mut vertices = Vec::with_capacity(12);
    vertices.push(Vector3::new(0.0, 0.0, 1.0));
    for i in 0..5 {
        vertices.push(lonlat_to_xyz(i as f64 * step, ring_lat));
    }
    for i in 0..5 {
        vertices.push(lonlat_to_xyz(i as f64 * step + offset, -ring_lat));
    }
    vertices.push(Vector3::new(0.0, 0.0, -1.0));

    let mut faces = Vec::with_capacity(20);
    for i in 0..5 {
        let u0 = 1 + i;
        let u1 = 1 + (i + 1) % 5;
        let l0 = 6 + i;
        let l1 = 6 + (i + 1) % 5;

        faces.push([0, u0, u1]);
        faces.push([u0, l0, u1]);
        faces.push([u1, l0, l1]);
        faces.push([11, l1, l0]);
    }

    (vertices, faces)
}

/// Split every face into four, appending shared edge midpoints to `vertices`
fn subdivide(vertices: &mut Vec<Vector3<f64>>, faces: &[[usize; 3]]) -> Vec<[usize; 3]> {
    let mut midpoints: HashMap<(usize, usize), usize> = HashMap::with_capacity(faces.len() * 3 / 2);
    let mut refined = Vec::with_capacity(faces.len() * 4);

    for &[a, b, c] in faces {
        let ab = midpoint_index(vertices, &mut midpoints, a, b);
        let bc = midpoint_index(vertices, &mut midpoints, b, c);
        let ca = midpoint_index(vertices, &mut midpoints, c, a);

        refined.push([a, ab, ca]);
        refined.push([ab, b, bc]);
        refined.push([ca, bc, c]);
        refined.push([ab, bc, ca]);
    }

    refined
}

/// Index of the normalised midpoint of edge (a, b), created on first use
fn midpoint_index(
    vertices: &mut Vec<Vector3<f64>>,
    midpoints: &mut HashMap<(usize, usize), usize>,
    a: usize,
    b: usize,
) -> usize {
    let key = (a.min(b), a.max(b));
    if let Some(&index) = midpoints.get(&key) {
        return index;
    }

    let mid = (vertices[a] + vertices[b]).normalize();
    vertices.push(mid);
    let index = vertices.len() - 1;
    midpoints.insert(key, index);
    index
}
