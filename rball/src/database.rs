//! Response database: per-grid-point matrices interpolated to any sky position.
//!
//! The database is split in two parts:
//!
//! - [`ResponseGrid`] is immutable once built. It holds the matrix stack, the
//!   shared energy calibration and the triangulation. It can be shared
//!   between threads behind an `Arc`.
//! - [`ResponseDatabase`] owns one mutable "current" response plus the sky
//!   position that produced it. Repositioning re-runs point location and
//!   overwrites the current matrix in place.
//!
//! Several databases may share one grid, each tracking its own position.
//!
//! # Interpolation
//!
//! The current matrix is the element-wise blend
//! `Σ weight_i · matrix[vertex_i]` over the three corners of the enclosing
//! face. Blending is linear in matrix values; energy axes are never
//! resampled.

use std::sync::Arc;

use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use sphere_math::is_occulted;
use thiserror::Error;

use crate::config::{InvalidToleranceError, LocateConfig, RballConfig, SkyPosition};
use crate::coords::{CoordinateAdapter, EquatorialAdapter, SphericalPoint};
use crate::response::{validate_calibration, InstrumentResponse, ResponseError};
use crate::triangulation::{Degeneracy, Location, MeshError, SphericalTriangulation};

/// Errors building or querying a response database
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatabaseError {
    #[error("{axis} has {found} points but there are {expected} matrices")]
    ShapeMismatch {
        axis: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("matrix {index} has shape {found:?}, expected {expected:?}")]
    MatrixShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error(transparent)]
    InvalidTolerance(#[from] InvalidToleranceError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Immutable matrix stack, energy calibration and triangulation
#[derive(Debug, Clone)]
pub struct ResponseGrid {
    /// Shape (grid points, channels, energy bins)
    matrices: Array3<f64>,
    theta: Array1<f64>,
    phi: Array1<f64>,
    ebounds: Array1<f64>,
    monte_carlo_energies: Array1<f64>,
    triangulation: SphericalTriangulation,
}

impl ResponseGrid {
    /// Validate the five arrays and triangulate the grid
    ///
    /// # Arguments
    /// * `matrices` - Stack of shape (grid points, channels, energy bins)
    /// * `theta` - Latitude of each grid point in radians
    /// * `phi` - Longitude of each grid point in radians
    /// * `ebounds` - Channel edges, channels + 1 values
    /// * `monte_carlo_energies` - Input energy edges, bins + 1 values
    pub fn new(
        matrices: Array3<f64>,
        theta: Array1<f64>,
        phi: Array1<f64>,
        ebounds: Array1<f64>,
        monte_carlo_energies: Array1<f64>,
    ) -> Result<Self, DatabaseError> {
        Self::with_locate_config(
            matrices,
            theta,
            phi,
            ebounds,
            monte_carlo_energies,
            LocateConfig::default(),
        )
    }

    pub fn with_locate_config(
        matrices: Array3<f64>,
        theta: Array1<f64>,
        phi: Array1<f64>,
        ebounds: Array1<f64>,
        monte_carlo_energies: Array1<f64>,
        locate_config: LocateConfig,
    ) -> Result<Self, DatabaseError> {
        locate_config.validate()?;
        let (n_grid_points, channels, bins) = matrices.dim();

        for (axis, len) in [("theta", theta.len()), ("phi", phi.len())] {
            if len != n_grid_points {
                log::error!(
                    "{axis} points ({len}) not equal to number of matrices ({n_grid_points})"
                );
                return Err(DatabaseError::ShapeMismatch {
                    axis,
                    found: len,
                    expected: n_grid_points,
                });
            }
        }

        validate_calibration((channels, bins), &ebounds, &monte_carlo_energies)?;

        log::debug!("generating the triangulation over {n_grid_points} grid points");
        let triangulation = SphericalTriangulation::build(&phi.to_vec(), &theta.to_vec())?
            .with_locate_config(locate_config)?;

        Ok(Self {
            matrices,
            theta,
            phi,
            ebounds,
            monte_carlo_energies,
            triangulation,
        })
    }

    /// Stack individually supplied matrices, which must share one shape
    pub fn from_matrices(
        matrices: &[Array2<f64>],
        theta: Array1<f64>,
        phi: Array1<f64>,
        ebounds: Array1<f64>,
        monte_carlo_energies: Array1<f64>,
    ) -> Result<Self, DatabaseError> {
        let Some(first) = matrices.first() else {
            return Err(MeshError::from(Degeneracy::TooFewPoints { count: 0 }).into());
        };

        let expected = first.dim();
        if let Some((index, m)) = matrices
            .iter()
            .enumerate()
            .find(|(_, m)| m.dim() != expected)
        {
            return Err(DatabaseError::MatrixShapeMismatch {
                index,
                expected,
                found: m.dim(),
            });
        }

        let views: Vec<ArrayView2<f64>> = matrices.iter().map(|m| m.view()).collect();
        let stack = ndarray::stack(Axis(0), &views).map_err(|_| DatabaseError::MatrixShapeMismatch {
            index: 0,
            expected,
            found: expected,
        })?;

        Self::new(stack, theta, phi, ebounds, monte_carlo_energies)
    }

    pub fn n_grid_points(&self) -> usize {
        self.matrices.len_of(Axis(0))
    }

    /// (channels, energy bins) shared by every matrix
    pub fn matrix_shape(&self) -> (usize, usize) {
        let (_, channels, bins) = self.matrices.dim();
        (channels, bins)
    }

    pub fn matrices(&self) -> &Array3<f64> {
        &self.matrices
    }

    /// Response matrix sampled at grid point `index`
    pub fn matrix(&self, index: usize) -> ArrayView2<'_, f64> {
        self.matrices.index_axis(Axis(0), index)
    }

    pub fn theta(&self) -> &Array1<f64> {
        &self.theta
    }

    pub fn phi(&self) -> &Array1<f64> {
        &self.phi
    }

    pub fn ebounds(&self) -> &Array1<f64> {
        &self.ebounds
    }

    pub fn monte_carlo_energies(&self) -> &Array1<f64> {
        &self.monte_carlo_energies
    }

    pub fn triangulation(&self) -> &SphericalTriangulation {
        &self.triangulation
    }

    /// Find the enclosing face and weights of a native-frame position
    pub fn locate(&self, point: &SphericalPoint) -> Result<Location, MeshError> {
        self.triangulation.locate_point(point)
    }

    /// Blend the three corner matrices of a location into a new matrix
    pub fn interpolate(&self, location: &Location) -> Array2<f64> {
        let mut out = Array2::zeros(self.matrix_shape());
        self.interpolate_into(location, &mut out);
        out
    }

    /// Blend the three corner matrices of a location into `out`
    ///
    /// `out` must have the grid's matrix shape. Zero-weight corners are
    /// skipped so a vertex hit reproduces that vertex's matrix exactly.
    pub fn interpolate_into(&self, location: &Location, out: &mut Array2<f64>) {
        out.fill(0.0);
        for (&vertex, &weight) in location.vertices.iter().zip(&location.weights) {
            if weight == 0.0 {
                continue;
            }
            out.scaled_add(weight, &self.matrix(vertex));
        }
    }
}

/// A response grid with a movable "current" interpolated response
///
/// Not meant to be repositioned from several threads at once; give each
/// evaluation context its own database over a shared [`ResponseGrid`].
#[derive(Debug)]
pub struct ResponseDatabase<A: CoordinateAdapter = EquatorialAdapter> {
    grid: Arc<ResponseGrid>,
    adapter: A,
    current: InstrumentResponse,
    position: SkyPosition,
}

impl ResponseDatabase<EquatorialAdapter> {
    /// Build a database whose native frame is plain RA/Dec
    pub fn new(
        matrices: Array3<f64>,
        theta: Array1<f64>,
        phi: Array1<f64>,
        ebounds: Array1<f64>,
        monte_carlo_energies: Array1<f64>,
    ) -> Result<Self, DatabaseError> {
        Self::with_adapter(
            matrices,
            theta,
            phi,
            ebounds,
            monte_carlo_energies,
            EquatorialAdapter,
        )
    }
}

impl<A: CoordinateAdapter> ResponseDatabase<A> {
    pub fn with_adapter(
        matrices: Array3<f64>,
        theta: Array1<f64>,
        phi: Array1<f64>,
        ebounds: Array1<f64>,
        monte_carlo_energies: Array1<f64>,
        adapter: A,
    ) -> Result<Self, DatabaseError> {
        Self::with_config(
            matrices,
            theta,
            phi,
            ebounds,
            monte_carlo_energies,
            adapter,
            &RballConfig::default(),
        )
    }

    /// Build with an explicit location tolerance and initial position
    ///
    /// The tolerance is validated here as well as in
    /// [`RballConfig::load_from_file`], so configs built in code are checked.
    pub fn with_config(
        matrices: Array3<f64>,
        theta: Array1<f64>,
        phi: Array1<f64>,
        ebounds: Array1<f64>,
        monte_carlo_energies: Array1<f64>,
        adapter: A,
        config: &RballConfig,
    ) -> Result<Self, DatabaseError> {
        let grid = ResponseGrid::with_locate_config(
            matrices,
            theta,
            phi,
            ebounds,
            monte_carlo_energies,
            config.locate,
        )?;
        Self::from_grid(Arc::new(grid), adapter, config.initial_position)
    }

    /// Attach a fresh cursor to an existing (possibly shared) grid
    ///
    /// The current response is interpolated at `initial` before returning, so
    /// a database never exists without one.
    pub fn from_grid(
        grid: Arc<ResponseGrid>,
        adapter: A,
        initial: SkyPosition,
    ) -> Result<Self, DatabaseError> {
        let native = adapter.to_native(initial.ra, initial.dec);
        let location = grid.locate(&native)?;
        let matrix = grid.interpolate(&location);

        let current = InstrumentResponse::new(
            matrix,
            grid.ebounds().clone(),
            grid.monte_carlo_energies().clone(),
        )?;

        log::info!(
            "response database ready: {} grid points, matrix shape {:?}, position ({}, {})",
            grid.n_grid_points(),
            grid.matrix_shape(),
            initial.ra,
            initial.dec
        );

        Ok(Self {
            grid,
            adapter,
            current,
            position: initial,
        })
    }

    /// Move the database to a new sky position (degrees)
    ///
    /// On error the current response and position are left untouched.
    pub fn reposition(&mut self, ra: f64, dec: f64) -> Result<(), DatabaseError> {
        let location = self.locate_sky(ra, dec)?;

        log::debug!(
            "weights: {:?}, indices: {:?}",
            location.weights,
            location.vertices
        );

        self.grid
            .interpolate_into(&location, self.current.matrix_mut());
        self.position = SkyPosition::new(ra, dec);
        Ok(())
    }

    /// Reposition, or zero the response when the Earth blocks the source
    ///
    /// # Arguments
    /// * `spacecraft_position_km` - Spacecraft position relative to the Earth
    ///   centre, in the same frame as (ra, dec)
    ///
    /// # Returns
    /// `Ok(true)` when the position is occulted
    pub fn reposition_unless_occulted(
        &mut self,
        ra: f64,
        dec: f64,
        spacecraft_position_km: &Vector3<f64>,
    ) -> Result<bool, DatabaseError> {
        if is_occulted(ra, dec, spacecraft_position_km) {
            log::debug!("position ({ra}, {dec}) is occulted by the Earth");
            self.current.matrix_mut().fill(0.0);
            self.position = SkyPosition::new(ra, dec);
            return Ok(true);
        }

        self.reposition(ra, dec)?;
        Ok(false)
    }

    /// Interpolated matrix at a sky position without moving the database
    pub fn response_at(&self, ra: f64, dec: f64) -> Result<Array2<f64>, DatabaseError> {
        let location = self.locate_sky(ra, dec)?;
        Ok(self.grid.interpolate(&location))
    }

    /// Enclosing grid points and weights for a sky position
    pub fn locate_sky(&self, ra: f64, dec: f64) -> Result<Location, DatabaseError> {
        let native = self.adapter.to_native(ra, dec);
        Ok(self.grid.locate(&native)?)
    }

    pub fn current(&self) -> &InstrumentResponse {
        &self.current
    }

    /// The (ra, dec) last passed to a reposition call, in degrees
    pub fn current_position(&self) -> (f64, f64) {
        (self.position.ra, self.position.dec)
    }

    pub fn position(&self) -> SkyPosition {
        self.position
    }

    pub fn grid_point_count(&self) -> usize {
        self.grid.n_grid_points()
    }

    /// Unit vectors of the grid points, shape (grid points, 3)
    pub fn grid_points(&self) -> Array2<f64> {
        let points = self.grid.triangulation().points();
        Array2::from_shape_fn((points.len(), 3), |(i, j)| points[i][j])
    }

    /// Mesh edges for diagnostic rendering
    pub fn segments(&self) -> Vec<(usize, usize)> {
        self.grid.triangulation().segments()
    }

    pub fn ebounds(&self) -> &Array1<f64> {
        self.grid.ebounds()
    }

    pub fn monte_carlo_energies(&self) -> &Array1<f64> {
        self.grid.monte_carlo_energies()
    }

    pub fn grid(&self) -> &Arc<ResponseGrid> {
        &self.grid
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }
}
