//! rball - Instrument responses interpolated across the sky
//!
//! A detector's response matrix changes with the direction a photon arrives
//! from. Responses are simulated at a finite set of grid points on the sphere;
//! this crate triangulates those points and blends the three matrices around
//! any requested sky position with barycentric weights.
//!
//! - **Grid** - icosahedral sample points with optional face centroids
//! - **Triangulation** - spherical Delaunay mesh with walking point location
//! - **Coordinates** - adapters from RA/Dec to the instrument frame
//! - **Database** - matrix stack, energy calibration and the movable current
//!   response
//!
//! # Example
//!
//! ```
//! use ndarray::{Array, Array1, Array3};
//! use rball::{GridGenerator, ResponseDatabase};
//!
//! let grid = GridGenerator::new(1, false).generate().unwrap();
//! let n = grid.n_grid_points();
//!
//! let matrices = Array3::from_elem((n, 4, 8), 0.5);
//! let mut db = ResponseDatabase::new(
//!     matrices,
//!     Array1::from(grid.theta().to_vec()),
//!     Array1::from(grid.phi().to_vec()),
//!     Array::linspace(10.0, 1000.0, 5),
//!     Array::linspace(10.0, 1000.0, 9),
//! )
//! .unwrap();
//!
//! db.reposition(10.0, 10.0).unwrap();
//! assert_eq!(db.current().matrix().dim(), (4, 8));
//! ```

pub mod config;
pub mod coords;
pub mod database;
pub mod grid;
pub mod response;
pub mod triangulation;

pub use config::{
    ConfigError, GridConfig, InvalidToleranceError, LocateConfig, RballConfig, SkyPosition,
    MAX_BOUNDARY_TOLERANCE,
};
pub use coords::{CoordinateAdapter, EquatorialAdapter, RotatedFrameAdapter, SphericalPoint};
pub use database::{DatabaseError, ResponseDatabase, ResponseGrid};
pub use grid::{GridError, GridGenerator, GridPoints, MAX_REFINEMENT_LEVEL};
pub use response::{InstrumentResponse, ResponseError};
pub use triangulation::{Degeneracy, Location, MeshError, SphericalTriangulation};
