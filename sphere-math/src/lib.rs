//! sphere-math - Geometry primitives for data sampled on the unit sphere
//!
//! This crate provides the low-level pieces used by the response
//! interpolation engine:
//!
//! - **Spherical coordinates** - lon/lat <-> unit vector conversions,
//!   angular separations and oriented triple products
//! - **Occultation** - Earth-shadow test for a spacecraft in orbit
//! - **KdTree** - nearest-neighbour and radius queries over 3D points
//!
//! # Example
//!
//! ```
//! use sphere_math::{lonlat_to_xyz, KdTree};
//!
//! let points = vec![
//!     lonlat_to_xyz(0.0, 0.0),
//!     lonlat_to_xyz(1.0, 0.0),
//!     lonlat_to_xyz(2.0, 0.5),
//! ];
//! let tree = KdTree::build(&points);
//!
//! let (closest, _) = tree.nearest(&lonlat_to_xyz(0.9, 0.1)).unwrap();
//! assert_eq!(closest, 1);
//! ```

pub mod kdtree;
pub mod spherical;

// Re-export commonly used types
pub use kdtree::KdTree;
pub use spherical::{
    angle_between_vectors, is_occulted, lonlat_from_unit, lonlat_to_xyz, radec_to_cartesian,
    triple_product, xyz_to_lonlat, DegenerateVectorError, EARTH_RADIUS_KM,
};
