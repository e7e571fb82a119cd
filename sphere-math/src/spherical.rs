//! Spherical coordinate utilities using nalgebra
//!
//! Conversions between longitude/latitude pairs and unit vectors, angular
//! separations, and the oriented volume test used by the triangulation.

use nalgebra::Vector3;
use thiserror::Error;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Error when a vector is too short to define a direction
#[derive(Error, Debug, Clone, PartialEq)]
#[error("degenerate vector: norm={norm:.6e}")]
pub struct DegenerateVectorError {
    /// The norm of the offending vector
    pub norm: f64,
}

/// Threshold below which a vector is treated as having no direction
const NORM_EPSILON: f64 = 1e-12;

/// Convert longitude/latitude in radians to a unit vector
///
/// # Arguments
/// * `lon` - Longitude in radians, measured from +X toward +Y
/// * `lat` - Latitude in radians, positive toward +Z
pub fn lonlat_to_xyz(lon: f64, lat: f64) -> Vector3<f64> {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// Convert a Cartesian vector to longitude/latitude in radians
///
/// Longitude is returned in (-π, π], latitude in [-π/2, π/2].
///
/// # Returns
/// * `Ok((lon, lat))` - Direction of the vector
/// * `Err(DegenerateVectorError)` - If the vector has (near) zero length
pub fn xyz_to_lonlat(v: &Vector3<f64>) -> Result<(f64, f64), DegenerateVectorError> {
    let norm = v.norm();
    if norm < NORM_EPSILON {
        return Err(DegenerateVectorError { norm });
    }

    let lat = (v.z / norm).clamp(-1.0, 1.0).asin();
    let lon = v.y.atan2(v.x);
    Ok((lon, lat))
}

/// Longitude/latitude in radians of a vector already known to be unit length
///
/// Unlike [`xyz_to_lonlat`] this never fails; the z component is clamped so
/// rounding just past ±1 still maps onto a pole.
pub fn lonlat_from_unit(v: &Vector3<f64>) -> (f64, f64) {
    (v.y.atan2(v.x), v.z.clamp(-1.0, 1.0).asin())
}

/// Convert right ascension / declination in degrees to a unit vector
pub fn radec_to_cartesian(ra_deg: f64, dec_deg: f64) -> Vector3<f64> {
    lonlat_to_xyz(ra_deg.to_radians(), dec_deg.to_radians())
}

/// Compute the angle between two 3D vectors in radians
///
/// Returns 0 when either vector is degenerate.
pub fn angle_between_vectors(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let mag1 = v1.norm();
    let mag2 = v2.norm();

    if mag1 < f64::EPSILON || mag2 < f64::EPSILON {
        return 0.0;
    }

    let cos_angle = (v1.dot(v2) / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos()
}

/// Scalar triple product `a · (b × c)`
///
/// Positive when `a`, `b`, `c` form a right-handed (counter-clockwise seen
/// from outside the sphere) triple.
#[inline]
pub fn triple_product(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    a.dot(&b.cross(c))
}

/// Check whether a sky position is hidden behind the Earth
///
/// The Earth is treated as a sphere of radius [`EARTH_RADIUS_KM`] centred at
/// the origin; the spacecraft sits at `spacecraft_position_km`. A source is
/// occulted when its direction lies closer to the Earth centre direction than
/// the spacecraft's horizon angle.
///
/// # Arguments
/// * `ra_deg` - Source right ascension in degrees
/// * `dec_deg` - Source declination in degrees
/// * `spacecraft_position_km` - Spacecraft position in the same frame, in km
pub fn is_occulted(ra_deg: f64, dec_deg: f64, spacecraft_position_km: &Vector3<f64>) -> bool {
    let spacecraft_radius = spacecraft_position_km.norm();

    // Inside the Earth nothing is visible; avoid acos of a ratio > 1
    if spacecraft_radius <= EARTH_RADIUS_KM {
        return true;
    }

    let horizon_angle =
        std::f64::consts::FRAC_PI_2 - (EARTH_RADIUS_KM / spacecraft_radius).acos();

    let source = radec_to_cartesian(ra_deg, dec_deg);
    let separation = angle_between_vectors(&source, &(-spacecraft_position_km));

    separation < horizon_angle
}
