//! Coordinate adapters from sky positions to mesh coordinates
//!
//! The response grid is sampled in the instrument's own spherical frame. An
//! adapter turns an externally supplied right ascension / declination into
//! that frame so the geometry core never needs to know about spacecraft
//! attitude.

use nalgebra::{Rotation3, Vector3};
use sphere_math::{lonlat_from_unit, radec_to_cartesian};

/// Position in the mesh's native frame, radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalPoint {
    /// Longitude (azimuth, the database `phi`) in radians
    pub lon: f64,
    /// Latitude (elevation, the database `theta`) in radians
    pub lat: f64,
}

impl SphericalPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A transform from sky coordinates to the mesh's native coordinates
pub trait CoordinateAdapter {
    /// Convert right ascension / declination in degrees to mesh coordinates
    fn to_native(&self, ra_deg: f64, dec_deg: f64) -> SphericalPoint;
}

/// Identity frame: longitude is RA and latitude is Dec, both in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EquatorialAdapter;

impl CoordinateAdapter for EquatorialAdapter {
    fn to_native(&self, ra_deg: f64, dec_deg: f64) -> SphericalPoint {
        SphericalPoint::new(ra_deg.to_radians(), dec_deg.to_radians())
    }
}

/// Fixed instrument attitude given as a sky-to-instrument rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedFrameAdapter {
    rotation: Rotation3<f64>,
}

impl RotatedFrameAdapter {
    pub fn new(rotation: Rotation3<f64>) -> Self {
        Self { rotation }
    }

    /// Attitude whose boresight (+Z in the instrument frame) points at
    /// (ra, dec), with instrument +Y toward celestial north
    ///
    /// Looking straight at a celestial pole leaves north undefined; the
    /// instrument +Y then follows the +Y sky axis instead.
    pub fn pointing_at(ra_deg: f64, dec_deg: f64) -> Self {
        let z = radec_to_cartesian(ra_deg, dec_deg);

        let north = Vector3::z();
        let east = north.cross(&z);
        let east = if east.norm() < 1e-12 {
            Vector3::y().cross(&z).normalize()
        } else {
            east.normalize()
        };
        let y = z.cross(&east).normalize();
        let x = y.cross(&z).normalize();

        // Rows map sky vectors onto instrument axes
        let sky_to_instrument =
            Rotation3::from_matrix_unchecked(nalgebra::Matrix3::from_rows(&[
                x.transpose(),
                y.transpose(),
                z.transpose(),
            ]));

        Self::new(sky_to_instrument)
    }

    pub fn rotation(&self) -> &Rotation3<f64> {
        &self.rotation
    }
}

impl CoordinateAdapter for RotatedFrameAdapter {
    fn to_native(&self, ra_deg: f64, dec_deg: f64) -> SphericalPoint {
        let instrument = self.rotation * radec_to_cartesian(ra_deg, dec_deg);
        let (lon, lat) = lonlat_from_unit(&instrument);
        SphericalPoint::new(lon, lat)
    }
}

impl<F> CoordinateAdapter for F
where
    F: Fn(f64, f64) -> SphericalPoint,
{
    fn to_native(&self, ra_deg: f64, dec_deg: f64) -> SphericalPoint {
        self(ra_deg, dec_deg)
    }
}
