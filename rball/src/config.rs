//! Configuration for grid generation, point location and the initial
//! database position.
//!
//! Stored as pretty-printed JSON. Missing fields fall back to their defaults
//! so a config file only needs to name what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or saving a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidTolerance(#[from] InvalidToleranceError),
}

/// Largest accepted [`LocateConfig::boundary_tolerance`]
pub const MAX_BOUNDARY_TOLERANCE: f64 = 1e-3;

/// A boundary tolerance that would let weight snapping discard a whole face
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("boundary tolerance must be finite and in [0, 1e-3], got {0}")]
pub struct InvalidToleranceError(pub f64);

/// Sky position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    /// Right ascension in degrees
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
}

impl SkyPosition {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }
}

impl Default for SkyPosition {
    /// The position the first current response is interpolated at
    fn default() -> Self {
        Self { ra: 0.1, dec: 0.1 }
    }
}

/// Icosahedral grid parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of recursive face subdivisions (0 = bare icosahedron)
    pub refinement_level: u32,
    /// Append the centroid of every final face as an extra sample point
    pub include_face_points: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            refinement_level: 2,
            include_face_points: true,
        }
    }
}

/// Point-location parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    /// Normalised barycentric weights below this snap to exactly zero
    pub boundary_tolerance: f64,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            boundary_tolerance: 1e-12,
        }
    }
}

impl LocateConfig {
    /// Check the tolerance lies in `[0, MAX_BOUNDARY_TOLERANCE]`
    pub fn validate(&self) -> Result<(), InvalidToleranceError> {
        let tol = self.boundary_tolerance;
        if !tol.is_finite() || !(0.0..=MAX_BOUNDARY_TOLERANCE).contains(&tol) {
            return Err(InvalidToleranceError(tol));
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RballConfig {
    pub grid: GridConfig,
    pub initial_position: SkyPosition,
    pub locate: LocateConfig,
}

impl RballConfig {
    /// Check values serde cannot constrain
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.locate.validate()?;
        Ok(())
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file and validate
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
