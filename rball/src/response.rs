//! Instrument response matrix with its energy calibration.

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors validating a response against its energy edges
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    #[error("{name} has {found} edges, expected {expected} for {axis_len} bins")]
    CalibrationMismatch {
        name: &'static str,
        found: usize,
        expected: usize,
        axis_len: usize,
    },

    #[error("{name} must be finite and strictly increasing (violated at edge {index})")]
    NonMonotonicEdges { name: &'static str, index: usize },

    #[error("response matrix must have at least one channel and one energy bin, got {shape:?}")]
    EmptyMatrix { shape: (usize, usize) },

    #[error("replacement matrix has shape {found:?}, expected {expected:?}")]
    ShapeChanged {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// A detector response: output channels × Monte-Carlo input energy bins
///
/// `ebounds` holds the channel edges (channels + 1 values) and
/// `monte_carlo_energies` the simulated input edges (bins + 1 values).
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentResponse {
    matrix: Array2<f64>,
    ebounds: Array1<f64>,
    monte_carlo_energies: Array1<f64>,
}

impl InstrumentResponse {
    pub fn new(
        matrix: Array2<f64>,
        ebounds: Array1<f64>,
        monte_carlo_energies: Array1<f64>,
    ) -> Result<Self, ResponseError> {
        validate_calibration(matrix.dim(), &ebounds, &monte_carlo_energies)?;
        Ok(Self {
            matrix,
            ebounds,
            monte_carlo_energies,
        })
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Shape-preserving mutable access for in-place interpolation
    pub(crate) fn matrix_mut(&mut self) -> &mut Array2<f64> {
        &mut self.matrix
    }

    pub fn ebounds(&self) -> &Array1<f64> {
        &self.ebounds
    }

    pub fn monte_carlo_energies(&self) -> &Array1<f64> {
        &self.monte_carlo_energies
    }

    pub fn n_channels(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_energy_bins(&self) -> usize {
        self.matrix.ncols()
    }

    /// Swap in a new matrix of the same shape, keeping the calibration
    pub fn replace_matrix(&mut self, matrix: Array2<f64>) -> Result<(), ResponseError> {
        if matrix.dim() != self.matrix.dim() {
            return Err(ResponseError::ShapeChanged {
                expected: self.matrix.dim(),
                found: matrix.dim(),
            });
        }
        self.matrix = matrix;
        Ok(())
    }

    pub fn into_matrix(self) -> Array2<f64> {
        self.matrix
    }
}

/// Check edge counts and ordering for a (channels, bins) matrix shape
pub(crate) fn validate_calibration(
    shape: (usize, usize),
    ebounds: &Array1<f64>,
    monte_carlo_energies: &Array1<f64>,
) -> Result<(), ResponseError> {
    let (channels, bins) = shape;
    if channels == 0 || bins == 0 {
        return Err(ResponseError::EmptyMatrix { shape });
    }

    check_edges("ebounds", ebounds, channels)?;
    check_edges("monte_carlo_energies", monte_carlo_energies, bins)?;
    Ok(())
}

fn check_edges(name: &'static str, edges: &Array1<f64>, axis_len: usize) -> Result<(), ResponseError> {
    if edges.len() != axis_len + 1 {
        return Err(ResponseError::CalibrationMismatch {
            name,
            found: edges.len(),
            expected: axis_len + 1,
            axis_len,
        });
    }

    if let Some(index) = edges.iter().position(|e| !e.is_finite()) {
        return Err(ResponseError::NonMonotonicEdges { name, index });
    }

    for i in 1..edges.len() {
        if edges[i] <= edges[i - 1] {
            return Err(ResponseError::NonMonotonicEdges { name, index: i });
        }
    }

    Ok(())
}
