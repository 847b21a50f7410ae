use crate::linalg::LinalgError;
#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

/// Result alias for density construction and evaluation.
pub type DensityResult<T> = Result<T, DensityError>;

#[derive(Debug, Clone, PartialEq)]
pub enum DensityError {
    // ---- Construction ----
    /// Unknown observation family name.
    InvalidFamily { name: String, reason: &'static str },

    /// Unknown statistic request name.
    InvalidCompOut { name: String, reason: &'static str },

    /// Dispersion must be finite and > 0 for families that use it.
    InvalidDispersion { value: f64, reason: &'static str },

    /// Degrees of freedom for a t distribution must be finite and > 0.
    InvalidDegreesOfFreedom { nu: f64 },

    /// A named input has the wrong length or number of rows/columns.
    ShapeMismatch { what: &'static str, expected: usize, found: usize },

    /// A named input holds a non-finite value.
    NonFiniteInput { what: &'static str, index: usize, value: f64 },

    /// A response lies outside the support of its family.
    InvalidResponse { family: &'static str, index: usize, value: f64, reason: &'static str },

    // ---- Evaluation ----
    /// A statistics buffer is shorter than the requested statistic dimension.
    StatBufferTooShort { expected: usize, found: usize },

    /// Underlying factorization or solve failed.
    Linalg(LinalgError),
}

impl std::error::Error for DensityError {}

impl std::fmt::Display for DensityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Construction ----
            DensityError::InvalidFamily { name, reason } => {
                write!(f, "Invalid observation family '{name}': {reason}")
            }
            DensityError::InvalidCompOut { name, reason } => {
                write!(f, "Invalid statistic request '{name}': {reason}")
            }
            DensityError::InvalidDispersion { value, reason } => {
                write!(f, "Invalid dispersion {value}: {reason}")
            }
            DensityError::InvalidDegreesOfFreedom { nu } => {
                write!(f, "Invalid degrees of freedom {nu}, must be finite and > 0")
            }
            DensityError::ShapeMismatch { what, expected, found } => {
                write!(f, "Shape mismatch for {what}: expected {expected}, found {found}")
            }
            DensityError::NonFiniteInput { what, index, value } => {
                write!(f, "Invalid {what} at index {index}: {value}, must be finite")
            }
            DensityError::InvalidResponse { family, index, value, reason } => {
                write!(f, "Invalid response for {family} at index {index}: {value}, {reason}")
            }

            // ---- Evaluation ----
            DensityError::StatBufferTooShort { expected, found } => {
                write!(f, "Statistics buffer too short: need {expected}, found {found}")
            }
            DensityError::Linalg(err) => write!(f, "{err}"),
        }
    }
}

impl From<LinalgError> for DensityError {
    fn from(err: LinalgError) -> Self {
        DensityError::Linalg(err)
    }
}

#[cfg(feature = "python-bindings")]
impl From<DensityError> for PyErr {
    fn from(err: DensityError) -> PyErr {
        PyValueError::new_err(format!("DensityError: {err}"))
    }
}
