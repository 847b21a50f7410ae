//! Error types for the dense linear-algebra helpers.
//!
//! Every fallible routine in [`crate::linalg`] reports through
//! [`LinalgError`]; higher layers wrap it (see `DensityError` and
//! `FilterError`) rather than inspecting the backend directly.
#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

/// Result alias for linear-algebra operations.
pub type LinalgResult<T> = Result<T, LinalgError>;

#[derive(Debug, Clone, PartialEq)]
pub enum LinalgError {
    // ---- Factorization ----
    /// Input to a factorization must be square.
    NotSquare { rows: usize, cols: usize },

    /// Cholesky factorization failed; the matrix is not symmetric positive definite.
    NotPositiveDefinite { dim: usize },

    /// A triangular solve hit a zero pivot.
    SingularTriangular { dim: usize },

    /// Matrix contains a non-finite entry.
    NonFiniteMatrix { row: usize, col: usize, value: f64 },

    // ---- Shapes ----
    /// Operand length does not match the factor dimension.
    DimMismatch { expected: usize, found: usize },
}

impl std::error::Error for LinalgError {}

impl std::fmt::Display for LinalgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Factorization ----
            LinalgError::NotSquare { rows, cols } => {
                write!(f, "Matrix must be square, found ({rows}, {cols})")
            }
            LinalgError::NotPositiveDefinite { dim } => {
                write!(f, "Cholesky decomposition failed: {dim}x{dim} matrix is not positive definite")
            }
            LinalgError::SingularTriangular { dim } => {
                write!(f, "Triangular solve failed: {dim}x{dim} factor has a zero pivot")
            }
            LinalgError::NonFiniteMatrix { row, col, value } => {
                write!(f, "Invalid matrix entry at ({row}, {col}): {value}, must be finite")
            }

            // ---- Shapes ----
            LinalgError::DimMismatch { expected, found } => {
                write!(f, "Dimension mismatch: expected {expected}, found {found}")
            }
        }
    }
}

#[cfg(feature = "python-bindings")]
impl From<LinalgError> for PyErr {
    fn from(err: LinalgError) -> PyErr {
        PyValueError::new_err(format!("LinalgError: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - `Display` output for the factorization variants.
    //
    // They intentionally DO NOT cover:
    // - The `PyErr` conversion, which needs the Python C API.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Ensure the decomposition error names the offending dimension.
    //
    // Given
    // -----
    // - `NotPositiveDefinite { dim: 3 }`.
    //
    // Expect
    // ------
    // - The message mentions `3x3` and positive definiteness.
    fn display_not_positive_definite_mentions_dimension() {
        let msg = LinalgError::NotPositiveDefinite { dim: 3 }.to_string();

        assert!(msg.contains("3x3"));
        assert!(msg.contains("positive definite"));
    }
}
