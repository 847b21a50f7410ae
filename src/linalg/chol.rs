//! linalg::chol — cached Cholesky factor of a symmetric positive-definite matrix.
//!
//! Purpose
//! -------
//! Wrap a one-time Cholesky factorization `X = RᵀR` (`R` upper triangular)
//! and expose the handful of solves and products the densities and the
//! proposal builder need: full solves, half solves, half multiplies, the
//! log-determinant and a lazily computed inverse.
//!
//! Key behaviors
//! -------------
//! - [`CholFactor::new`] copies the input into a `nalgebra::DMatrix` and
//!   factorizes it once. The factor is immutable afterwards.
//! - [`CholFactor::inverse`] is computed on first access and cached in a
//!   `std::sync::OnceLock`; concurrent callers block until the first caller
//!   finishes and then all read the same matrix.
//! - All vector inputs and outputs are `ndarray` containers; `nalgebra` is
//!   only the factorization backend.
//!
//! Invariants & assumptions
//! ------------------------
//! - The input is square with finite entries. Only the lower triangle is
//!   read by the backend, so callers are responsible for symmetry.
//! - After a successful construction every diagonal entry of `R` is
//!   strictly positive, so triangular solves cannot hit a zero pivot; the
//!   `SingularTriangular` path exists only to avoid panicking on backend
//!   `None`s.
//!
//! Conventions
//! -----------
//! - `solve_half(z, false)` returns `R⁻ᵀz` and `solve_half(z, true)` returns
//!   `R⁻¹z`.
//! - `mult_half(z, false)` returns `Rᵀz` and `mult_half(z, true)` returns
//!   `Rz`. With `z ~ N(0, I)`, `Rᵀz` has covariance `X`.
//!
//! Testing notes
//! -------------
//! - Unit tests compare every operation against direct dense computations
//!   on a small SPD matrix, check the non-SPD error path, and exercise the
//!   cached inverse from several threads.
use crate::linalg::errors::{LinalgError, LinalgResult};
use nalgebra::{DMatrix, DVector, linalg::Cholesky};
use ndarray::{Array1, Array2, ArrayView1};
use std::sync::OnceLock;

/// Cholesky factor `X = RᵀR` with a lazily cached inverse.
#[derive(Debug, Clone)]
pub struct CholFactor {
    original: Array2<f64>,
    chol: Cholesky<f64, nalgebra::Dyn>,
    upper: DMatrix<f64>,
    lower: DMatrix<f64>,
    inverse: OnceLock<Array2<f64>>,
}

impl CholFactor {
    /// Factorize a symmetric positive-definite matrix.
    ///
    /// # Errors
    /// - [`LinalgError::NotSquare`] for non-square input.
    /// - [`LinalgError::NonFiniteMatrix`] if any entry is NaN or infinite.
    /// - [`LinalgError::NotPositiveDefinite`] when the backend factorization
    ///   fails.
    pub fn new(x: &Array2<f64>) -> LinalgResult<Self> {
        let (rows, cols) = x.dim();
        if rows != cols {
            return Err(LinalgError::NotSquare { rows, cols });
        }
        if let Some(((row, col), &value)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(LinalgError::NonFiniteMatrix { row, col, value });
        }

        let mut dense = DMatrix::<f64>::zeros(rows, cols);
        fill_dmatrix(x, &mut dense);
        let chol = Cholesky::new(dense).ok_or(LinalgError::NotPositiveDefinite { dim: rows })?;
        let lower = chol.l();
        let upper = lower.transpose();

        Ok(Self { original: x.clone(), chol, upper, lower, inverse: OnceLock::new() })
    }

    /// Dimension of the factorized matrix.
    pub fn dim(&self) -> usize {
        self.original.nrows()
    }

    /// The matrix that was factorized.
    pub fn original(&self) -> &Array2<f64> {
        &self.original
    }

    /// The upper-triangular factor `R` as an `ndarray` matrix.
    pub fn upper(&self) -> Array2<f64> {
        to_array2(&self.upper)
    }

    /// Return `X⁻¹z`.
    pub fn solve(&self, z: ArrayView1<'_, f64>) -> LinalgResult<Array1<f64>> {
        let rhs = self.to_dvector(z)?;
        Ok(to_array1(&self.chol.solve(&rhs)))
    }

    /// Return `R⁻ᵀz`, or `R⁻¹z` when `transpose` is set.
    pub fn solve_half(&self, z: ArrayView1<'_, f64>, transpose: bool) -> LinalgResult<Array1<f64>> {
        let rhs = self.to_dvector(z)?;
        let out = if transpose {
            self.upper.solve_upper_triangular(&rhs)
        } else {
            self.upper.tr_solve_upper_triangular(&rhs)
        };
        out.map(|v| to_array1(&v)).ok_or(LinalgError::SingularTriangular { dim: self.dim() })
    }

    /// Return `Rᵀz`, or `Rz` when `transpose` is set.
    pub fn mult_half(&self, z: ArrayView1<'_, f64>, transpose: bool) -> LinalgResult<Array1<f64>> {
        let rhs = self.to_dvector(z)?;
        let out = if transpose { &self.upper * rhs } else { &self.lower * rhs };
        Ok(to_array1(&out))
    }

    /// The inverse `X⁻¹`, computed once on first access.
    pub fn inverse(&self) -> &Array2<f64> {
        self.inverse.get_or_init(|| to_array2(&self.chol.inverse()))
    }

    /// `log |X| = 2 Σ log Rᵢᵢ`.
    pub fn log_det(&self) -> f64 {
        self.upper.diagonal().iter().map(|d| 2.0 * d.ln()).sum()
    }

    /// Squared Mahalanobis norm `zᵀX⁻¹z = ‖R⁻ᵀz‖²`.
    pub fn mahalanobis(&self, z: ArrayView1<'_, f64>) -> LinalgResult<f64> {
        let half = self.solve_half(z, false)?;
        Ok(half.dot(&half))
    }

    fn to_dvector(&self, z: ArrayView1<'_, f64>) -> LinalgResult<DVector<f64>> {
        if z.len() != self.dim() {
            return Err(LinalgError::DimMismatch { expected: self.dim(), found: z.len() });
        }
        Ok(DVector::from_iterator(z.len(), z.iter().copied()))
    }
}

// ---- Helper Methods ----

/// Copy an `ndarray` matrix into a pre-sized `nalgebra::DMatrix`.
fn fill_dmatrix(src: &Array2<f64>, dst: &mut DMatrix<f64>) {
    for ((i, j), &v) in src.indexed_iter() {
        dst[(i, j)] = v;
    }
}

fn to_array1(v: &DVector<f64>) -> Array1<f64> {
    v.iter().copied().collect()
}

fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}
