//! densities::mv_norm — multivariate normal prior and linear-Gaussian transition.
//!
//! Purpose
//! -------
//! Provide the Gaussian building blocks of the state model: [`MvNorm`], a
//! fixed-mean normal used for the initial prior, for transitions frozen at a
//! previous state, and as the normal proposal; and [`MvNormReg`], the
//! transition `x_t | x_{t-1} ~ N(F x_{t-1}, Q)`.
//!
//! Key behaviors
//! -------------
//! - Covariances are held through a shared `Arc<CholFactor>`, so freezing a
//!   transition per particle never refactorizes `Q`.
//! - [`MvNorm`] implements [`ConditionalDensity`] with analytic gradient
//!   `-Σ⁻¹(x - μ)` and Hessian `-Σ⁻¹`; it carries no statistics.
//! - [`MvNormReg`] carries gradient statistics w.r.t. `F` and `Q`.
//!
//! Conventions
//! -----------
//! - Statistics of [`MvNormReg`] for a gradient request are `2r²` entries:
//!   `∂/∂F` (column-major) followed by `∂/∂Q` (column-major), with
//!   `e = x - F x_prev`:
//!   - `∂/∂F = Q⁻¹ e x_prevᵀ`
//!   - `∂/∂Q = ½ (Q⁻¹ e eᵀ Q⁻¹ - Q⁻¹)`
//! - No Hessian statistics are produced for the state model; a Hessian
//!   request yields the same `2r²` gradient block.
use crate::{
    densities::{
        errors::{DensityError, DensityResult},
        traits::{CompOut, ConditionalDensity, TransitionDensity, ensure_stat_len},
    },
    linalg::CholFactor,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};
use rand::Rng;
use rand_distr::StandardNormal;
use std::{f64::consts::PI, sync::Arc};

/// Multivariate normal `N(μ, Σ)` backed by a shared Cholesky factor.
#[derive(Debug, Clone)]
pub struct MvNorm {
    mean: Array1<f64>,
    chol: Arc<CholFactor>,
}

impl MvNorm {
    /// Build from a mean and covariance, factorizing the covariance.
    ///
    /// # Errors
    /// - `DensityError::Linalg` if `cov` is not SPD.
    /// - [`DensityError::ShapeMismatch`] if `mean` and `cov` disagree.
    pub fn new(mean: Array1<f64>, cov: &Array2<f64>) -> DensityResult<Self> {
        let chol = Arc::new(CholFactor::new(cov)?);
        Self::from_factor(mean, chol)
    }

    /// Build from a mean and an already factorized covariance.
    pub fn from_factor(mean: Array1<f64>, chol: Arc<CholFactor>) -> DensityResult<Self> {
        if mean.len() != chol.dim() {
            return Err(DensityError::ShapeMismatch {
                what: "normal mean",
                expected: chol.dim(),
                found: mean.len(),
            });
        }
        Ok(Self { mean, chol })
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        self.chol.original()
    }

    pub fn factor(&self) -> &Arc<CholFactor> {
        &self.chol
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// `log N(x; μ, Σ)`.
    pub fn log_density(&self, x: ArrayView1<'_, f64>) -> DensityResult<f64> {
        self.check_dim(x.len())?;
        let diff = &x - &self.mean;
        let maha = self.chol.mahalanobis(diff.view())?;
        let k = self.dim() as f64;
        Ok(-0.5 * (k * (2.0 * PI).ln() + self.chol.log_det() + maha))
    }

    /// Draw `μ + Rᵀz` with `z ~ N(0, I)`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DensityResult<Array1<f64>> {
        let z: Array1<f64> = (0..self.dim()).map(|_| rng.sample(StandardNormal)).collect();
        let shift = self.chol.mult_half(z.view(), false)?;
        Ok(&self.mean + &shift)
    }

    fn check_dim(&self, found: usize) -> DensityResult<()> {
        if found != self.dim() {
            return Err(DensityError::ShapeMismatch { what: "state", expected: self.dim(), found });
        }
        Ok(())
    }
}

impl ConditionalDensity for MvNorm {
    fn state_dim(&self) -> usize {
        self.dim()
    }

    fn log_density_state(
        &self, x: ArrayView1<'_, f64>, gr: Option<&mut Array1<f64>>,
        hess: Option<&mut Array2<f64>>,
    ) -> DensityResult<f64> {
        self.check_dim(x.len())?;
        if let Some(gr) = gr {
            let diff = &x - &self.mean;
            *gr -= &self.chol.solve(diff.view())?;
        }
        if let Some(hess) = hess {
            *hess -= self.chol.inverse();
        }
        self.log_density(x)
    }

    fn comp_stats_state_only(
        &self, _x: ArrayView1<'_, f64>, _stats: ArrayViewMut1<'_, f64>, _what: CompOut,
    ) -> DensityResult<()> {
        Ok(())
    }
}

/// Linear-Gaussian transition `x_t | x_{t-1} ~ N(F x_{t-1}, Q)`.
#[derive(Debug, Clone)]
pub struct MvNormReg {
    f: Array2<f64>,
    q: Arc<CholFactor>,
}

impl MvNormReg {
    pub fn new(f: Array2<f64>, q: Arc<CholFactor>) -> DensityResult<Self> {
        let r = q.dim();
        if f.nrows() != r {
            return Err(DensityError::ShapeMismatch {
                what: "transition matrix rows",
                expected: r,
                found: f.nrows(),
            });
        }
        if f.ncols() != r {
            return Err(DensityError::ShapeMismatch {
                what: "transition matrix columns",
                expected: r,
                found: f.ncols(),
            });
        }
        Ok(Self { f, q })
    }

    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.f
    }

    /// `F x_prev`.
    pub fn mean_given(&self, x_prev: ArrayView1<'_, f64>) -> Array1<f64> {
        self.f.dot(&x_prev)
    }
}

impl TransitionDensity for MvNormReg {
    fn state_dim(&self) -> usize {
        self.q.dim()
    }

    fn log_density_state_given(
        &self, x_prev: ArrayView1<'_, f64>, x: ArrayView1<'_, f64>,
    ) -> DensityResult<f64> {
        self.conditional(x_prev)?.log_density(x)
    }

    fn comp_stats_state_state(
        &self, x_prev: ArrayView1<'_, f64>, x: ArrayView1<'_, f64>,
        mut stats: ArrayViewMut1<'_, f64>, what: CompOut,
    ) -> DensityResult<()> {
        if !what.wants_gradient() {
            return Ok(());
        }
        let r = self.state_dim();
        ensure_stat_len(&stats, 2 * r * r)?;

        let e = &x - &self.mean_given(x_prev);
        let qi_e = self.q.solve(e.view())?;
        let q_inv = self.q.inverse();
        for j in 0..r {
            for i in 0..r {
                stats[j * r + i] += qi_e[i] * x_prev[j];
                stats[r * r + j * r + i] += 0.5 * (qi_e[i] * qi_e[j] - q_inv[[i, j]]);
            }
        }
        Ok(())
    }

    fn conditional(&self, x_prev: ArrayView1<'_, f64>) -> DensityResult<MvNorm> {
        MvNorm::from_factor(self.mean_given(x_prev), Arc::clone(&self.q))
    }

    fn state_stat_dim_grad(&self, what: CompOut) -> usize {
        let r = self.state_dim();
        if what.wants_gradient() { 2 * r * r } else { 0 }
    }

    fn state_stat_dim_hess(&self, _what: CompOut) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Normal log-density against a closed form, and its derivatives.
    // - Sample moments of `MvNorm::sample`.
    // - Transition statistics against finite differences in F and Q.
    //
    // They intentionally DO NOT cover:
    // - Near-singular covariances.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check the normal log-density and its derivative contributions.
    //
    // Given
    // -----
    // - N((-1, 1), [[4, 2], [2, 6]]) evaluated at (0.5, 0.2), with gradient
    //   and Hessian buffers pre-filled with ones.
    //
    // Expect
    // ------
    // - Log-density equal to the closed form and buffers equal to
    //   `1 - Σ⁻¹(x - μ)` and `1 - Σ⁻¹`.
    fn mv_norm_log_density_and_derivatives_match_closed_form() {
        // Arrange
        let dist = MvNorm::new(array![-1.0, 1.0], &array![[4.0, 2.0], [2.0, 6.0]]).unwrap();
        let x = array![0.5, 0.2];
        let q_inv = array![[6.0, -2.0], [-2.0, 4.0]] / 20.0;
        let diff = array![1.5, -0.8];
        let mut gr = Array1::ones(2);
        let mut hess = Array2::ones((2, 2));

        // Act
        let ll = dist.log_density_state(x.view(), Some(&mut gr), Some(&mut hess)).unwrap();

        // Assert
        let expected = -(2.0 * PI).ln() - 0.5 * 20f64.ln() - 0.5 * diff.dot(&q_inv.dot(&diff));
        assert_abs_diff_eq!(ll, expected, epsilon = 1e-12);
        let g_ref = q_inv.dot(&diff);
        for i in 0..2 {
            assert_abs_diff_eq!(gr[i], 1.0 - g_ref[i], epsilon = 1e-12);
            for j in 0..2 {
                assert_abs_diff_eq!(hess[[i, j]], 1.0 - q_inv[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Draws reproduce the mean and covariance.
    //
    // Given
    // -----
    // - 40_000 seeded draws from N((2, -1), [[1, 0.6], [0.6, 2]]).
    //
    // Expect
    // ------
    // - Sample mean and covariance within Monte Carlo tolerance.
    fn mv_norm_sample_matches_moments() {
        let dist = MvNorm::new(array![2.0, -1.0], &array![[1.0, 0.6], [0.6, 2.0]]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n = 40_000;
        let draws: Vec<Array1<f64>> = (0..n).map(|_| dist.sample(&mut rng).unwrap()).collect();

        let mean = draws.iter().fold(Array1::<f64>::zeros(2), |acc, d| acc + d) / n as f64;
        let mut cov = Array2::<f64>::zeros((2, 2));
        for d in &draws {
            let c = d - &mean;
            for i in 0..2 {
                for j in 0..2 {
                    cov[[i, j]] += c[i] * c[j] / n as f64;
                }
            }
        }

        assert_abs_diff_eq!(mean[0], 2.0, epsilon = 0.03);
        assert_abs_diff_eq!(mean[1], -1.0, epsilon = 0.03);
        assert_abs_diff_eq!(cov[[0, 1]], 0.6, epsilon = 0.05);
        assert_abs_diff_eq!(cov[[1, 1]], 2.0, epsilon = 0.08);
    }

    #[test]
    // Purpose
    // -------
    // Transition statistics equal the derivatives of the log-density w.r.t.
    // F and Q, and they accumulate.
    //
    // Given
    // -----
    // - A 2-dimensional transition, one move x_prev → x, and central
    //   differences over every entry of F and Q.
    //
    // Expect
    // ------
    // - Agreement to 1e-6; a second call from a buffer of ones adds the same
    //   increment.
    fn mv_norm_reg_stats_match_finite_differences() {
        // Arrange
        let f = array![[0.8, 0.1], [-0.2, 0.5]];
        let q = array![[1.0, 0.3], [0.3, 0.7]];
        let x_prev = array![0.4, -1.1];
        let x = array![0.9, 0.2];
        let build = |f: &Array2<f64>, q: &Array2<f64>| {
            MvNormReg::new(f.clone(), Arc::new(CholFactor::new(q).unwrap())).unwrap()
        };
        let dist = build(&f, &q);
        let mut stats = Array1::<f64>::zeros(8);

        // Act
        dist.comp_stats_state_state(x_prev.view(), x.view(), stats.view_mut(), CompOut::Gradient)
            .unwrap();

        // Assert
        let h = 1e-6;
        for j in 0..2 {
            for i in 0..2 {
                let mut fp = f.clone();
                let mut fm = f.clone();
                fp[[i, j]] += h;
                fm[[i, j]] -= h;
                let d = (build(&fp, &q).log_density_state_given(x_prev.view(), x.view()).unwrap()
                    - build(&fm, &q).log_density_state_given(x_prev.view(), x.view()).unwrap())
                    / (2.0 * h);
                assert_abs_diff_eq!(stats[j * 2 + i], d, epsilon = 1e-6);
            }
        }
        // Q is perturbed symmetrically, so compare with the sum of both entries.
        let mut qp = q.clone();
        let mut qm = q.clone();
        qp[[0, 1]] += h;
        qp[[1, 0]] += h;
        qm[[0, 1]] -= h;
        qm[[1, 0]] -= h;
        let d = (build(&f, &qp).log_density_state_given(x_prev.view(), x.view()).unwrap()
            - build(&f, &qm).log_density_state_given(x_prev.view(), x.view()).unwrap())
            / (2.0 * h);
        assert_abs_diff_eq!(stats[4 + 2] + stats[4 + 1], d, epsilon = 1e-6);

        let mut ones = Array1::<f64>::ones(8);
        dist.comp_stats_state_state(x_prev.view(), x.view(), ones.view_mut(), CompOut::Hessian)
            .unwrap();
        for k in 0..8 {
            assert_abs_diff_eq!(ones[k], stats[k] + 1.0, epsilon = 1e-14);
        }
        assert_eq!(dist.state_stat_dim(CompOut::LogDensity), 0);
        assert_eq!(dist.state_stat_dim(CompOut::Hessian), 8);
    }
}
