//! densities::glm — observation density of a generalized linear mixed model
//! for one period.
//!
//! Purpose
//! -------
//! Evaluate `Σᵢ wᵢ ℓ(yᵢ; ηᵢ)` with linear predictor
//! `ηᵢ = xᵢᵀβ + zᵢᵀ state + offsetᵢ`, its gradient and Hessian w.r.t. the
//! state (for the mode finder), and its gradient and Hessian w.r.t. the
//! fixed effects `β` (the per-particle observation statistics).
//!
//! Key behaviors
//! -------------
//! - The fixed part `xᵢᵀβ + offsetᵢ` is computed once at construction.
//! - State and fixed-effect derivatives reuse the same per-observation
//!   `(∂ℓ/∂η, ∂²ℓ/∂η²)` from [`Family::d_eta`]; Hessians are built from
//!   symmetric rank-one updates.
//! - Accumulation methods add into caller buffers.
//!
//! Invariants & assumptions
//! ------------------------
//! - `x` is `p × n` and `z` is `r × n`: column `i` belongs to observation `i`.
//! - `y`, `ws` and `offsets` have length `n`; `cfix` has length `p`.
//! - Families with a dispersion parameter require a finite positive one.
//!
//! Conventions
//! -----------
//! - Observation statistics are `[∇_β (p) | ∇²_β (p², column-major)]`.
//! - A density for a period without observations is valid and contributes
//!   zero everywhere.
use crate::{
    densities::{
        errors::{DensityError, DensityResult},
        families::Family,
        traits::{CompOut, ConditionalDensity, ensure_stat_len},
    },
    linalg::{dsyr, symmetrize_upper},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};

/// Observation density for the observations of one period.
#[derive(Debug, Clone)]
pub struct GlmObs {
    family: Family,
    y: Array1<f64>,
    x: Array2<f64>,
    z: Array2<f64>,
    ws: Array1<f64>,
    disp: f64,
    fixed_eta: Array1<f64>,
}

impl GlmObs {
    /// Validate inputs and precompute the fixed part of the linear predictor.
    ///
    /// Parameters
    /// ----------
    /// - `family`: observation family and link.
    /// - `y`: responses (`n`).
    /// - `x`: fixed-effect design (`p × n`).
    /// - `cfix`: fixed effects `β` (`p`).
    /// - `z`: state design (`r × n`).
    /// - `ws`: case weights (`n`).
    /// - `disp`: dispersion; required for `Gamma_log` and
    ///   `gaussian_identity`, ignored otherwise.
    /// - `offsets`: known offsets (`n`).
    ///
    /// Errors
    /// ------
    /// - [`DensityError::ShapeMismatch`] for any inconsistent dimension.
    /// - [`DensityError::InvalidDispersion`] when a required dispersion is
    ///   missing, non-finite or non-positive.
    /// - [`DensityError::NonFiniteInput`] for non-finite responses or weights.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        family: Family, y: Array1<f64>, x: Array2<f64>, cfix: &Array1<f64>, z: Array2<f64>,
        ws: Array1<f64>, disp: Option<f64>, offsets: &Array1<f64>,
    ) -> DensityResult<Self> {
        let n = y.len();
        check_len("case weights", n, ws.len())?;
        check_len("offsets", n, offsets.len())?;
        check_len("fixed-effect design columns", n, x.ncols())?;
        check_len("state design columns", n, z.ncols())?;
        check_len("fixed effects", x.nrows(), cfix.len())?;
        check_finite("response", &y)?;
        check_finite("case weight", &ws)?;
        for (i, &yi) in y.iter().enumerate() {
            family.check_response(i, yi)?;
        }

        let disp = if family.uses_dispersion() {
            match disp {
                Some(d) if d.is_finite() && d > 0.0 => d,
                Some(d) => {
                    return Err(DensityError::InvalidDispersion {
                        value: d,
                        reason: "Dispersion must be finite and > 0.",
                    });
                }
                None => {
                    return Err(DensityError::InvalidDispersion {
                        value: f64::NAN,
                        reason: "Family requires a dispersion parameter.",
                    });
                }
            }
        } else {
            1.0
        };

        let fixed_eta = x.t().dot(cfix) + offsets;
        Ok(Self { family, y, x, z, ws, disp, fixed_eta })
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn n_fixed(&self) -> usize {
        self.x.nrows()
    }

    /// Linear predictor at the given state.
    pub fn eta(&self, state: ArrayView1<'_, f64>) -> Array1<f64> {
        &self.fixed_eta + &self.z.t().dot(&state)
    }
}

impl ConditionalDensity for GlmObs {
    fn state_dim(&self) -> usize {
        self.z.nrows()
    }

    fn log_density_state(
        &self, x: ArrayView1<'_, f64>, gr: Option<&mut Array1<f64>>,
        hess: Option<&mut Array2<f64>>,
    ) -> DensityResult<f64> {
        check_len("state", self.state_dim(), x.len())?;
        let eta = self.eta(x);
        let r = self.state_dim();
        let mut local_hess = hess.as_ref().map(|_| Array2::<f64>::zeros((r, r)));
        let mut gr = gr;

        let mut out = 0.0;
        for i in 0..self.n_obs() {
            let (y, w) = (self.y[i], self.ws[i]);
            out += w * self.family.log_density(y, eta[i], self.disp);
            if gr.is_none() && local_hess.is_none() {
                continue;
            }
            let (d, dd) = self.family.d_eta(y, eta[i], self.disp);
            let zi = self.z.column(i);
            if let Some(g) = gr.as_deref_mut() {
                g.scaled_add(w * d, &zi);
            }
            if let Some(h) = local_hess.as_mut() {
                dsyr(h, zi, w * dd);
            }
        }

        if let (Some(hess), Some(mut local)) = (hess, local_hess) {
            symmetrize_upper(&mut local);
            *hess += &local;
        }
        Ok(out)
    }

    fn comp_stats_state_only(
        &self, x: ArrayView1<'_, f64>, mut stats: ArrayViewMut1<'_, f64>, what: CompOut,
    ) -> DensityResult<()> {
        if !what.wants_gradient() {
            return Ok(());
        }
        let p = self.n_fixed();
        ensure_stat_len(&stats, self.obs_stat_dim(what))?;
        check_len("state", self.state_dim(), x.len())?;

        let eta = self.eta(x);
        let mut hess = what.wants_hessian().then(|| Array2::<f64>::zeros((p, p)));
        for i in 0..self.n_obs() {
            let (d, dd) = self.family.d_eta(self.y[i], eta[i], self.disp);
            let w = self.ws[i];
            let xi = self.x.column(i);
            stats.slice_mut(ndarray::s![..p]).scaled_add(w * d, &xi);
            if let Some(h) = hess.as_mut() {
                dsyr(h, xi, w * dd);
            }
        }

        if let Some(mut h) = hess {
            symmetrize_upper(&mut h);
            for j in 0..p {
                for i in 0..p {
                    stats[p + j * p + i] += h[[i, j]];
                }
            }
        }
        Ok(())
    }

    fn obs_stat_dim_grad(&self, what: CompOut) -> usize {
        if what.wants_gradient() { self.n_fixed() } else { 0 }
    }

    fn obs_stat_dim_hess(&self, what: CompOut) -> usize {
        if what.wants_hessian() { self.n_fixed() * self.n_fixed() } else { 0 }
    }
}

// ---- Helper Methods ----

fn check_len(what: &'static str, expected: usize, found: usize) -> DensityResult<()> {
    if expected != found {
        return Err(DensityError::ShapeMismatch { what, expected, found });
    }
    Ok(())
}

fn check_finite(what: &'static str, v: &Array1<f64>) -> DensityResult<()> {
    if let Some((index, &value)) = v.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(DensityError::NonFiniteInput { what, index, value });
    }
    Ok(())
}
