//! densities::traits — the conditional-density contract.
//!
//! Purpose
//! -------
//! Define the capability interfaces every density component implements so
//! the mode finder, sampler and statistics helper can combine priors,
//! transitions and observation families without knowing their concrete
//! types.
//!
//! Key behaviors
//! -------------
//! - [`ConditionalDensity`] covers densities that depend on the current
//!   state only (priors, observation families). It evaluates the log-density
//!   and adds gradient/Hessian contributions w.r.t. the state, and it
//!   accumulates per-particle sufficient statistics.
//! - [`TransitionDensity`] covers `f(x | x_prev)`. Beyond evaluation and
//!   statistics it can freeze the previous state into a [`MvNorm`] so the
//!   mode finder can treat it as a state-only prior.
//! - [`CompOut`] selects which statistics are requested and parses from
//!   strings.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every accumulation method ADDS into caller buffers. Running the same
//!   call twice adds the same increment twice.
//! - Statistic blocks are laid out as `[gradient | Hessian]`, the Hessian
//!   block column-major.
//! - Implementations are `Send + Sync`; the filter evaluates one density
//!   from many worker threads at once.
//!
//! Conventions
//! -----------
//! - "State" statistics are derivatives w.r.t. parameters of the state
//!   model (e.g. `F` and `Q`); "observation" statistics are derivatives
//!   w.r.t. the fixed effects of the observation model.
//! - A [`CompOut::LogDensity`] request has zero-length statistics for every
//!   density.
use crate::densities::{
    errors::{DensityError, DensityResult},
    mv_norm::MvNorm,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};
use std::str::FromStr;

/// Which sufficient statistics the filter should carry per particle.
///
/// Parsing accepts case-insensitive `"log_density"`, `"gradient"` and
/// `"hessian"`; anything else is [`DensityError::InvalidCompOut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOut {
    LogDensity,
    Gradient,
    Hessian,
}

impl CompOut {
    pub fn wants_gradient(self) -> bool {
        !matches!(self, CompOut::LogDensity)
    }

    pub fn wants_hessian(self) -> bool {
        matches!(self, CompOut::Hessian)
    }
}

impl FromStr for CompOut {
    type Err = DensityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log_density" => Ok(CompOut::LogDensity),
            "gradient" => Ok(CompOut::Gradient),
            "hessian" => Ok(CompOut::Hessian),
            _ => Err(DensityError::InvalidCompOut {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'log_density', 'gradient' or 'Hessian'.",
            }),
        }
    }
}

/// A density term that depends on the current state only.
pub trait ConditionalDensity: Send + Sync {
    /// Dimension of the state vector the density is evaluated at.
    fn state_dim(&self) -> usize;

    /// Log-density at `x`, adding `∇ₓ` into `gr` and `∇²ₓ` into `hess` when given.
    fn log_density_state(
        &self, x: ArrayView1<'_, f64>, gr: Option<&mut Array1<f64>>,
        hess: Option<&mut Array2<f64>>,
    ) -> DensityResult<f64>;

    /// Add this density's statistics at `x` into `stats`.
    ///
    /// `stats` must hold at least `obs_stat_dim(what) + state_stat_dim(what)`
    /// entries: the observation block first, then the state block.
    fn comp_stats_state_only(
        &self, x: ArrayView1<'_, f64>, stats: ArrayViewMut1<'_, f64>, what: CompOut,
    ) -> DensityResult<()>;

    fn state_stat_dim_grad(&self, _what: CompOut) -> usize {
        0
    }

    fn state_stat_dim_hess(&self, _what: CompOut) -> usize {
        0
    }

    fn state_stat_dim(&self, what: CompOut) -> usize {
        self.state_stat_dim_grad(what) + self.state_stat_dim_hess(what)
    }

    fn obs_stat_dim_grad(&self, _what: CompOut) -> usize {
        0
    }

    fn obs_stat_dim_hess(&self, _what: CompOut) -> usize {
        0
    }

    fn obs_stat_dim(&self, what: CompOut) -> usize {
        self.obs_stat_dim_grad(what) + self.obs_stat_dim_hess(what)
    }
}

/// The state transition density `f(x | x_prev)`.
pub trait TransitionDensity: Send + Sync {
    fn state_dim(&self) -> usize;

    /// `log f(x | x_prev)`.
    fn log_density_state_given(
        &self, x_prev: ArrayView1<'_, f64>, x: ArrayView1<'_, f64>,
    ) -> DensityResult<f64>;

    /// Add the state-model statistics for the move `x_prev → x` into `stats`.
    fn comp_stats_state_state(
        &self, x_prev: ArrayView1<'_, f64>, x: ArrayView1<'_, f64>, stats: ArrayViewMut1<'_, f64>,
        what: CompOut,
    ) -> DensityResult<()>;

    /// The density of `x` with `x_prev` held fixed.
    fn conditional(&self, x_prev: ArrayView1<'_, f64>) -> DensityResult<MvNorm>;

    fn state_stat_dim_grad(&self, what: CompOut) -> usize;

    fn state_stat_dim_hess(&self, what: CompOut) -> usize;

    fn state_stat_dim(&self, what: CompOut) -> usize {
        self.state_stat_dim_grad(what) + self.state_stat_dim_hess(what)
    }
}

/// Check that a statistics buffer can hold `needed` entries.
pub(crate) fn ensure_stat_len(stats: &ArrayViewMut1<'_, f64>, needed: usize) -> DensityResult<()> {
    if stats.len() < needed {
        return Err(DensityError::StatBufferTooShort { expected: needed, found: stats.len() });
    }
    Ok(())
}
