//! filter::stats — importance weights and per-particle statistics.
//!
//! Purpose
//! -------
//! Fill `ws` and `stats` of a freshly sampled cloud.
//!
//! Key behaviors
//! -------------
//! - First period: `wsᵢ = −ln N + log N(xᵢ; mu0, Q0) + log g(y₀ | xᵢ) − log q(xᵢ)`
//!   and `statsᵢ = [obs-stats(xᵢ) | 0]`.
//! - Later periods, with `a = parents[i]`:
//!   `wsᵢ = ln w̄_prev[a] + log f(xᵢ | x_prev[a]) + log g(y_t | xᵢ) − log qᵢ(xᵢ)`
//!   and `statsᵢ = stats_prev[a] + [obs-stats(xᵢ) | trans-stats(x_prev[a] → xᵢ)]`.
//! - With these weights `log Σ exp(wsᵢ)` estimates `log p(y_t | y_{0:t-1})`.
//!
//! Invariants & assumptions
//! ------------------------
//! - The previous cloud still holds its normalized weights and statistics.
//! - Statistics are laid out `[observation block | state block]`; the block
//!   sizes come from the densities for `ctrl.what_stat`.
//! - A NaN weight, a `+∞` weight or a non-finite statistic increment aborts
//!   with [`FilterError::NonFiniteStatistic`]. `−∞` weights are valid.
use crate::{
    densities::{ConditionalDensity, TransitionDensity},
    filter::{
        cloud::ParticleCloud,
        errors::{FilterError, FilterResult},
        problem::StateSpaceModel,
    },
    linalg::AddBack,
};
use ndarray::{Array1, Array2, s};
use rayon::prelude::*;

/// Set weights and statistics of the first cloud.
pub fn set_ll_n_stat_first<M: StateSpaceModel + ?Sized>(
    model: &M, cloud: &mut ParticleCloud, dist_t: &dyn ConditionalDensity,
) -> FilterResult<()> {
    let ctrl = model.ctrl();
    let what = ctrl.what_stat;
    let trans = model.get_sta_dist(0)?;
    let obs_dim = dist_t.obs_stat_dim(what);
    let stat_dim = obs_dim + trans.state_stat_dim(what);
    let prior = model.prior();
    let n = cloud.n_particles();
    let ln_n = (n as f64).ln();

    let view: &ParticleCloud = &*cloud;
    let cols = ctrl.pool().install(|| {
        (0..n)
            .into_par_iter()
            .map(|i| -> FilterResult<(f64, Array1<f64>)> {
                let x = view.particle(i);
                let log_f = prior.log_density(x)?;
                let log_g = dist_t.log_density_state(x, None, None)?;
                let w = -ln_n + log_f + log_g - view.dens_given_prop[i];

                let mut stats = Array1::<f64>::zeros(stat_dim);
                dist_t.comp_stats_state_only(x, stats.slice_mut(s![..obs_dim]), what)?;
                check_finite(0, i, w, stats.iter())?;
                Ok((w, stats))
            })
            .collect::<FilterResult<Vec<_>>>()
    })?;
    store(cloud, cols, stat_dim);
    Ok(())
}

/// Set weights and statistics of the cloud of `period` (> 0).
pub fn set_ll_n_stat<M: StateSpaceModel + ?Sized>(
    model: &M, prev: &ParticleCloud, cloud: &mut ParticleCloud, dist_t: &dyn ConditionalDensity,
    period: usize,
) -> FilterResult<()> {
    let ctrl = model.ctrl();
    let what = ctrl.what_stat;
    let trans = model.get_sta_dist(period)?;
    let trans: &dyn TransitionDensity = trans.as_ref();
    let obs_dim = dist_t.obs_stat_dim(what);
    let stat_dim = obs_dim + trans.state_stat_dim(what);
    if prev.dim_stats() != stat_dim {
        return Err(FilterError::InvalidProblem {
            reason: format!(
                "Previous cloud holds {} statistics, period {period} needs {stat_dim}",
                prev.dim_stats()
            ),
        });
    }
    let n = cloud.n_particles();

    let view: &ParticleCloud = &*cloud;
    let cols = ctrl.pool().install(|| {
        (0..n)
            .into_par_iter()
            .map(|i| -> FilterResult<(f64, Array1<f64>)> {
                let parent = view.parents[i];
                let x = view.particle(i);
                let x_prev = prev.particle(parent);
                let log_f = trans.log_density_state_given(x_prev, x)?;
                let log_g = dist_t.log_density_state(x, None, None)?;
                let w = prev.ws_normalized[parent].ln() + log_f + log_g - view.dens_given_prop[i];

                let mut stats = prev.stats.column(parent).to_owned();
                {
                    let mut inc = AddBack::new(stats.view_mut());
                    dist_t.comp_stats_state_only(x, inc.slice_mut(s![..obs_dim]), what)?;
                    trans.comp_stats_state_state(x_prev, x, inc.slice_mut(s![obs_dim..]), what)?;
                    check_finite(period, i, w, inc.iter())?;
                }
                Ok((w, stats))
            })
            .collect::<FilterResult<Vec<_>>>()
    })?;
    store(cloud, cols, stat_dim);
    Ok(())
}

// ---- Helper Methods ----

fn check_finite<'a>(
    period: usize, particle: usize, w: f64, stats: impl Iterator<Item = &'a f64>,
) -> FilterResult<()> {
    let w_ok = w.is_finite() || w == f64::NEG_INFINITY;
    let mut stats = stats;
    if !w_ok || stats.any(|v| !v.is_finite()) {
        return Err(FilterError::NonFiniteStatistic { period, particle });
    }
    Ok(())
}

fn store(cloud: &mut ParticleCloud, cols: Vec<(f64, Array1<f64>)>, stat_dim: usize) {
    let n = cols.len();
    let mut stats = Array2::<f64>::zeros((stat_dim, n));
    for (i, (w, col)) in cols.into_iter().enumerate() {
        cloud.ws[i] = w;
        stats.column_mut(i).assign(&col);
    }
    cloud.stats = stats;
}
