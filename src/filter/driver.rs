//! filter::driver — the particle filter recursion.
//!
//! Purpose
//! -------
//! Run the sequential importance sampler over all periods: sample, weight,
//! normalize, report and retire the previous cloud's statistics.
//!
//! Key behaviors
//! -------------
//! - Cancellation is polled before periods `0, 10, 20, …`.
//! - Each period records its ESS and `log Σ exp(wsᵢ)`, the estimate of
//!   `log p(y_t | y_{0:t-1})`.
//! - When `trace > 0` the reporter receives the period, ESS and weighted
//!   means. A failing reporter is logged at `warn` and ignored.
//! - After period `t` is weighted, the statistics of period `t − 1` are
//!   released, so at most two clouds hold statistics at any time and only
//!   the final cloud holds them after the run.
//!
//! Invariants & assumptions
//! ------------------------
//! - There is no resampling; `parents` is the identity map.
//! - Any proposal failure aborts the whole run.
//!
//! Downstream usage
//! ----------------
//! - [`PfOutput::log_likelihood`] sums the per-period terms.
//! - [`PfOutput::score`] and [`PfOutput::fixed_effect_information`] turn the
//!   final cloud's statistics into the estimated score and the observed
//!   information of the fixed effects (Louis' identity).
use crate::{
    densities::CompOut,
    filter::{
        cloud::ParticleCloud,
        errors::{FilterError, FilterResult},
        hooks::FilterHooks,
        problem::StateSpaceModel,
        sampler::{sample, sample_first},
        stats::{set_ll_n_stat, set_ll_n_stat_first},
    },
    linalg::{dsyr, log_sum_log_vec, normalize_log_weights, symmetrize_upper},
};
use ndarray::{Array1, Array2, s};
use rand::Rng;

/// Sizes of the four statistic blocks, in storage order.
///
/// A particle's statistics are
/// `[obs gradient | obs Hessian | state gradient | state Hessian]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatLayout {
    pub obs_grad: usize,
    pub obs_hess: usize,
    pub state_grad: usize,
    pub state_hess: usize,
}

impl StatLayout {
    pub fn total(&self) -> usize {
        self.obs_grad + self.obs_hess + self.state_grad + self.state_hess
    }
}

/// Result of a filter run.
#[derive(Debug, Clone)]
pub struct PfOutput {
    pub clouds: Vec<ParticleCloud>,
    pub ess: Vec<f64>,
    pub log_lik_terms: Vec<f64>,
    pub what_stat: CompOut,
    pub layout: StatLayout,
}

impl PfOutput {
    /// Estimated `log p(y_{0:T-1})`.
    pub fn log_likelihood(&self) -> f64 {
        self.log_lik_terms.iter().sum()
    }

    pub fn final_cloud(&self) -> Option<&ParticleCloud> {
        self.clouds.last()
    }

    /// Estimated score: the weighted mean of the gradient blocks,
    /// `[∇_β (p) | ∇_F, ∇_Q (2r²)]`. `None` without gradient statistics.
    pub fn score(&self) -> Option<Array1<f64>> {
        if !self.what_stat.wants_gradient() {
            return None;
        }
        let mean = self.final_cloud()?.get_stats_mean();
        if mean.len() != self.layout.total() {
            return None;
        }
        let l = self.layout;
        let state_start = l.obs_grad + l.obs_hess;
        let mut out = Array1::<f64>::zeros(l.obs_grad + l.state_grad);
        out.slice_mut(s![..l.obs_grad]).assign(&mean.slice(s![..l.obs_grad]));
        out.slice_mut(s![l.obs_grad..])
            .assign(&mean.slice(s![state_start..state_start + l.state_grad]));
        Some(out)
    }

    /// Observed information of the fixed effects by Louis' identity:
    /// `−(Σ wᵢ (Hᵢ + gᵢgᵢᵀ) − ḡḡᵀ)`.
    ///
    /// `None` unless Hessian statistics were collected.
    pub fn fixed_effect_information(&self) -> Option<Array2<f64>> {
        if !self.what_stat.wants_hessian() {
            return None;
        }
        let cloud = self.final_cloud()?;
        let p = self.layout.obs_grad;
        if cloud.dim_stats() != self.layout.total() || self.layout.obs_hess != p * p {
            return None;
        }

        let mut g_bar = Array1::<f64>::zeros(p);
        let mut m = Array2::<f64>::zeros((p, p));
        for (i, &w) in cloud.ws_normalized.iter().enumerate() {
            if w == 0.0 {
                continue;
            }
            let col = cloud.stats.column(i);
            let g = col.slice(s![..p]);
            g_bar.scaled_add(w, &g);
            dsyr(&mut m, g, w);
            for j in 0..p {
                for k in 0..=j {
                    m[[k, j]] += w * col[p + j * p + k];
                }
            }
        }
        dsyr(&mut m, g_bar.view(), -1.0);
        symmetrize_upper(&mut m);
        Some(m.mapv(|v| -v))
    }
}

/// Run the particle filter over every period of `model`.
///
/// Parameters
/// ----------
/// - `model`: data, densities and control object.
/// - `hooks`: cancellation check and progress reporter.
///
/// Returns
/// -------
/// A [`PfOutput`] with one cloud per period; only the last cloud keeps its
/// statistics.
///
/// Errors
/// ------
/// - [`FilterError::Cancelled`] if the cancellation hook fires.
/// - [`FilterError::ModeApproximation`] if any proposal fails.
/// - [`FilterError::DegenerateWeights`] if every weight of a period is zero.
/// - Any error raised while building or evaluating densities.
pub fn particle_filter<M: StateSpaceModel + ?Sized>(
    model: &M, hooks: &FilterHooks<'_>,
) -> FilterResult<PfOutput> {
    let ctrl = model.ctrl();
    let seed = ctrl.seed.unwrap_or_else(|| rand::rng().random());
    let n_periods = model.n_periods();

    let mut clouds: Vec<ParticleCloud> = Vec::with_capacity(n_periods);
    let mut ess = Vec::with_capacity(n_periods);
    let mut log_lik_terms = Vec::with_capacity(n_periods);
    let mut layout = StatLayout::default();
    log::debug!(
        "Particle filter: {n_periods} periods, {} particles, {} threads, seed {seed}",
        ctrl.n_part,
        ctrl.n_threads()
    );

    for i in 0..n_periods {
        if i % 10 == 0 && hooks.cancel.is_cancelled() {
            return Err(FilterError::Cancelled { period: i });
        }

        let dist_t = model.get_obs_dist(i)?;
        let dist_t = dist_t.as_ref();
        let mut cloud = match clouds.last() {
            None => {
                let mut cloud = sample_first(model, dist_t, seed)?;
                set_ll_n_stat_first(model, &mut cloud, dist_t)?;
                cloud
            }
            Some(prev) => {
                let mut cloud = sample(model, dist_t, prev, i, seed)?;
                set_ll_n_stat(model, prev, &mut cloud, dist_t, i)?;
                cloud
            }
        };

        let max_w = cloud.ws.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max_w == f64::NEG_INFINITY {
            return Err(FilterError::DegenerateWeights { period: i });
        }
        log_lik_terms.push(log_sum_log_vec(cloud.ws.view(), max_w));
        cloud.ws_normalized = cloud.ws.clone();
        let ess_i = normalize_log_weights(&mut cloud.ws_normalized);
        ess.push(ess_i);

        if ctrl.trace > 0 {
            let report = hooks.reporter.report(
                i,
                ess_i,
                &cloud.get_cloud_mean(),
                &cloud.get_stats_mean(),
            );
            if let Err(err) = report {
                log::warn!("Progress report for period {i} failed: {err}");
            }
        }

        if let Some(prev) = clouds.last_mut() {
            prev.clear_stats();
        }
        clouds.push(cloud);

        if i + 1 == n_periods {
            let trans = model.get_sta_dist(i)?;
            let what = ctrl.what_stat;
            layout = StatLayout {
                obs_grad: dist_t.obs_stat_dim_grad(what),
                obs_hess: dist_t.obs_stat_dim_hess(what),
                state_grad: trans.state_stat_dim_grad(what),
                state_hess: trans.state_stat_dim_hess(what),
            };
        }
    }

    Ok(PfOutput { clouds, ess, log_lik_terms, what_stat: ctrl.what_stat, layout })
}
