//! filter::problem — run configuration and model data.
//!
//! Purpose
//! -------
//! Hold everything a filter run reads but never mutates: the tuning
//! parameters and worker pool ([`ControlObj`]) and the observation and
//! state-model data ([`ProblemData`]). The driver only sees the model
//! through the [`StateSpaceModel`] trait.
//!
//! Key behaviors
//! -------------
//! - Every constructor validates its inputs and returns `FilterResult`.
//! - `Q` and `Q0` are factorized once; the factors are shared with every
//!   per-period density through `Arc`.
//! - [`ProblemData::get_obs_dist`] selects the observations of one period and
//!   builds a [`GlmObs`] for them.
//!
//! Invariants & assumptions
//! ------------------------
//! - `x` is `p × n_obs`, `z` is `r × n_obs`; column `i` is observation `i`.
//! - `time_indices[t]` lists the observations of period `t`; indices are in
//!   range but need not be sorted or disjoint.
//! - There is at least one period.
use crate::{
    densities::{
        CompOut, ConditionalDensity, Family, GlmObs, MvNorm, MvNormReg, TransitionDensity,
    },
    filter::errors::{FilterError, FilterResult},
    linalg::CholFactor,
    proposal::DEFAULT_MAX_IT,
};
use ndarray::{Array1, Array2, Axis};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Read-only access to a state-space model for one filter run.
pub trait StateSpaceModel: Sync {
    fn n_periods(&self) -> usize;

    fn state_dim(&self) -> usize;

    fn ctrl(&self) -> &ControlObj;

    /// Density of the first state, `N(mu0, Q0)`.
    fn prior(&self) -> &MvNorm;

    /// Observation density of period `t`.
    fn get_obs_dist(&self, t: usize) -> FilterResult<Box<dyn ConditionalDensity>>;

    /// Transition density into period `t`.
    fn get_sta_dist(&self, t: usize) -> FilterResult<Box<dyn TransitionDensity>>;
}

/// Tuning parameters and worker pool for one filter run.
///
/// Fields:
/// - `n_part`: number of particles (`> 0`).
/// - `nu`: proposal degrees of freedom; `<= 0` selects normal proposals.
/// - `covar_fac`: proposal covariance multiplier (finite, `> 0`).
/// - `ftol_rel`: relative objective tolerance of the mode search (finite, `> 0`).
/// - `max_it`: Newton iteration budget per mode search (`> 0`, default 100).
/// - `trace`: verbosity; `> 0` reports ESS and means every period.
/// - `what_stat`: statistics carried per particle.
/// - `seed`: base seed; `None` draws one from the OS per run.
#[derive(Debug)]
pub struct ControlObj {
    pub n_part: usize,
    pub nu: f64,
    pub covar_fac: f64,
    pub ftol_rel: f64,
    pub max_it: u64,
    pub trace: u32,
    pub what_stat: CompOut,
    pub seed: Option<u64>,
    pool: ThreadPool,
}

impl ControlObj {
    /// Validate the tuning parameters and build a pool with `n_threads` workers.
    ///
    /// # Errors
    /// - [`FilterError::InvalidControl`] for any out-of-range parameter.
    /// - [`FilterError::ThreadPool`] if the pool cannot be built.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n_part: usize, nu: f64, covar_fac: f64, ftol_rel: f64, max_it: u64, trace: u32,
        what_stat: CompOut, seed: Option<u64>, n_threads: usize,
    ) -> FilterResult<Self> {
        if n_part == 0 {
            return Err(FilterError::InvalidControl {
                param: "n_part",
                value: 0.0,
                reason: "Number of particles must be greater than zero.",
            });
        }
        if !nu.is_finite() {
            return Err(FilterError::InvalidControl {
                param: "nu",
                value: nu,
                reason: "Degrees of freedom must be finite (use a value <= 0 for a normal proposal).",
            });
        }
        verify_positive("covar_fac", covar_fac)?;
        verify_positive("ftol_rel", ftol_rel)?;
        if max_it == 0 {
            return Err(FilterError::InvalidControl {
                param: "max_it",
                value: 0.0,
                reason: "Iteration budget must be greater than zero.",
            });
        }
        if n_threads == 0 {
            return Err(FilterError::InvalidControl {
                param: "n_threads",
                value: 0.0,
                reason: "Number of threads must be greater than zero.",
            });
        }
        let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;
        Ok(Self { n_part, nu, covar_fac, ftol_rel, max_it, trace, what_stat, seed, pool })
    }

    /// Normal proposals, no inflation, `ftol_rel = 1e-8`, the default
    /// iteration budget, silent, log-density only and one worker per core.
    pub fn with_particles(n_part: usize, seed: Option<u64>) -> FilterResult<Self> {
        let n_threads = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::new(n_part, -1.0, 1.0, 1e-8, DEFAULT_MAX_IT, 0, CompOut::LogDensity, seed, n_threads)
    }

    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub fn n_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Observation side of the model.
///
/// `disp` is required by `Gamma_log` and `gaussian_identity`.
#[derive(Debug, Clone)]
pub struct ObservationData {
    pub y: Array1<f64>,
    pub x: Array2<f64>,
    pub z: Array2<f64>,
    pub cfix: Array1<f64>,
    pub ws: Array1<f64>,
    pub offsets: Array1<f64>,
    pub time_indices: Vec<Vec<usize>>,
    pub family: Family,
    pub disp: Option<f64>,
}

/// Linear-Gaussian state side: `x₀ ~ N(mu0, Q0)`, `x_t | x_{t-1} ~ N(F x_{t-1}, Q)`.
#[derive(Debug, Clone)]
pub struct StateModel {
    pub f: Array2<f64>,
    pub q: Array2<f64>,
    pub q0: Array2<f64>,
    pub mu0: Array1<f64>,
}

/// Validated model data plus run configuration.
#[derive(Debug)]
pub struct ProblemData {
    obs: ObservationData,
    prior: MvNorm,
    transition: MvNormReg,
    ctrl: ControlObj,
}

impl ProblemData {
    /// Validate shapes and indices, and factorize `Q` and `Q0`.
    ///
    /// # Errors
    /// - [`FilterError::InvalidProblem`] for no periods, a state design that
    ///   does not match the state dimension, or out-of-range time indices.
    /// - [`FilterError::Density`] for inconsistent observation inputs
    ///   (lengths, non-finite values, missing dispersion).
    /// - [`FilterError::Linalg`] if `Q` or `Q0` is not SPD.
    pub fn new(obs: ObservationData, state: StateModel, ctrl: ControlObj) -> FilterResult<Self> {
        let r = state.mu0.len();
        if obs.time_indices.is_empty() {
            return Err(FilterError::InvalidProblem {
                reason: "At least one period is required.".to_string(),
            });
        }
        if obs.z.nrows() != r {
            return Err(FilterError::InvalidProblem {
                reason: format!("State design has {} rows, state dimension is {r}", obs.z.nrows()),
            });
        }
        let n_obs = obs.y.len();
        for (t, idx) in obs.time_indices.iter().enumerate() {
            if let Some(&bad) = idx.iter().find(|&&i| i >= n_obs) {
                return Err(FilterError::InvalidProblem {
                    reason: format!("Period {t} references observation {bad}, only {n_obs} exist"),
                });
            }
        }
        // Validates lengths, finiteness and dispersion for all observations.
        GlmObs::new(
            obs.family,
            obs.y.clone(),
            obs.x.clone(),
            &obs.cfix,
            obs.z.clone(),
            obs.ws.clone(),
            obs.disp,
            &obs.offsets,
        )?;

        let q0 = Arc::new(CholFactor::new(&state.q0)?);
        let q = Arc::new(CholFactor::new(&state.q)?);
        let prior = MvNorm::from_factor(state.mu0, q0)?;
        let transition = MvNormReg::new(state.f, q)?;
        Ok(Self { obs, prior, transition, ctrl })
    }

    pub fn observations(&self) -> &ObservationData {
        &self.obs
    }

    pub fn transition(&self) -> &MvNormReg {
        &self.transition
    }

    /// Observation indices of period `t`.
    pub fn period_indices(&self, t: usize) -> FilterResult<&[usize]> {
        self.obs.time_indices.get(t).map(Vec::as_slice).ok_or_else(|| FilterError::InvalidProblem {
            reason: format!("Period {t} out of range (n_periods = {})", self.obs.time_indices.len()),
        })
    }
}

impl StateSpaceModel for ProblemData {
    fn n_periods(&self) -> usize {
        self.obs.time_indices.len()
    }

    fn state_dim(&self) -> usize {
        self.prior.dim()
    }

    fn ctrl(&self) -> &ControlObj {
        &self.ctrl
    }

    fn prior(&self) -> &MvNorm {
        &self.prior
    }

    fn get_obs_dist(&self, t: usize) -> FilterResult<Box<dyn ConditionalDensity>> {
        let idx = self.period_indices(t)?;
        let obs = &self.obs;
        let dist = GlmObs::new(
            obs.family,
            obs.y.select(Axis(0), idx),
            obs.x.select(Axis(1), idx),
            &obs.cfix,
            obs.z.select(Axis(1), idx),
            obs.ws.select(Axis(0), idx),
            obs.disp,
            &obs.offsets.select(Axis(0), idx),
        )?;
        Ok(Box::new(dist))
    }

    fn get_sta_dist(&self, t: usize) -> FilterResult<Box<dyn TransitionDensity>> {
        self.period_indices(t)?;
        Ok(Box::new(self.transition.clone()))
    }
}

// ---- Helper Methods ----

fn verify_positive(param: &'static str, value: f64) -> FilterResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FilterError::InvalidControl {
            param,
            value,
            reason: "Value must be finite and strictly positive.",
        });
    }
    Ok(())
}
