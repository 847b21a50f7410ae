//! rust_smc — particle filtering for exponential-family state-space models.
//!
//! Purpose
//! -------
//! Provide a sequential Monte Carlo filter whose per-particle proposals are
//! Laplace approximations around the mode of the one-step posterior, together
//! with the densities, dense linear algebra and optional Python bindings
//! needed to run it.
//!
//! Key behaviors
//! -------------
//! - Expose the core modules:
//!   - [`linalg`]: Cholesky factors, rank-one updates and log-weight helpers.
//!   - [`densities`]: prior, transition and GLM observation densities.
//!   - [`proposal`]: damped Newton mode search and the resulting proposal.
//!   - [`filter`]: particle clouds, sampler, weights and the run driver.
//! - When the `python-bindings` feature is enabled, define the
//!   `ParticleFilter` `#[pyclass]` and the `_rust_smc` `#[pymodule]`, and
//!   register the `rust_smc.filter` submodule so dot-notation imports work.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; the binding layer only
//!   converts inputs, releases the GIL around runs and maps errors.
//! - A Python `KeyboardInterrupt` observed during a run surfaces as
//!   [`filter::FilterError::Cancelled`] and is re-raised as
//!   `KeyboardInterrupt`.
//!
//! Conventions
//! -----------
//! - Design matrices are stored covariate-major: `X` is `(p, n_obs)` and `Z`
//!   is `(r, n_obs)`.
//! - Errors from core code are rich Rust enums converted to `PyErr` at the
//!   PyO3 boundary.
//!
//! Downstream usage
//! ----------------
//! - Native Rust code builds a [`filter::ProblemData`] and calls
//!   [`filter::particle_filter`]; the PyO3 items can be ignored.
//! - The Python packaging layer imports `_rust_smc` and wraps
//!   `ParticleFilter` in a user-facing API.
//!
//! Testing notes
//! -------------
//! - Numerical behavior is covered by unit tests in the inner modules and by
//!   the integration tests under `tests/`.
pub mod densities;
pub mod filter;
pub mod linalg;
pub mod proposal;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray1, PyArray2};

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    filter::{
        FilterHooks, LogReporter, ParticleCloud, PfOutput, ProblemData, StateSpaceModel,
        particle_filter,
    },
    utils::build_problem,
};

/// ParticleFilter — Python-facing wrapper around [`particle_filter`].
///
/// Purpose
/// -------
/// Hold a validated [`ProblemData`] and the output of the most recent run,
/// and expose both to Python.
///
/// Parameters
/// ----------
/// Constructed from Python via
/// `ParticleFilter(y, X, Z, cfix, time_indices, F, Q, Q0, mu0, family, ...)`:
/// - `y`, `cfix`, `mu0`, `ws`, `offsets`: 1-D float64 array-likes.
/// - `X` `(p, n_obs)`, `Z` `(r, n_obs)`, `F`, `Q`, `Q0` `(r, r)`: 2-D
///   float64 array-likes.
/// - `time_indices`: one sequence of observation indices per period.
/// - `family`: e.g. `"binomial_logit"`, `"poisson_log"`, `"gaussian_identity"`.
/// - `disp`: dispersion, required by `Gamma_log` and `gaussian_identity`.
/// - `n_part`, `nu`, `covar_fac`, `ftol_rel`, `max_it`, `trace`, `what_stat`,
///   `seed`, `n_threads`: run controls (see [`filter::ControlObj`]).
///
/// Notes
/// -----
/// - `run` releases the GIL; Ctrl-C is honored at the driver's poll points.
/// - Accessors raise `ValueError` until `run` has completed once.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_smc.filter")]
pub struct ParticleFilter {
    problem: ProblemData,
    output: Option<PfOutput>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl ParticleFilter {
    #[new]
    #[pyo3(
        text_signature = "(y, X, Z, cfix, time_indices, F, Q, Q0, mu0, /, family='binomial_logit', \
                          disp=None, ws=None, offsets=None, n_part=1000, nu=-1.0, covar_fac=1.0, \
                          ftol_rel=1e-8, max_it=None, trace=0, what_stat='log_density', seed=None, \
                          n_threads=None)",
        signature = (
            y, x, z, cfix, time_indices, f, q, q0, mu0,
            family = "binomial_logit", disp = None, ws = None, offsets = None,
            n_part = 1000, nu = -1.0, covar_fac = 1.0, ftol_rel = 1e-8, max_it = None,
            trace = 0, what_stat = "log_density", seed = None, n_threads = None
        )
    )]
    #[allow(clippy::too_many_arguments)]
    pub fn new<'py>(
        py: Python<'py>, y: &Bound<'py, PyAny>, x: &Bound<'py, PyAny>, z: &Bound<'py, PyAny>,
        cfix: &Bound<'py, PyAny>, time_indices: &Bound<'py, PyAny>, f: &Bound<'py, PyAny>,
        q: &Bound<'py, PyAny>, q0: &Bound<'py, PyAny>, mu0: &Bound<'py, PyAny>, family: &str,
        disp: Option<f64>, ws: Option<&Bound<'py, PyAny>>, offsets: Option<&Bound<'py, PyAny>>,
        n_part: usize, nu: f64, covar_fac: f64, ftol_rel: f64, max_it: Option<u64>, trace: u32,
        what_stat: &str, seed: Option<u64>, n_threads: Option<usize>,
    ) -> PyResult<ParticleFilter> {
        let problem = build_problem(
            py,
            y,
            x,
            z,
            cfix,
            time_indices,
            f,
            q,
            q0,
            mu0,
            family,
            disp,
            ws,
            offsets,
            n_part,
            nu,
            covar_fac,
            ftol_rel,
            max_it,
            trace,
            what_stat,
            seed,
            n_threads,
        )?;
        Ok(ParticleFilter { problem, output: None })
    }

    /// Run the filter over every period and keep the result.
    ///
    /// Progress lines (when `trace > 0`) go through the `log` facade.
    pub fn run(&mut self, py: Python<'_>) -> PyResult<()> {
        let problem = &self.problem;
        let output = py.allow_threads(|| {
            let cancel = || Python::with_gil(|py| py.check_signals().is_err());
            let hooks = FilterHooks { cancel: &cancel, reporter: &LogReporter };
            particle_filter(problem, &hooks)
        })?;
        self.output = Some(output);
        Ok(())
    }

    #[getter]
    pub fn n_periods(&self) -> usize {
        self.problem.n_periods()
    }

    /// Effective sample size per period.
    #[getter]
    pub fn ess<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray1<f64>>> {
        Ok(self.output()?.ess.clone().into_pyarray(py))
    }

    /// Per-period terms `log p(y_t | y_{0:t-1})`.
    #[getter]
    pub fn log_lik_terms<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray1<f64>>> {
        Ok(self.output()?.log_lik_terms.clone().into_pyarray(py))
    }

    #[getter]
    pub fn log_likelihood(&self) -> PyResult<f64> {
        Ok(self.output()?.log_likelihood())
    }

    /// Estimated score, or `None` when `what_stat='log_density'`.
    #[getter]
    pub fn score<'py>(&self, py: Python<'py>) -> PyResult<Option<Bound<'py, PyArray1<f64>>>> {
        Ok(self.output()?.score().map(|s| s.into_pyarray(py)))
    }

    /// Observed information of the fixed effects, or `None` unless
    /// `what_stat='hessian'`.
    #[getter]
    pub fn fixed_effect_information<'py>(
        &self, py: Python<'py>,
    ) -> PyResult<Option<Bound<'py, PyArray2<f64>>>> {
        Ok(self.output()?.fixed_effect_information().map(|m| m.into_pyarray(py)))
    }

    /// Particles of `period` as an `(r, n_part)` array.
    pub fn particles<'py>(
        &self, py: Python<'py>, period: usize,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        Ok(self.cloud(period)?.particles.clone().into_pyarray(py))
    }

    /// Normalized weights of `period`.
    pub fn weights<'py>(
        &self, py: Python<'py>, period: usize,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        Ok(self.cloud(period)?.ws_normalized.clone().into_pyarray(py))
    }

    /// Weighted particle mean of `period`.
    pub fn filtered_mean<'py>(
        &self, py: Python<'py>, period: usize,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        Ok(self.cloud(period)?.get_cloud_mean().into_pyarray(py))
    }
}

#[cfg(feature = "python-bindings")]
impl ParticleFilter {
    fn output(&self) -> PyResult<&PfOutput> {
        self.output
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("run() must be called before reading results"))
    }

    fn cloud(&self, period: usize) -> PyResult<&ParticleCloud> {
        let out = self.output()?;
        out.clouds.get(period).ok_or_else(|| {
            PyValueError::new_err(format!(
                "period {period} out of range (n_periods = {})",
                out.clouds.len()
            ))
        })
    }
}

#[cfg(feature = "python-bindings")]
#[pymodule]
fn _rust_smc<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let filter_mod = PyModule::new(_py, "filter")?;
    filter_mod.add_class::<ParticleFilter>()?;
    m.add_submodule(&filter_mod)?;

    // Manually add submodules into sys.modules to allow for dot notation.
    _py.import("sys")?.getattr("modules")?.set_item("rust_smc.filter", filter_mod)?;
    Ok(())
}
