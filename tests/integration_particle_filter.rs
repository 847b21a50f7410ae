//! Integration tests for the particle filter driver.
//!
//! Purpose
//! -------
//! - Check a full run on a linear-Gaussian model, where the Kalman filter
//!   gives the exact filtering means and log-likelihood.
//! - Check the run-level contracts: statistics retention, reproducibility,
//!   cancellation and tolerance of a failing reporter.
//!
//! Coverage
//! --------
//! - `filter::particle_filter` over a 2-state, 5-period model with one
//!   Gaussian observation per period, several seeds and thread counts.
//! - `PfOutput` accessors (`log_likelihood`, `final_cloud`, `score`).
//!
//! Exclusions
//! ----------
//! - Per-step weight formulas; those are unit-tested in `filter::stats`.
//! - Non-Gaussian families (see `integration_mode_approximation.rs`).
use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, Axis, array};
use rust_smc::{
    densities::{CompOut, Family},
    filter::{
        ControlObj, FilterError, FilterHooks, FilterResult, LogReporter, NeverCancel,
        ObservationData, ProblemData, ProgressReporter, StateModel, particle_filter,
    },
};
use std::{cell::Cell, sync::Once};

const N_PART: usize = 1000;
const DISP: f64 = 0.5;
const FIXED: f64 = 0.3;

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

// ---- Fixture ----

fn state_model() -> StateModel {
    StateModel {
        f: array![[0.8, 0.1], [0.0, 0.6]],
        q: array![[0.3, 0.05], [0.05, 0.2]],
        q0: array![[1.0, 0.2], [0.2, 0.5]],
        mu0: array![0.1, -0.2],
    }
}

fn observations() -> ObservationData {
    let z = Array2::from_shape_vec(
        (2, 5),
        vec![1.0, 1.0, 0.7, 1.0, 0.4, 0.5, -0.3, 1.0, 0.0, 0.9],
    )
    .unwrap();
    ObservationData {
        y: array![0.8, 1.1, 0.2, -0.4, 0.5],
        x: Array2::ones((1, 5)),
        z,
        cfix: array![FIXED],
        ws: Array1::ones(5),
        offsets: Array1::zeros(5),
        time_indices: (0..5).map(|t| vec![t]).collect(),
        family: Family::GaussianIdentity,
        disp: Some(DISP),
    }
}

fn problem(what: CompOut, trace: u32, seed: u64, n_threads: usize) -> ProblemData {
    let ctrl =
        ControlObj::new(N_PART, -1.0, 1.0, 1e-10, 100, trace, what, Some(seed), n_threads).unwrap();
    ProblemData::new(observations(), state_model(), ctrl).unwrap()
}

/// Exact filtering means, variances and log-likelihood terms.
struct Kalman {
    means: Vec<Array1<f64>>,
    vars: Vec<Array2<f64>>,
    log_lik_terms: Vec<f64>,
}

fn kalman() -> Kalman {
    let state = state_model();
    let obs = observations();
    let mut m = state.mu0.clone();
    let mut p = state.q0.clone();
    let mut out = Kalman { means: vec![], vars: vec![], log_lik_terms: vec![] };

    for t in 0..obs.y.len() {
        if t > 0 {
            m = state.f.dot(&m);
            p = state.f.dot(&p).dot(&state.f.t()) + &state.q;
        }
        let h = obs.z.column(t).to_owned();
        let ph = p.dot(&h);
        let s = h.dot(&ph) + DISP;
        let resid = obs.y[t] - FIXED - h.dot(&m);
        out.log_lik_terms
            .push(-0.5 * ((2.0 * std::f64::consts::PI * s).ln() + resid * resid / s));

        let k = &ph / s;
        m = &m + &(&k * resid);
        let kk = k.view().insert_axis(Axis(1));
        let php = ph.view().insert_axis(Axis(0));
        p = &p - &kk.dot(&php);
        out.means.push(m.clone());
        out.vars.push(p.clone());
    }
    out
}

struct FailingReporter {
    calls: Cell<usize>,
}

impl ProgressReporter for FailingReporter {
    fn report(
        &self, period: usize, _ess: f64, _cloud_mean: &Array1<f64>, _stats_mean: &Array1<f64>,
    ) -> FilterResult<()> {
        self.calls.set(self.calls.get() + 1);
        Err(FilterError::Report { reason: format!("sink closed at {period}") })
    }
}

// ---- Tests ----

#[test]
// Purpose
// -------
// The particle approximation agrees with the Kalman filter.
//
// Given
// -----
// - A linear-Gaussian model, where the Laplace proposal is the exact
//   one-step posterior.
// - N = 1000 particles and three seeds.
//
// Expect
// ------
// - 1 ≤ ESS ≤ N in every period.
// - Weighted means within four Monte Carlo standard errors of the Kalman
//   means.
// - Log-likelihood within 0.1 of the exact value.
fn linear_gaussian_matches_kalman_filter() {
    init_logging();
    let exact = kalman();
    let exact_ll: f64 = exact.log_lik_terms.iter().sum();

    for seed in [1_u64, 7, 42] {
        // Arrange
        let problem = problem(CompOut::LogDensity, 0, seed, 2);

        // Act
        let out = particle_filter(&problem, &FilterHooks::default()).unwrap();

        // Assert
        assert_eq!(out.clouds.len(), 5);
        for (t, cloud) in out.clouds.iter().enumerate() {
            let ess = out.ess[t];
            assert!((1.0..=N_PART as f64 + 1e-8).contains(&ess), "ESS {ess} at period {t}");
            assert_abs_diff_eq!(cloud.ws_normalized.sum(), 1.0, epsilon = 1e-10);

            let mean = cloud.get_cloud_mean();
            for j in 0..2 {
                let tol = 4.0 * (exact.vars[t][[j, j]] / ess).sqrt() + 1e-3;
                assert!(
                    (mean[j] - exact.means[t][j]).abs() < tol,
                    "seed {seed}, period {t}, state {j}: {} vs {}",
                    mean[j],
                    exact.means[t][j]
                );
            }
        }
        assert_abs_diff_eq!(out.log_likelihood(), exact_ll, epsilon = 0.1);
    }
}

#[test]
// Purpose
// -------
// The first-period likelihood term is exact: the proposal is the exact
// posterior, so every first-period weight is equal.
fn first_period_term_is_exact() {
    let exact = kalman();
    let problem = problem(CompOut::LogDensity, 0, 3, 1);

    let out = particle_filter(&problem, &FilterHooks::default()).unwrap();

    assert_abs_diff_eq!(out.log_lik_terms[0], exact.log_lik_terms[0], epsilon = 1e-8);
    assert_abs_diff_eq!(out.ess[0], N_PART as f64, epsilon = 1e-6);
}

#[test]
// Purpose
// -------
// Only the final cloud keeps statistics and its layout matches the request.
//
// Given
// -----
// - Gradient statistics: p = 1 fixed effect, r = 2 states.
//
// Expect
// ------
// - Clouds 0..3 hold no statistics; the last holds 1 + 2·2² = 9 rows.
// - The score has the same 9 entries, all finite.
fn only_final_cloud_keeps_statistics() {
    let problem = problem(CompOut::Gradient, 0, 11, 2);

    let out = particle_filter(&problem, &FilterHooks::default()).unwrap();

    for cloud in &out.clouds[..4] {
        assert_eq!(cloud.dim_stats(), 0);
    }
    let last = out.final_cloud().unwrap();
    assert_eq!(last.dim_stats(), 9);
    assert_eq!(out.layout.total(), 9);
    let score = out.score().unwrap();
    assert_eq!(score.len(), 9);
    assert!(score.iter().all(|v| v.is_finite()));
    assert!(out.fixed_effect_information().is_none());
    assert!(last.stats.iter().all(|v| v.is_finite()));
}

#[test]
// Purpose
// -------
// A fixed seed reproduces the run regardless of the number of workers.
fn seed_reproduces_run_across_thread_counts() {
    let one = particle_filter(&problem(CompOut::LogDensity, 0, 5, 1), &FilterHooks::default());
    let four = particle_filter(&problem(CompOut::LogDensity, 0, 5, 4), &FilterHooks::default());

    let (one, four) = (one.unwrap(), four.unwrap());
    assert_eq!(one.log_lik_terms, four.log_lik_terms);
    assert_eq!(one.final_cloud().unwrap().particles, four.final_cloud().unwrap().particles);
}

#[test]
// Purpose
// -------
// A cancellation request observed before the first period stops the run.
fn cancellation_before_first_period() {
    let cancel = || true;
    let hooks = FilterHooks { cancel: &cancel, reporter: &LogReporter };

    let res = particle_filter(&problem(CompOut::LogDensity, 0, 9, 1), &hooks);

    assert!(matches!(res, Err(FilterError::Cancelled { period: 0 })));
}

#[test]
// Purpose
// -------
// With `trace > 0` the reporter is called once per period, and its failures
// are logged without aborting the run.
fn failing_reporter_is_called_every_period() {
    init_logging();
    let reporter = FailingReporter { calls: Cell::new(0) };
    let hooks = FilterHooks { cancel: &NeverCancel, reporter: &reporter };

    let out = particle_filter(&problem(CompOut::LogDensity, 1, 13, 2), &hooks).unwrap();

    assert_eq!(reporter.calls.get(), 5);
    assert_eq!(out.ess.len(), 5);
}
