//! Integration tests for the mode-approximation proposal builder.
//!
//! Purpose
//! -------
//! - Check that the damped Newton search combined with each observation
//!   family reproduces independently computed modes and inverse negated
//!   Hessians for a fixed small design.
//! - Check the fixed-effect statistics produced by the same observation
//!   densities at a fixed state.
//!
//! Coverage
//! --------
//! - `proposal::mode_approximation` with a `N((−1, 1), [[4, 2], [2, 6]])`
//!   prior and a 5-observation, 2-fixed-effect, 2-state design for the
//!   binomial (logit, cloglog, probit), Poisson (log, sqrt), Gamma (log)
//!   and Gaussian (identity) families.
//! - Proposal variant selection (`nu`) and covariance scaling (`covar_fac`).
//! - `densities::GlmObs` statistic dimensions and accumulation into a
//!   non-zero buffer.
//!
//! Exclusions
//! ----------
//! - Solver failure paths; those are covered by unit tests in
//!   `proposal::mode_approximation`.
//! - The particle filter itself (see `integration_particle_filter.rs`).
use approx::assert_abs_diff_eq;
use ndarray::{Array, Array1, Array2, ShapeBuilder, array};
use rust_smc::{
    densities::{CompOut, ConditionalDensity, Family, GlmObs, MvNorm},
    proposal::{ProposalDist, mode_approximation},
};

const TOL: f64 = 1e-5;

/// Reference quantities for one family.
struct Reference {
    family: Family,
    y: Array1<f64>,
    disp: Option<f64>,
    mode: [f64; 2],
    /// Inverse negated Hessian at the mode, column-major.
    nih: [f64; 4],
    /// Fixed-effect gradient at the prior mean.
    d_beta: [f64; 2],
    /// Fixed-effect Hessian at the prior mean, column-major.
    dd_beta: [f64; 4],
}

// ---- Fixture ----

fn design() -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>, Array1<f64>) {
    let x = Array::from_shape_vec(
        (2, 5).f(),
        vec![0.51, 0.49, 0.38, 0.45, 0.078, 0.61, 0.14, 0.34, 0.56, 0.072],
    )
    .unwrap();
    let cfix = array![0.5, -0.3];
    let z = Array::from_shape_vec(
        (2, 5).f(),
        vec![0.19, 0.032, 0.96, 0.87, 0.65, 0.89, 0.12, 0.96, 0.51, 0.91],
    )
    .unwrap();
    let ws = array![1.0, 1.0, 2.0, 1.0, 3.0];
    let offsets = array![0.6, 0.92, 0.9, 0.32, 0.11];
    (x, cfix, z, ws, offsets)
}

fn prior() -> MvNorm {
    MvNorm::new(array![-1.0, 1.0], &array![[4.0, 2.0], [2.0, 6.0]]).unwrap()
}

fn obs_density(r: &Reference) -> GlmObs {
    let (x, cfix, z, ws, offsets) = design();
    GlmObs::new(r.family, r.y.clone(), x, &cfix, z, ws, r.disp, &offsets).unwrap()
}

fn references() -> Vec<Reference> {
    let binary = array![1.0, 1.0, 1.0, 0.0, 0.0];
    let counts = array![0.0, 0.0, 0.0, 2.0, 2.0];
    vec![
        Reference {
            family: Family::BinomialLogit,
            y: binary.clone(),
            disp: None,
            mode: [-0.258260431468893, -0.536885689732472],
            nih: [1.72869439861343, -0.817859451565818, -0.817859451565818, 1.00457591787154],
            d_beta: [-0.913816462483681, 0.235381274400983],
            dd_beta: [-0.299857413439919, -0.147059696954301, -0.147059696954301, -0.268891531233221],
        },
        Reference {
            family: Family::BinomialCloglog,
            y: binary.clone(),
            disp: None,
            mode: [-0.0963723669234773, -0.945471747557031],
            nih: [1.51739165055043, -0.747584786238312, -0.747584786238312, 0.713986160683541],
            d_beta: [-3.74564360775489, -0.991734308708669],
            dd_beta: [-2.25709474934536, -0.612503573039887, -0.612503573039887, -0.842339622167918],
        },
        Reference {
            family: Family::BinomialProbit,
            y: binary,
            disp: None,
            mode: [0.114731813326727, -0.77743827278269],
            nih: [1.37326636929922, -0.754747097306099, -0.754747097306099, 0.702786380258149],
            d_beta: [-2.06610787478159, -0.104583761594978],
            dd_beta: [-0.934885230067643, -0.361609507885171, -0.361609507885171, -0.584661997326541],
        },
        Reference {
            family: Family::PoissonLog,
            y: counts.clone(),
            disp: None,
            mode: [-2.56086700642316, 0.978107611335817],
            nih: [0.966379231940908, -0.437398143418101, -0.437398143418101, 0.344832867881286],
            d_beta: [-2.64218474211349, -5.64688602543408],
            dd_beta: [-2.92285534644817, -1.51299584380444, -1.51299584380444, -3.31235598336682],
        },
        Reference {
            family: Family::PoissonSqrt,
            y: counts,
            disp: None,
            mode: [-2.17992378042166, 1.87000894550256],
            nih: [0.612979755959768, -0.34024026490344, -0.34024026490344, 0.231178493264105],
            d_beta: [4.79988298131378, -2.5346406737559],
            dd_beta: [-9.1893200905747, -2.33833903505377, -2.33833903505377, -3.10467527565322],
        },
        Reference {
            family: Family::GammaLog,
            y: array![1.114409, 0.002153, 0.678375, 0.153124, 2.203468],
            disp: Some(2.0),
            mode: [-1.60962153591909, 0.630777922429041],
            nih: [2.01377124968931, -1.02674638861131, -1.02674638861131, 0.849247864352239],
            d_beta: [-0.387494472278193, -0.928645967289695],
            dd_beta: [-0.566377762913443, -0.155317439114318, -0.155317439114318, -0.181321427067543],
        },
        Reference {
            family: Family::GaussianIdentity,
            y: array![1.1, 0.14, 1.7, 0.13, -0.052],
            disp: Some(2.0),
            mode: [-0.778708820184306, 0.462145589256333],
            nih: [1.40856099086251, -0.757380379841547, -0.757380379841547, 0.732549663445067],
            d_beta: [-0.705383999958155, 0.138301799941341],
            dd_beta: [-0.688534000038116, -0.342309999929884, -0.342309999929884, -0.658976000031672],
        },
    ]
}

// ---- Helper Methods ----

fn assert_proposal(proposal: &ProposalDist, r: &Reference, scale: f64) {
    let name = r.family.name();
    for i in 0..2 {
        assert!((proposal.mean()[i] - r.mode[i]).abs() < TOL, "{name}: mode[{i}]");
    }
    for j in 0..2 {
        for i in 0..2 {
            let got = proposal.covariance()[[i, j]];
            let want = scale * r.nih[j * 2 + i];
            assert!((got - want).abs() < TOL, "{name}: cov[{i},{j}] = {got}, want {want}");
        }
    }
}

// ---- Tests ----

#[test]
// Purpose
// -------
// Normal proposals match the reference mode and inverse negated Hessian.
//
// Given
// -----
// - Each family combined with the common prior, start at zero,
//   ftol_rel = 1e-16, nu = -1, covar_fac = 1.
//
// Expect
// ------
// - No errors, a normal proposal, and mode/covariance within 1e-5.
fn normal_proposal_matches_references() {
    let prior = prior();
    for r in references() {
        // Arrange
        let obs = obs_density(&r);
        let dists: [&dyn ConditionalDensity; 2] = [&prior, &obs];

        // Act
        let out = mode_approximation(&dists, &Array1::zeros(2), -1.0, 1.0, 1e-16);

        // Assert
        assert!(!out.any_errors, "{}: {}", r.family.name(), out.status);
        let proposal = out.proposal.as_ref().unwrap();
        assert!(proposal.is_normal());
        assert_proposal(proposal, &r, 1.0);
    }
}

#[test]
// Purpose
// -------
// A positive `nu` gives a t proposal with the same mean and scale.
//
// Given
// -----
// - Each family with nu = 4.
//
// Expect
// ------
// - `ProposalDist::StudentT` with ν = 4 and the reference mean/scale.
fn t_proposal_matches_references() {
    let prior = prior();
    for r in references() {
        let obs = obs_density(&r);
        let dists: [&dyn ConditionalDensity; 2] = [&prior, &obs];

        let out = mode_approximation(&dists, &Array1::zeros(2), 4.0, 1.0, 1e-16);

        assert!(!out.any_errors, "{}: {}", r.family.name(), out.status);
        let proposal = out.proposal.as_ref().unwrap();
        assert!(matches!(proposal, ProposalDist::StudentT(t) if t.nu() == 4.0));
        assert_proposal(proposal, &r, 1.0);
    }
}

#[test]
// Purpose
// -------
// `covar_fac` scales the covariance and leaves the mean unchanged.
//
// Given
// -----
// - Each family with covar_fac = 1.2.
//
// Expect
// ------
// - Covariance equals 1.2 · reference, mean equals the reference mode.
fn covariance_factor_scales_covariance_only() {
    let prior = prior();
    for r in references() {
        let obs = obs_density(&r);
        let dists: [&dyn ConditionalDensity; 2] = [&prior, &obs];

        let out = mode_approximation(&dists, &Array1::zeros(2), -1.0, 1.2, 1e-16);

        assert!(!out.any_errors, "{}: {}", r.family.name(), out.status);
        assert_proposal(out.proposal.as_ref().unwrap(), &r, 1.2);
    }
}

#[test]
// Purpose
// -------
// Observation statistic dimensions follow the request.
//
// Given
// -----
// - Each family with p = 2 fixed effects.
//
// Expect
// ------
// - State statistics are empty; observation statistics have 0, p and
//   p + p² entries, split into gradient and Hessian blocks.
fn observation_stat_dimensions() {
    for r in references() {
        let obs = obs_density(&r);
        for what in [CompOut::LogDensity, CompOut::Gradient, CompOut::Hessian] {
            assert_eq!(obs.state_stat_dim(what), 0);
        }
        assert_eq!(obs.obs_stat_dim(CompOut::LogDensity), 0);
        assert_eq!(obs.obs_stat_dim(CompOut::Gradient), 2);
        assert_eq!(obs.obs_stat_dim(CompOut::Hessian), 6);
        assert_eq!(obs.obs_stat_dim_grad(CompOut::Gradient), 2);
        assert_eq!(obs.obs_stat_dim_grad(CompOut::Hessian), 2);
        assert_eq!(obs.obs_stat_dim_hess(CompOut::Gradient), 0);
        assert_eq!(obs.obs_stat_dim_hess(CompOut::Hessian), 4);
    }
}

#[test]
// Purpose
// -------
// Fixed-effect statistics at the prior mean match the references and add
// into the caller's buffer.
//
// Given
// -----
// - Each family evaluated at x = (−1, 1), once into zeros and once into
//   ones, for gradient and Hessian requests.
//
// Expect
// ------
// - `[d_beta | dd_beta]` from zeros; the same plus one from ones.
fn observation_stats_match_references_and_accumulate() {
    let x = prior().mean().clone();
    for r in references() {
        let obs = obs_density(&r);
        let name = r.family.name();

        for (start, shift) in [(0.0, 0.0), (1.0, 1.0)] {
            // Gradient request.
            let mut grad = Array1::from_elem(2, start);
            obs.comp_stats_state_only(x.view(), grad.view_mut(), CompOut::Gradient).unwrap();
            for i in 0..2 {
                assert_abs_diff_eq!(grad[i], r.d_beta[i] + shift, epsilon = 1e-7);
            }

            // Hessian request: [gradient | Hessian].
            let mut full = Array1::from_elem(6, start);
            obs.comp_stats_state_only(x.view(), full.view_mut(), CompOut::Hessian).unwrap();
            for i in 0..2 {
                assert!((full[i] - r.d_beta[i] - shift).abs() < 1e-7, "{name}: d_beta[{i}]");
            }
            for k in 0..4 {
                assert!((full[2 + k] - r.dd_beta[k] - shift).abs() < 1e-7, "{name}: dd[{k}]");
            }
        }
    }
}
