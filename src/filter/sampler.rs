//! filter::sampler — draw a new cloud from mode-approximation proposals.
//!
//! Purpose
//! -------
//! Propose the particles of one period. Each particle gets a Laplace
//! proposal built around the mode of (transition prior × observation
//! density) and one draw from it.
//!
//! Key behaviors
//! -------------
//! - [`sample_first`] combines `N(mu0, Q0)` with the first observation
//!   density. The inputs are the same for every particle, so the mode is
//!   found once and shared; all particles are drawn from that proposal.
//! - [`sample`] builds `N(F x_prev, Q)` for each particle, starts the mode
//!   search at `F x_prev` and draws from the resulting proposal.
//! - Per-particle work runs on the control object's pool. Each particle
//!   owns a ChaCha stream keyed by `(period, particle)`, so draws do not
//!   depend on scheduling or thread count.
//!
//! Invariants & assumptions
//! ------------------------
//! - A proposal flagged with `any_errors` aborts the run with
//!   [`FilterError::ModeApproximation`].
//! - Returned clouds have unset weights and no statistics.
use crate::{
    densities::ConditionalDensity,
    filter::{
        cloud::ParticleCloud,
        errors::{FilterError, FilterResult},
        problem::StateSpaceModel,
    },
    proposal::{ProposalDist, mode_approximation_with_budget},
};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Draw the first cloud from the proposal around the mode of
/// `N(mu0, Q0) · g(y₀ | x)`.
///
/// # Errors
/// - [`FilterError::ModeApproximation`] (period 0, particle 0) when the
///   shared proposal is not trustworthy.
/// - Density errors raised while sampling.
pub fn sample_first<M: StateSpaceModel + ?Sized>(
    model: &M, dist_t: &dyn ConditionalDensity, seed: u64,
) -> FilterResult<ParticleCloud> {
    let ctrl = model.ctrl();
    let prior = model.prior();
    let dists: [&dyn ConditionalDensity; 2] = [prior, dist_t];
    let mode = mode_approximation_with_budget(
        &dists,
        prior.mean(),
        ctrl.nu,
        ctrl.covar_fac,
        ctrl.ftol_rel,
        ctrl.max_it,
    );
    let proposal = mode
        .into_proposal()
        .map_err(|status| FilterError::ModeApproximation { period: 0, particle: 0, status })?;

    let n = ctrl.n_part;
    let draws = ctrl.pool().install(|| {
        (0..n)
            .into_par_iter()
            .map(|i| draw(&proposal, &mut particle_rng(seed, 0, n, i)))
            .collect::<FilterResult<Vec<_>>>()
    })?;
    Ok(assemble(draws, model.state_dim(), (0..n).collect()))
}

/// Draw the cloud of `period` (> 0) given the previous one.
///
/// # Errors
/// - [`FilterError::ModeApproximation`] naming the first failing particle.
/// - Density errors raised while building conditionals or sampling.
pub fn sample<M: StateSpaceModel + ?Sized>(
    model: &M, dist_t: &dyn ConditionalDensity, prev: &ParticleCloud, period: usize, seed: u64,
) -> FilterResult<ParticleCloud> {
    let ctrl = model.ctrl();
    let trans = model.get_sta_dist(period)?;
    let trans = trans.as_ref();
    let n = ctrl.n_part;
    let parents: Vec<usize> = (0..n).collect();

    let draws = ctrl.pool().install(|| {
        parents
            .par_iter()
            .enumerate()
            .map(|(i, &parent)| -> FilterResult<(Array1<f64>, f64)> {
                let prior = trans.conditional(prev.particle(parent))?;
                let dists: [&dyn ConditionalDensity; 2] = [&prior, dist_t];
                let proposal = mode_approximation_with_budget(
                    &dists,
                    prior.mean(),
                    ctrl.nu,
                    ctrl.covar_fac,
                    ctrl.ftol_rel,
                    ctrl.max_it,
                )
                .into_proposal()
                .map_err(|status| FilterError::ModeApproximation { period, particle: i, status })?;
                draw(&proposal, &mut particle_rng(seed, period, n, i))
            })
            .collect::<FilterResult<Vec<_>>>()
    })?;
    Ok(assemble(draws, model.state_dim(), parents))
}

// ---- Helper Methods ----

/// The RNG of particle `i` in `period`: the run seed with its own stream.
pub(crate) fn particle_rng(seed: u64, period: usize, n_part: usize, i: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream((period * n_part + i) as u64);
    rng
}

fn draw(proposal: &ProposalDist, rng: &mut ChaCha8Rng) -> FilterResult<(Array1<f64>, f64)> {
    let x = proposal.sample(rng)?;
    let log_q = proposal.log_density(x.view())?;
    Ok((x, log_q))
}

fn assemble(draws: Vec<(Array1<f64>, f64)>, state_dim: usize, parents: Vec<usize>) -> ParticleCloud {
    let n = draws.len();
    let mut particles = Array2::<f64>::zeros((state_dim, n));
    let mut dens_given_prop = Array1::<f64>::zeros(n);
    for (i, (x, log_q)) in draws.into_iter().enumerate() {
        particles.column_mut(i).assign(&x);
        dens_given_prop[i] = log_q;
    }
    ParticleCloud::new(particles, dens_given_prop, parents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::densities::{CompOut, Family};
    use crate::filter::problem::{ControlObj, ObservationData, ProblemData, StateModel};
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Shapes and bookkeeping of sampled clouds.
    // - Reproducibility across thread counts for a fixed seed.
    //
    // They intentionally DO NOT cover:
    // - Weights and statistics (see `filter::stats`).
    // -------------------------------------------------------------------------

    fn problem(n_threads: usize) -> ProblemData {
        let obs = ObservationData {
            y: array![1.0, 0.0, 1.0],
            x: Array2::zeros((0, 3)),
            z: array![[1.0, 0.3, 1.0], [0.2, 1.0, -0.4]],
            cfix: Array1::zeros(0),
            ws: array![1.0, 1.0, 1.0],
            offsets: array![0.0, 0.0, 0.0],
            time_indices: vec![vec![0], vec![1, 2]],
            family: Family::BinomialLogit,
            disp: None,
        };
        let state = StateModel {
            f: array![[0.8, 0.1], [0.0, 0.9]],
            q: array![[0.3, 0.05], [0.05, 0.2]],
            q0: array![[1.0, 0.2], [0.2, 1.5]],
            mu0: array![0.5, -0.5],
        };
        let ctrl =
            ControlObj::new(64, 5.0, 1.1, 1e-10, 50, 0, CompOut::LogDensity, Some(7), n_threads)
                .unwrap();
        ProblemData::new(obs, state, ctrl).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Sampled clouds have the configured shape, identity parents, finite
    // proposal log-densities and unset weights.
    fn sampled_clouds_have_expected_layout() {
        let problem = problem(2);
        let d0 = problem.get_obs_dist(0).unwrap();
        let d1 = problem.get_obs_dist(1).unwrap();

        let first = sample_first(&problem, d0.as_ref(), 11).unwrap();
        let second = sample(&problem, d1.as_ref(), &first, 1, 11).unwrap();

        for cloud in [&first, &second] {
            assert_eq!((cloud.dim_particle(), cloud.n_particles()), (2, 64));
            assert_eq!(cloud.parents, (0..64).collect::<Vec<_>>());
            assert!(cloud.dens_given_prop.iter().all(|v| v.is_finite()));
            assert!(cloud.ws.iter().all(|w| w.is_nan()));
            assert_eq!(cloud.dim_stats(), 0);
        }
        assert_ne!(first.particles, second.particles);
    }

    #[test]
    // Purpose
    // -------
    // Draws depend on the seed only, not on the number of workers.
    //
    // Given
    // -----
    // - The same problem with 1 and 4 threads and the same seed.
    //
    // Expect
    // ------
    // - Identical particles for both periods; a different seed differs.
    fn draws_are_reproducible_across_thread_counts() {
        let (p1, p4) = (problem(1), problem(4));
        let d0 = p1.get_obs_dist(0).unwrap();
        let d1 = p1.get_obs_dist(1).unwrap();

        let a0 = sample_first(&p1, d0.as_ref(), 3).unwrap();
        let b0 = sample_first(&p4, d0.as_ref(), 3).unwrap();
        let a1 = sample(&p1, d1.as_ref(), &a0, 1, 3).unwrap();
        let b1 = sample(&p4, d1.as_ref(), &b0, 1, 3).unwrap();
        let c0 = sample_first(&p1, d0.as_ref(), 4).unwrap();

        assert_eq!(a0.particles, b0.particles);
        assert_eq!(a1.particles, b1.particles);
        assert_ne!(a0.particles, c0.particles);
    }
}
