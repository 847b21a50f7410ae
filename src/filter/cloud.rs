//! filter::cloud — the weighted particle set of one period.
use ndarray::{Array1, Array2, ArrayView1};

/// Particles, weights and per-particle statistics for one period.
///
/// Fields
/// ------
/// - `particles`: `state_dim × n_part`; column `i` is particle `i`.
/// - `dens_given_prop`: `log q(xᵢ)` under the proposal particle `i` was
///   drawn from.
/// - `parents`: index of each particle's ancestor in the previous cloud.
/// - `ws`: raw log-weights; NaN until the weight step runs.
/// - `ws_normalized`: linear-scale weights summing to one; NaN until the
///   driver normalizes.
/// - `stats`: `stat_dim × n_part`; empty (`0 × 0`) before the weight step
///   and after the next period has consumed it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleCloud {
    pub particles: Array2<f64>,
    pub dens_given_prop: Array1<f64>,
    pub parents: Vec<usize>,
    pub ws: Array1<f64>,
    pub ws_normalized: Array1<f64>,
    pub stats: Array2<f64>,
}

impl ParticleCloud {
    /// A freshly sampled cloud: weights unset and no statistics.
    pub fn new(particles: Array2<f64>, dens_given_prop: Array1<f64>, parents: Vec<usize>) -> Self {
        let n = particles.ncols();
        Self {
            particles,
            dens_given_prop,
            parents,
            ws: Array1::from_elem(n, f64::NAN),
            ws_normalized: Array1::from_elem(n, f64::NAN),
            stats: Array2::zeros((0, 0)),
        }
    }

    pub fn n_particles(&self) -> usize {
        self.particles.ncols()
    }

    pub fn dim_particle(&self) -> usize {
        self.particles.nrows()
    }

    pub fn dim_stats(&self) -> usize {
        self.stats.nrows()
    }

    pub fn particle(&self, i: usize) -> ArrayView1<'_, f64> {
        self.particles.column(i)
    }

    /// Weighted mean `Σ w̄ᵢ xᵢ` of the particles.
    pub fn get_cloud_mean(&self) -> Array1<f64> {
        self.particles.dot(&self.ws_normalized)
    }

    /// Weighted mean of the statistics; empty when none are held.
    pub fn get_stats_mean(&self) -> Array1<f64> {
        if self.stats.is_empty() {
            return Array1::zeros(0);
        }
        self.stats.dot(&self.ws_normalized)
    }

    /// Release the statistics once the next period no longer needs them.
    pub fn clear_stats(&mut self) {
        self.stats = Array2::zeros((0, 0));
    }
}
