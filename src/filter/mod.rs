//! filter — sequential Monte Carlo over a state-space model.
//!
//! Purpose
//! -------
//! Propagate a weighted particle cloud through the periods of a
//! state-space model with exponential-family observations, using
//! per-particle mode-approximation proposals, and summarize the run as
//! effective sample sizes, a log-likelihood estimate and (optionally) score
//! and information estimates.
//!
//! Key behaviors
//! -------------
//! - [`ControlObj`] holds the tuning parameters and owns the worker pool.
//! - [`ProblemData`] validates model data once and implements
//!   [`StateSpaceModel`], the only view the recursion has of the model.
//! - [`sample_first`] / [`sample`] draw clouds; [`set_ll_n_stat_first`] /
//!   [`set_ll_n_stat`] weight them and accumulate statistics.
//! - [`particle_filter`] runs the recursion with a cancellation check and a
//!   progress reporter ([`FilterHooks`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Per-particle work is independent and runs on the pool; results are
//!   written back by the calling thread, never concurrently into one cloud.
//! - Draws depend only on the run seed, the period and the particle index.
//! - No resampling: ESS is reported, not acted upon.
//!
//! Conventions
//! -----------
//! - Log weights until normalization; `ws_normalized` is linear scale.
//! - Statistics layout `[obs gradient | obs Hessian | state gradient |
//!   state Hessian]` (see [`StatLayout`]).
//!
//! Testing notes
//! -------------
//! - Unit tests cover each step; `tests/integration_particle_filter.rs`
//!   compares a linear-Gaussian run against the Kalman filter.
pub mod cloud;
pub mod driver;
pub mod errors;
pub mod hooks;
pub mod problem;
pub mod sampler;
pub mod stats;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::cloud::ParticleCloud;
pub use self::driver::{PfOutput, StatLayout, particle_filter};
pub use self::errors::{FilterError, FilterResult};
pub use self::hooks::{CancellationCheck, FilterHooks, LogReporter, NeverCancel, ProgressReporter};
pub use self::problem::{ControlObj, ObservationData, ProblemData, StateModel, StateSpaceModel};
pub use self::sampler::{sample, sample_first};
pub use self::stats::{set_ll_n_stat, set_ll_n_stat_first};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::{
        ControlObj, FilterError, FilterHooks, FilterResult, ObservationData, ParticleCloud,
        PfOutput, ProblemData, StateModel, StateSpaceModel, particle_filter,
    };
}
