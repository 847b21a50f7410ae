//! densities — pluggable density components for the state-space model.
//!
//! Purpose
//! -------
//! Host the conditional-density contract and its implementations: the
//! Gaussian prior and linear-Gaussian transition of the latent state, the
//! exponential-family observation densities, and the multivariate t used as
//! a heavy-tailed proposal.
//!
//! Key behaviors
//! -------------
//! - [`ConditionalDensity`] / [`TransitionDensity`] are the open set of
//!   components the mode finder and the filter combine; adding a new
//!   observation family means implementing the contract, not touching the
//!   optimizer.
//! - [`GlmObs`] evaluates a period's observations for any [`Family`] and
//!   produces fixed-effect statistics.
//! - [`MvNorm`] and [`MvNormReg`] share covariance factors through `Arc`
//!   so per-particle conditionals are cheap.
//!
//! Invariants & assumptions
//! ------------------------
//! - Statistic accumulation always adds into caller buffers.
//! - All components are `Send + Sync` and immutable after construction.
//!
//! Downstream usage
//! ----------------
//! - `proposal::mode_approximation` takes `&[&dyn ConditionalDensity]`.
//! - `filter::problem::ProblemData` builds one [`GlmObs`] per period and a
//!   single [`MvNormReg`] for the whole run.
//!
//! Testing notes
//! -------------
//! - Each component checks its analytic derivatives against finite
//!   differences; the families additionally compare against `statrs`
//!   reference densities.
pub mod errors;
pub mod families;
pub mod glm;
pub mod mv_norm;
pub mod mv_tdist;
pub mod traits;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{DensityError, DensityResult};
pub use self::families::Family;
pub use self::glm::GlmObs;
pub use self::mv_norm::{MvNorm, MvNormReg};
pub use self::mv_tdist::MvTDist;
pub use self::traits::{CompOut, ConditionalDensity, TransitionDensity};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::{
        CompOut, ConditionalDensity, DensityError, DensityResult, Family, GlmObs, MvNorm,
        MvNormReg, MvTDist, TransitionDensity,
    };
}
