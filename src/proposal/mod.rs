//! proposal — mode-approximation (Laplace) proposal builder.
//!
//! Purpose
//! -------
//! Given density components that together describe the conditional
//! posterior of one particle's next state, find the posterior mode with a
//! damped Newton iteration and build a normal or multivariate-t proposal
//! from the curvature at the mode.
//!
//! Key behaviors
//! -------------
//! - [`ModeAdapter`] turns `Σₖ log pₖ(x)` into an `argmin` cost with
//!   analytic gradient and Hessian.
//! - [`DampedNewton`] is an `argmin` solver; [`mode_approximation`] runs it
//!   through `argmin::core::Executor` and maps the termination status to a
//!   converged flag and status string.
//! - [`ProposalDist`] is a closed enum of the two proposal families.
//! - [`check_state_derivatives`] validates a component's analytic
//!   derivatives numerically.
//!
//! Invariants & assumptions
//! ------------------------
//! - Proposal covariance is `covar_fac · (−H)⁻¹` at the mode, so scaling
//!   `covar_fac` scales the covariance exactly and leaves the mean alone.
//! - `nu <= 0` selects the normal proposal; `nu > 0` the t with `nu`
//!   degrees of freedom and the same mean/scale.
//! - Components are only read; the search never mutates them.
//!
//! Conventions
//! -----------
//! - Failures (non-SPD curvature, no progress, exhausted budget, evaluation
//!   errors) are folded into `ModeApproximation::any_errors` and `status`.
//!   The caller decides whether to abort.
//!
//! Testing notes
//! -------------
//! - Unit tests cover closed-form Gaussian products and the failure paths.
//! - `tests/integration_mode_approximation.rs` checks the seven observation
//!   families against reference modes and curvatures.
pub mod adapter;
pub mod dist;
pub mod errors;
pub mod finite_diff;
pub mod mode_approximation;
pub mod newton;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::adapter::ModeAdapter;
pub use self::dist::ProposalDist;
pub use self::errors::{ModeError, ModeResult};
pub use self::finite_diff::{DerivativeCheck, check_state_derivatives};
pub use self::mode_approximation::{
    DEFAULT_MAX_IT, ModeApproximation, mode_approximation, mode_approximation_with_budget,
};
pub use self::newton::{DampedNewton, NewtonState};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::{
        ModeApproximation, ProposalDist, check_state_derivatives, mode_approximation,
        mode_approximation_with_budget,
    };
}
