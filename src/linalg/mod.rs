//! linalg — dense numeric primitives shared by the densities and the filter.
//!
//! Purpose
//! -------
//! Collect the small set of linear-algebra and log-weight utilities the rest
//! of the crate builds on: a cached Cholesky factor, weight normalization
//! with effective-sample-size reporting, log-sum-exp helpers, a scoped
//! zero-and-restore buffer guard, and symmetric rank-one updates.
//!
//! Key behaviors
//! -------------
//! - [`CholFactor`] factorizes an SPD matrix once (via `nalgebra`) and
//!   serves solves, half solves, half multiplies, the log-determinant and a
//!   lazily cached inverse.
//! - [`normalize_log_weights`] turns log weights into linear-scale weights
//!   summing to one and returns the ESS.
//! - [`AddBack`] zeroes a buffer for a scope and adds the original contents
//!   back on every exit path.
//!
//! Invariants & assumptions
//! ------------------------
//! - Nothing here holds process-wide state; all helpers are pure except for
//!   the in-place ones, which only touch their arguments.
//! - Factorization failures are always surfaced as [`LinalgError`], never
//!   swallowed.
//!
//! Downstream usage
//! ----------------
//! - `densities` uses [`CholFactor`] for Gaussian and t log-densities and
//!   [`dsyr`] for GLM Hessians.
//! - `proposal` factorizes the negated Hessian at each Newton step.
//! - `filter` normalizes weights, combines log-likelihood terms and guards
//!   per-particle statistic increments with [`AddBack`].
pub mod add_back;
pub mod chol;
pub mod errors;
pub mod weights;

// ---- Re-exports (primary public surface) ----
pub use self::add_back::{AddBack, dsyr, symmetrize_upper};
pub use self::chol::CholFactor;
pub use self::errors::{LinalgError, LinalgResult};
pub use self::weights::{log_sum_log, log_sum_log_vec, norm_square, normalize_log_weights};
