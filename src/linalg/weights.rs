//! linalg::weights — log-scale weight arithmetic.
//!
//! Purpose
//! -------
//! Provide the stateless numeric helpers used to combine and normalize
//! importance weights: two-term and vector log-sum-exp, max-shifted weight
//! normalization returning the effective sample size, and a squared
//! distance helper.
//!
//! Invariants & assumptions
//! ------------------------
//! - [`normalize_log_weights`] requires at least one finite weight. An
//!   all `-∞` vector has no normalization and yields NaN entries.
//! - Weights equal to `-∞` are valid and normalize to exactly zero.
//!
//! Conventions
//! -----------
//! - Input weights are natural-log scale; [`normalize_log_weights`] writes
//!   linear-scale weights summing to one.
//! - ESS is `1 / Σ wᵢ²` over the normalized weights and lies in `[1, N]`.
use ndarray::{Array1, ArrayView1};

/// Normalize log weights in place and return the effective sample size.
///
/// Parameters
/// ----------
/// - `log_ws`: `&mut Array1<f64>`
///   Natural-log weights on entry; linear-scale normalized weights on exit.
///
/// Returns
/// -------
/// `f64`
///   The effective sample size `1 / Σ wᵢ²`.
///
/// Notes
/// -----
/// - The maximum is subtracted before exponentiating, so spreads of several
///   thousand nats neither overflow nor leave every weight at zero.
pub fn normalize_log_weights(log_ws: &mut Array1<f64>) -> f64 {
    let max_w = log_ws.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut norm_const = 0.0;
    log_ws.mapv_inplace(|d| {
        let e = (d - max_w).exp();
        norm_const += e;
        e
    });

    let mut ess_inv = 0.0;
    log_ws.mapv_inplace(|d| {
        let w = d / norm_const;
        ess_inv += w * w;
        w
    });

    1.0 / ess_inv
}

/// Numerically stable `log(exp(a) + exp(b))`.
///
/// Either argument may be `-∞`; if both are, the result is `-∞`.
pub fn log_sum_log(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    ((a - max).exp() + (b - max).exp()).ln() + max
}

/// Numerically stable `log Σ exp(wᵢ)` given the maximum of `ws`.
///
/// `max_weight` must be `max(ws)`; callers that already track it avoid a
/// second pass.
pub fn log_sum_log_vec(ws: ArrayView1<'_, f64>, max_weight: f64) -> f64 {
    if max_weight == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let norm_constant: f64 = ws.iter().map(|w| (w - max_weight).exp()).sum();
    norm_constant.ln() + max_weight
}

/// Squared Euclidean distance between two equally long vectors.
pub fn norm_square(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
