//! proposal::finite_diff — numerical checks of analytic state derivatives.
//!
//! The mode finder trusts each component's analytic gradient and Hessian.
//! [`check_state_derivatives`] compares both against central differences of
//! the component itself so new components can be validated before use.
use crate::densities::{ConditionalDensity, DensityError, DensityResult};
use finitediff::FiniteDiff;
use ndarray::{Array1, Array2, ArrayView1};
use std::cell::RefCell;

/// Largest absolute deviations between analytic and numerical derivatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeCheck {
    pub max_grad_err: f64,
    pub max_hess_err: f64,
}

/// Compare `dist`'s analytic state gradient and Hessian at `x` with central
/// finite differences.
///
/// The numerical gradient differentiates `log_density_state`; the numerical
/// Hessian differentiates the analytic gradient.
///
/// Errors
/// ------
/// - Any [`DensityError`] raised while evaluating `dist`, including those
///   raised at the perturbed points.
pub fn check_state_derivatives(
    dist: &dyn ConditionalDensity, x: ArrayView1<'_, f64>,
) -> DensityResult<DerivativeCheck> {
    let n = x.len();
    let x0 = x.to_owned();
    let mut gr = Array1::<f64>::zeros(n);
    let mut hess = Array2::<f64>::zeros((n, n));
    dist.log_density_state(x.view(), Some(&mut gr), Some(&mut hess))?;

    let closure_err: RefCell<Option<DensityError>> = RefCell::new(None);
    let value = |p: &Array1<f64>| -> f64 {
        dist.log_density_state(p.view(), None, None).unwrap_or_else(|err| {
            closure_err.replace(Some(err));
            f64::NAN
        })
    };
    let gradient = |p: &Array1<f64>| -> Array1<f64> {
        let mut g = Array1::<f64>::zeros(p.len());
        if let Err(err) = dist.log_density_state(p.view(), Some(&mut g), None) {
            closure_err.replace(Some(err));
        }
        g
    };

    let fd_grad = x0.central_diff(&value);
    let fd_hess = x0.central_hessian(&gradient);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }

    let max_grad_err = (&gr - &fd_grad).iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let max_hess_err = (&hess - &fd_hess).iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    Ok(DerivativeCheck { max_grad_err, max_hess_err })
}
