//! Laplace-style proposal construction around the posterior mode.
use crate::{
    densities::ConditionalDensity,
    linalg::CholFactor,
    proposal::{
        adapter::ModeAdapter,
        dist::ProposalDist,
        errors::ModeError,
        newton::{DampedNewton, NewtonState},
    },
};
use argmin::core::{Executor, State, TerminationReason, TerminationStatus};
use argmin_math::ArgminL2Norm;
use ndarray::{Array1, Array2};

/// Newton iteration budget used by [`mode_approximation`].
pub const DEFAULT_MAX_IT: u64 = 100;

/// Outcome of a mode search.
///
/// Fields
/// ------
/// - `proposal`: normal or t proposal centered at `mode` with covariance
///   `covar_fac · (−H)⁻¹`. `None` when no SPD curvature was available.
/// - `mode`: last accepted iterate (the starting point if the run failed
///   before accepting any step).
/// - `log_density`: summed component log-density at `mode`.
/// - `any_errors`: `true` when the optimizer did not converge, failed, or
///   the curvature at `mode` is not SPD. The proposal must not be used then.
/// - `status`: human-readable termination status or error message.
/// - `iterations`: Newton iterations performed.
/// - `grad_norm`: `‖∇c‖₂` of the cost at the last evaluated iterate.
#[derive(Debug, Clone)]
pub struct ModeApproximation {
    pub proposal: Option<ProposalDist>,
    pub mode: Array1<f64>,
    pub log_density: f64,
    pub any_errors: bool,
    pub status: String,
    pub iterations: u64,
    pub grad_norm: Option<f64>,
}

impl ModeApproximation {
    fn failed(mode: Array1<f64>, status: String, iterations: u64) -> Self {
        Self {
            proposal: None,
            mode,
            log_density: f64::NAN,
            any_errors: true,
            status,
            iterations,
            grad_norm: None,
        }
    }

    /// The proposal if it can be trusted, otherwise the status message.
    pub fn into_proposal(self) -> Result<ProposalDist, String> {
        match self.proposal {
            Some(proposal) if !self.any_errors => Ok(proposal),
            _ => Err(self.status),
        }
    }
}

/// Locate the mode of `Σₖ log pₖ(x)` and build a proposal around it, using
/// the default iteration budget.
///
/// See [`mode_approximation_with_budget`].
pub fn mode_approximation(
    dists: &[&dyn ConditionalDensity], start: &Array1<f64>, nu: f64, covar_fac: f64,
    ftol_rel: f64,
) -> ModeApproximation {
    mode_approximation_with_budget(dists, start, nu, covar_fac, ftol_rel, DEFAULT_MAX_IT)
}

/// Locate the mode of `Σₖ log pₖ(x)` and build a proposal around it.
///
/// Parameters
/// ----------
/// - `dists`: density components, all of the same state dimension.
/// - `start`: starting iterate.
/// - `nu`: `<= 0` selects a normal proposal, `> 0` a t with `nu` degrees of
///   freedom.
/// - `covar_fac`: multiplier applied to the inverse negated Hessian.
/// - `ftol_rel`: relative tolerance on the objective.
/// - `max_it`: Newton iteration budget.
///
/// Returns
/// -------
/// A [`ModeApproximation`]. Failures never panic or return `Err`; they set
/// `any_errors` and describe the cause in `status`.
pub fn mode_approximation_with_budget(
    dists: &[&dyn ConditionalDensity], start: &Array1<f64>, nu: f64, covar_fac: f64,
    ftol_rel: f64, max_it: u64,
) -> ModeApproximation {
    let problem = ModeAdapter::new(dists);
    if start.len() != problem.dim() {
        let err = ModeError::StartDimMismatch { expected: problem.dim(), found: start.len() };
        return ModeApproximation::failed(start.clone(), err.to_string(), 0);
    }

    let x0 = start.clone();
    let run = Executor::new(problem, DampedNewton::new(ftol_rel))
        .configure(|state| state.param(x0).max_iters(max_it))
        .run();
    let mut result: NewtonState = match run {
        Ok(res) => res.state().clone(),
        Err(err) => return ModeApproximation::failed(start.clone(), err.to_string(), 0),
    };

    let iterations = result.get_iter();
    let termination = result.get_termination_status().clone();
    let grad_norm = result.take_gradient().map(|g| g.l2_norm());
    let mode = match result.take_best_param().or_else(|| result.take_param()) {
        Some(mode) => mode,
        None => {
            let err = ModeError::MissingParameter;
            return ModeApproximation::failed(start.clone(), err.to_string(), iterations);
        }
    };
    let (converged, status) = match &termination {
        TerminationStatus::Terminated(TerminationReason::SolverConverged) => {
            (true, format!("{termination:?}"))
        }
        TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
        _ => (false, format!("{termination:?}")),
    };

    let n = mode.len();
    let mut hess = Array2::<f64>::zeros((n, n));
    let log_density = match problem.log_density(&mode, None, Some(&mut hess)) {
        Ok(v) => v,
        Err(err) => return ModeApproximation::failed(mode, err.to_string(), iterations),
    };
    let proposal = build_proposal(&mode, hess, nu, covar_fac);

    match proposal {
        Ok(proposal) => ModeApproximation {
            proposal: Some(proposal),
            mode,
            log_density,
            any_errors: !converged,
            status,
            iterations,
            grad_norm,
        },
        Err(err) => ModeApproximation {
            proposal: None,
            mode,
            log_density,
            any_errors: true,
            status: err.to_string(),
            iterations,
            grad_norm,
        },
    }
}

// ---- Helper Methods ----

/// `covar_fac · (−H)⁻¹` wrapped in the proposal selected by `nu`.
fn build_proposal(
    mode: &Array1<f64>, hess: Array2<f64>, nu: f64, covar_fac: f64,
) -> Result<ProposalDist, ModeError> {
    let neg_hess = hess.mapv(|v| -v);
    let curvature = CholFactor::new(&neg_hess)?;
    let cov = curvature.inverse() * covar_fac;
    Ok(ProposalDist::new(mode.clone(), &cov, nu)?)
}
