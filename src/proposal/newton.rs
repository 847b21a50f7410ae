//! proposal::newton — damped Newton iteration as an `argmin` solver.
//!
//! Purpose
//! -------
//! Minimize a smooth convex cost with analytic gradient and Hessian. Each
//! iteration factorizes the Hessian, takes the Newton direction and halves
//! the step until the Armijo condition holds.
//!
//! Key behaviors
//! -------------
//! - Converges when half the Newton decrement (the predicted improvement) or
//!   the realized decrease of the cost is `<= ftol_rel · (|c| + ftol_rel)`.
//! - A Hessian that is not SPD aborts the run with an error; so does a
//!   direction along which no halving improves the cost, unless the
//!   predicted improvement is already at rounding level.
//! - Trial points whose cost is non-finite count as failed steps.
//!
//! Invariants & assumptions
//! ------------------------
//! - The state carries the current parameter and its cost between
//!   iterations; `init` evaluates the cost at the starting point.
//! - Accepted steps never increase the cost, so `argmin`'s best parameter is
//!   the last accepted one.
use crate::{linalg::CholFactor, proposal::errors::ModeError};
use argmin::core::{
    CostFunction, Error, Gradient, Hessian, IterState, KV, Problem, Solver, State,
    TerminationReason,
};
use ndarray::{Array1, Array2};

/// `argmin` state used by [`DampedNewton`].
pub type NewtonState = IterState<Array1<f64>, Array1<f64>, (), Array2<f64>, (), f64>;

/// Armijo sufficient-decrease constant.
const ARMIJO_C1: f64 = 1e-4;

/// Default cap on step halvings per iteration.
pub const DEFAULT_MAX_HALVINGS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DampedNewton {
    ftol_rel: f64,
    max_halvings: usize,
}

impl DampedNewton {
    pub fn new(ftol_rel: f64) -> Self {
        Self { ftol_rel, max_halvings: DEFAULT_MAX_HALVINGS }
    }

    pub fn with_max_halvings(mut self, max_halvings: usize) -> Self {
        self.max_halvings = max_halvings;
        self
    }

    fn tolerance(&self, cost: f64) -> f64 {
        self.ftol_rel * (cost.abs() + self.ftol_rel)
    }
}

impl Default for DampedNewton {
    /// `ftol_rel = 1e-8` with the default number of step halvings.
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl<O> Solver<O, NewtonState> for DampedNewton
where
    O: CostFunction<Param = Array1<f64>, Output = f64>
        + Gradient<Param = Array1<f64>, Gradient = Array1<f64>>
        + Hessian<Param = Array1<f64>, Hessian = Array2<f64>>,
{
    const NAME: &'static str = "Damped Newton";

    fn init(
        &mut self, problem: &mut Problem<O>, mut state: NewtonState,
    ) -> Result<(NewtonState, Option<KV>), Error> {
        let x = state.take_param().ok_or(ModeError::MissingParameter)?;
        let cost = problem.cost(&x)?;
        Ok((state.param(x).cost(cost), None))
    }

    fn next_iter(
        &mut self, problem: &mut Problem<O>, mut state: NewtonState,
    ) -> Result<(NewtonState, Option<KV>), Error> {
        let x = state.take_param().ok_or(ModeError::MissingParameter)?;
        let cost = state.get_cost();
        let grad = problem.gradient(&x)?;
        let hess = problem.hessian(&x)?;

        let chol = CholFactor::new(&hess).map_err(ModeError::from)?;
        let dir = chol.solve(grad.view()).map_err(ModeError::from)?.mapv(|v| -v);
        let decrement = -grad.dot(&dir);
        let tol = self.tolerance(cost);

        if 0.5 * decrement <= tol {
            let state = state.param(x).gradient(grad).hessian(hess);
            return Ok((state.terminate_with(TerminationReason::SolverConverged), None));
        }

        let mut step = 1.0;
        for _ in 0..=self.max_halvings {
            let trial = &x + &(&dir * step);
            match problem.cost(&trial) {
                Ok(c) if c <= cost - ARMIJO_C1 * step * decrement => {
                    let next = state.param(trial).cost(c).gradient(grad).hessian(hess);
                    if cost - c <= tol {
                        return Ok((next.terminate_with(TerminationReason::SolverConverged), None));
                    }
                    return Ok((next, None));
                }
                Ok(_) => step *= 0.5,
                Err(err) if is_non_finite(&err) => step *= 0.5,
                Err(err) => return Err(err),
            }
        }

        // No halving helped; accept only if the predicted gain is rounding noise.
        if 0.5 * decrement <= 1e3 * f64::EPSILON * (cost.abs() + 1.0) {
            let state = state.param(x).gradient(grad).hessian(hess);
            return Ok((state.terminate_with(TerminationReason::SolverConverged), None));
        }
        Err(ModeError::NoProgress { decrement }.into())
    }
}

// ---- Helper Methods ----

fn is_non_finite(err: &Error) -> bool {
    matches!(err.downcast_ref::<ModeError>(), Some(ModeError::NonFiniteObjective { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{densities::ConditionalDensity, densities::MvNorm, proposal::ModeAdapter};
    use approx::assert_abs_diff_eq;
    use argmin::core::{Executor, TerminationStatus};
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // A quadratic cost is minimized by a single full Newton step.
    //
    // Given
    // -----
    // - A single normal component with mean (1, -2).
    //
    // Expect
    // ------
    // - The solver converges to the mean within a couple of iterations.
    fn quadratic_converges_to_mean() {
        // Arrange
        let prior = MvNorm::new(array![1.0, -2.0], &array![[2.0, 0.3], [0.3, 1.0]]).unwrap();
        let dists: [&dyn ConditionalDensity; 1] = [&prior];
        let problem = ModeAdapter::new(&dists);

        // Act
        let res = Executor::new(problem, DampedNewton::new(1e-12))
            .configure(|state| state.param(array![0.0, 0.0]).max_iters(20))
            .run()
            .unwrap();
        let state = res.state();

        // Assert
        assert_eq!(
            state.get_termination_status(),
            &TerminationStatus::Terminated(TerminationReason::SolverConverged)
        );
        assert!(state.get_iter() <= 3);
        let mode = state.get_best_param().unwrap();
        assert_abs_diff_eq!(mode[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(mode[1], -2.0, epsilon = 1e-10);
    }
}
