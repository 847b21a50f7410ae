//! Adapter that exposes a sum of conditional densities as an `argmin` problem.
//!
//! The mode finder *maximizes* `ℓ(x) = Σₖ log pₖ(x)`. `argmin` minimizes, so
//! the cost is `c(x) = -ℓ(x)`; the gradient and Hessian are negated
//! accordingly. At a log-concave mode the cost Hessian is the negated
//! log-density Hessian, i.e. SPD.
use crate::{
    densities::ConditionalDensity,
    proposal::errors::{ModeError, ModeResult},
};
use argmin::core::{CostFunction, Error, Gradient, Hessian};
use ndarray::{Array1, Array2};

/// Bridges a slice of density components to `argmin`'s problem traits.
#[derive(Clone, Copy)]
pub struct ModeAdapter<'a> {
    pub dists: &'a [&'a dyn ConditionalDensity],
}

impl<'a> ModeAdapter<'a> {
    pub fn new(dists: &'a [&'a dyn ConditionalDensity]) -> Self {
        Self { dists }
    }

    /// State dimension shared by the components (0 for an empty slice).
    pub fn dim(&self) -> usize {
        self.dists.first().map_or(0, |d| d.state_dim())
    }

    /// Summed log-density, adding the summed derivatives into the buffers.
    pub fn log_density(
        &self, x: &Array1<f64>, mut gr: Option<&mut Array1<f64>>,
        mut hess: Option<&mut Array2<f64>>,
    ) -> ModeResult<f64> {
        let mut out = 0.0;
        for dist in self.dists {
            out += dist.log_density_state(x.view(), gr.as_deref_mut(), hess.as_deref_mut())?;
        }
        if !out.is_finite() {
            return Err(ModeError::NonFiniteObjective { value: out });
        }
        Ok(out)
    }
}

impl CostFunction for ModeAdapter<'_> {
    type Param = Array1<f64>;
    type Output = f64;

    /// `c(x) = -Σₖ log pₖ(x)`.
    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        Ok(-self.log_density(x, None, None)?)
    }
}

impl Gradient for ModeAdapter<'_> {
    type Param = Array1<f64>;
    type Gradient = Array1<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, Error> {
        let mut gr = Array1::<f64>::zeros(x.len());
        self.log_density(x, Some(&mut gr), None)?;
        Ok(-gr)
    }
}

impl Hessian for ModeAdapter<'_> {
    type Param = Array1<f64>;
    type Hessian = Array2<f64>;

    fn hessian(&self, x: &Self::Param) -> Result<Self::Hessian, Error> {
        let n = x.len();
        let mut hess = Array2::<f64>::zeros((n, n));
        self.log_density(x, None, Some(&mut hess))?;
        Ok(-hess)
    }
}
