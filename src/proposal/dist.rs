//! proposal::dist — the closed set of proposal distributions.
use crate::{
    densities::{DensityResult, MvNorm, MvTDist},
    linalg::CholFactor,
};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use std::sync::Arc;

/// Proposal built around a mode: normal when `nu <= 0`, multivariate t with
/// `nu` degrees of freedom otherwise.
///
/// Both variants share the `(mean, covariance)` parameterization; for the t
/// variant `covariance()` is the scale matrix.
#[derive(Debug, Clone)]
pub enum ProposalDist {
    Normal(MvNorm),
    StudentT(MvTDist),
}

impl ProposalDist {
    /// Build the variant selected by `nu` from a mean and covariance.
    ///
    /// # Errors
    /// Propagates a `DensityError::Linalg` if `cov` is not SPD.
    pub fn new(mean: Array1<f64>, cov: &Array2<f64>, nu: f64) -> DensityResult<Self> {
        Self::from_factor(mean, Arc::new(CholFactor::new(cov)?), nu)
    }

    pub fn from_factor(mean: Array1<f64>, chol: Arc<CholFactor>, nu: f64) -> DensityResult<Self> {
        if nu <= 0.0 {
            Ok(ProposalDist::Normal(MvNorm::from_factor(mean, chol)?))
        } else {
            Ok(ProposalDist::StudentT(MvTDist::from_factor(mean, chol, nu)?))
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, ProposalDist::Normal(_))
    }

    pub fn mean(&self) -> &Array1<f64> {
        match self {
            ProposalDist::Normal(d) => d.mean(),
            ProposalDist::StudentT(d) => d.mean(),
        }
    }

    pub fn covariance(&self) -> &Array2<f64> {
        match self {
            ProposalDist::Normal(d) => d.covariance(),
            ProposalDist::StudentT(d) => d.covariance(),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DensityResult<Array1<f64>> {
        match self {
            ProposalDist::Normal(d) => d.sample(rng),
            ProposalDist::StudentT(d) => d.sample(rng),
        }
    }

    pub fn log_density(&self, x: ArrayView1<'_, f64>) -> DensityResult<f64> {
        match self {
            ProposalDist::Normal(d) => d.log_density(x),
            ProposalDist::StudentT(d) => d.log_density(x),
        }
    }
}
