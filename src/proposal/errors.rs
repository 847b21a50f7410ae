use crate::{densities::DensityError, linalg::LinalgError};

/// Result alias for the mode finder internals.
pub type ModeResult<T> = Result<T, ModeError>;

/// Failures raised inside the Newton iteration.
///
/// These travel through `argmin` as boxed errors and end up as the status
/// string of a failed [`ModeApproximation`](crate::proposal::ModeApproximation).
#[derive(Debug, Clone, PartialEq)]
pub enum ModeError {
    /// The solver state carried no parameter vector.
    MissingParameter,

    /// The summed log-density is NaN or infinite.
    NonFiniteObjective { value: f64 },

    /// Step halving could not find a point that improves the objective.
    NoProgress { decrement: f64 },

    /// Starting point has the wrong dimension.
    StartDimMismatch { expected: usize, found: usize },

    /// A component failed to evaluate, or a factorization failed.
    Density(DensityError),
}

impl std::error::Error for ModeError {}

impl std::fmt::Display for ModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeError::MissingParameter => write!(f, "Solver state has no parameter vector"),
            ModeError::NonFiniteObjective { value } => {
                write!(f, "Non-finite log-density value: {value}")
            }
            ModeError::NoProgress { decrement } => {
                write!(f, "Line search failed to improve the objective (Newton decrement {decrement})")
            }
            ModeError::StartDimMismatch { expected, found } => {
                write!(f, "Starting point dimension mismatch: expected {expected}, found {found}")
            }
            ModeError::Density(err) => write!(f, "{err}"),
        }
    }
}

impl From<DensityError> for ModeError {
    fn from(err: DensityError) -> Self {
        ModeError::Density(err)
    }
}

impl From<LinalgError> for ModeError {
    fn from(err: LinalgError) -> Self {
        ModeError::Density(DensityError::Linalg(err))
    }
}
