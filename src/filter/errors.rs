use crate::{densities::DensityError, linalg::LinalgError};
#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

/// Result alias for the particle filter.
pub type FilterResult<T> = Result<T, FilterError>;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    // ---- Configuration ----
    /// A tuning parameter in `ControlObj` is out of range.
    InvalidControl { param: &'static str, value: f64, reason: &'static str },

    /// Model data are inconsistent (shapes, indices, period count).
    InvalidProblem { reason: String },

    /// The worker pool could not be created.
    ThreadPool { reason: String },

    // ---- Run time ----
    /// The proposal for one particle could not be trusted.
    ModeApproximation { period: usize, particle: usize, status: String },

    /// A particle's weight or statistics became NaN or infinite.
    NonFiniteStatistic { period: usize, particle: usize },

    /// Every particle of a period has zero weight.
    DegenerateWeights { period: usize },

    /// A cancellation request was observed before `period` started.
    Cancelled { period: usize },

    /// The progress reporter failed.
    Report { reason: String },

    // ---- Wrappers ----
    Density(DensityError),
    Linalg(LinalgError),
}

impl std::error::Error for FilterError {}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration ----
            FilterError::InvalidControl { param, value, reason } => {
                write!(f, "Invalid control parameter {param} = {value}: {reason}")
            }
            FilterError::InvalidProblem { reason } => write!(f, "Invalid problem: {reason}"),
            FilterError::ThreadPool { reason } => {
                write!(f, "Failed to build thread pool: {reason}")
            }

            // ---- Run time ----
            FilterError::ModeApproximation { period, particle, status } => write!(
                f,
                "Mode approximation failed at period {period} for particle {particle}: {status}"
            ),
            FilterError::NonFiniteStatistic { period, particle } => write!(
                f,
                "Non-finite weight or statistic at period {period} for particle {particle}"
            ),
            FilterError::DegenerateWeights { period } => {
                write!(f, "All particle weights are zero at period {period}")
            }
            FilterError::Cancelled { period } => {
                write!(f, "Particle filter cancelled before period {period}")
            }
            FilterError::Report { reason } => write!(f, "Progress report failed: {reason}"),

            // ---- Wrappers ----
            FilterError::Density(err) => write!(f, "{err}"),
            FilterError::Linalg(err) => write!(f, "{err}"),
        }
    }
}

impl From<DensityError> for FilterError {
    fn from(err: DensityError) -> Self {
        FilterError::Density(err)
    }
}

impl From<LinalgError> for FilterError {
    fn from(err: LinalgError) -> Self {
        FilterError::Linalg(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for FilterError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        FilterError::ThreadPool { reason: err.to_string() }
    }
}

#[cfg(feature = "python-bindings")]
impl From<FilterError> for PyErr {
    fn from(err: FilterError) -> PyErr {
        match err {
            FilterError::Cancelled { .. } => {
                pyo3::exceptions::PyKeyboardInterrupt::new_err(format!("FilterError: {err}"))
            }
            _ => PyValueError::new_err(format!("FilterError: {err}")),
        }
    }
}
