//! densities::families — exponential-family log-densities and their
//! derivatives in the linear predictor.
//!
//! Purpose
//! -------
//! Supply, for each supported family/link pair, the per-observation
//! log-density `ℓ(y; η)` and its first and second derivatives w.r.t. the
//! linear predictor `η`. [`crate::densities::glm::GlmObs`] chains these with
//! the design matrices to get derivatives w.r.t. the state and the fixed
//! effects.
//!
//! Key behaviors
//! -------------
//! - Log-densities include their normalizing constants (`ln Γ` terms via
//!   `statrs`) so that importance weights are proper.
//! - Binomial families accept fractional `y ∈ [0, 1]`; the contribution is
//!   `y ln μ + (1 - y) ln(1 - μ)`.
//! - Derivatives are written in forms that stay finite for large `|η|`.
//!
//! Conventions
//! -----------
//! - `disp` is the dispersion: the variance for `gaussian_identity` and the
//!   inverse shape for `Gamma_log`. Other families ignore it.
//! - Names follow `<family>_<link>`; parsing is case-insensitive.
use crate::densities::errors::DensityError;
use statrs::function::{erf::erfc, gamma::ln_gamma};
use std::{
    f64::consts::{FRAC_1_SQRT_2, PI},
    str::FromStr,
};

/// Observation family and link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    BinomialLogit,
    BinomialCloglog,
    BinomialProbit,
    PoissonLog,
    PoissonSqrt,
    GammaLog,
    GaussianIdentity,
}

impl FromStr for Family {
    type Err = DensityError;

    /// Parse a family name (case-insensitive), e.g. `"binomial_logit"`,
    /// `"Gamma_log"` or `"gaussian_identity"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binomial_logit" => Ok(Family::BinomialLogit),
            "binomial_cloglog" => Ok(Family::BinomialCloglog),
            "binomial_probit" => Ok(Family::BinomialProbit),
            "poisson_log" => Ok(Family::PoissonLog),
            "poisson_sqrt" => Ok(Family::PoissonSqrt),
            "gamma_log" => Ok(Family::GammaLog),
            "gaussian_identity" | "gaussian" => Ok(Family::GaussianIdentity),
            _ => Err(DensityError::InvalidFamily {
                name: s.to_string(),
                reason: "Valid options are 'binomial_logit', 'binomial_cloglog', \
                         'binomial_probit', 'poisson_log', 'poisson_sqrt', 'Gamma_log' \
                         and 'gaussian_identity'.",
            }),
        }
    }
}

impl Family {
    pub fn name(self) -> &'static str {
        match self {
            Family::BinomialLogit => "binomial_logit",
            Family::BinomialCloglog => "binomial_cloglog",
            Family::BinomialProbit => "binomial_probit",
            Family::PoissonLog => "poisson_log",
            Family::PoissonSqrt => "poisson_sqrt",
            Family::GammaLog => "Gamma_log",
            Family::GaussianIdentity => "gaussian_identity",
        }
    }

    /// Whether the family needs a dispersion parameter.
    pub fn uses_dispersion(self) -> bool {
        matches!(self, Family::GammaLog | Family::GaussianIdentity)
    }

    /// Check that `y` lies in the support of the family.
    ///
    /// Binomial responses must be in `[0, 1]`, Poisson responses `>= 0` and
    /// Gamma responses `> 0`. Gaussian responses only need to be finite,
    /// which callers check separately.
    ///
    /// # Errors
    /// [`DensityError::InvalidResponse`] naming the family, `index` and value.
    pub fn check_response(self, index: usize, y: f64) -> Result<(), DensityError> {
        let reason = match self {
            Family::BinomialLogit | Family::BinomialCloglog | Family::BinomialProbit
                if !(0.0..=1.0).contains(&y) =>
            {
                "must lie in [0, 1]"
            }
            Family::PoissonLog | Family::PoissonSqrt if y < 0.0 => "must be non-negative",
            Family::GammaLog if y <= 0.0 => "must be strictly positive",
            _ => return Ok(()),
        };
        Err(DensityError::InvalidResponse { family: self.name(), index, value: y, reason })
    }

    /// Per-observation log-density `ℓ(y; η)`.
    pub fn log_density(self, y: f64, eta: f64, disp: f64) -> f64 {
        match self {
            Family::BinomialLogit => y * eta - softplus(eta),
            Family::BinomialCloglog => {
                let e = eta.exp();
                let mut out = 0.0;
                if y > 0.0 {
                    out += y * (-(-e).exp_m1()).ln();
                }
                if y < 1.0 {
                    out -= (1.0 - y) * e;
                }
                out
            }
            Family::BinomialProbit => {
                let mut out = 0.0;
                if y > 0.0 {
                    out += y * ln_norm_cdf(eta);
                }
                if y < 1.0 {
                    out += (1.0 - y) * ln_norm_cdf(-eta);
                }
                out
            }
            Family::PoissonLog => y * eta - eta.exp() - ln_gamma(y + 1.0),
            Family::PoissonSqrt => {
                let mu = eta * eta;
                let log_term = if y > 0.0 { y * mu.ln() } else { 0.0 };
                log_term - mu - ln_gamma(y + 1.0)
            }
            Family::GammaLog => {
                let k = 1.0 / disp;
                k * k.ln() - k * eta + (k - 1.0) * y.ln() - k * y * (-eta).exp() - ln_gamma(k)
            }
            Family::GaussianIdentity => {
                let r = y - eta;
                -0.5 * (2.0 * PI * disp).ln() - 0.5 * r * r / disp
            }
        }
    }

    /// First and second derivatives of `ℓ(y; η)` w.r.t. `η`.
    pub fn d_eta(self, y: f64, eta: f64, disp: f64) -> (f64, f64) {
        match self {
            Family::BinomialLogit => {
                let mu = logistic(eta);
                (y - mu, -mu * (1.0 - mu))
            }
            Family::BinomialCloglog => {
                let e = eta.exp();
                let one_m_p = -(-e).exp_m1();
                let (mut d, mut dd) = (0.0, 0.0);
                if y < 1.0 {
                    d -= (1.0 - y) * e;
                    dd -= (1.0 - y) * e;
                }
                if y > 0.0 {
                    // e·exp(−e) and e²·exp(−e), which vanish once `e` overflows.
                    let ep = (eta - e).exp();
                    let e2p = (2.0 * eta - e).exp();
                    d += y * ep / one_m_p;
                    dd += y * (ep * one_m_p - e2p) / (one_m_p * one_m_p);
                }
                (d, dd)
            }
            Family::BinomialProbit => {
                let m_pos = mills_ratio(eta);
                let m_neg = mills_ratio(-eta);
                let d = y * m_pos - (1.0 - y) * m_neg;
                let dd = y * (-eta * m_pos - m_pos * m_pos)
                    + (1.0 - y) * (eta * m_neg - m_neg * m_neg);
                (d, dd)
            }
            Family::PoissonLog => {
                let mu = eta.exp();
                (y - mu, -mu)
            }
            Family::PoissonSqrt => {
                (2.0 * y / eta - 2.0 * eta, -2.0 * y / (eta * eta) - 2.0)
            }
            Family::GammaLog => {
                let k = 1.0 / disp;
                let scaled = y * (-eta).exp();
                (k * (scaled - 1.0), -k * scaled)
            }
            Family::GaussianIdentity => ((y - eta) / disp, -1.0 / disp),
        }
    }
}

// ---- Helper Methods ----

fn softplus(x: f64) -> f64 {
    if x > 0.0 { x + (-x).exp().ln_1p() } else { x.exp().ln_1p() }
}

fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Below this point `erfc` underflows and the asymptotic tail is used.
const PROBIT_TAIL: f64 = -37.0;

fn ln_norm_cdf(x: f64) -> f64 {
    if x > PROBIT_TAIL {
        (0.5 * erfc(-x * FRAC_1_SQRT_2)).ln()
    } else {
        -0.5 * x * x - (-x).ln() - 0.5 * (2.0 * PI).ln()
    }
}

/// `φ(x) / Φ(x)`.
fn mills_ratio(x: f64) -> f64 {
    if x > PROBIT_TAIL {
        let pdf = (-0.5 * x * x).exp() / (2.0 * PI).sqrt();
        pdf / (0.5 * erfc(-x * FRAC_1_SQRT_2))
    } else {
        let x2 = x * x;
        -x / (1.0 - 1.0 / x2 + 3.0 / (x2 * x2))
    }
}
