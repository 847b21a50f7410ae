//! filter::hooks — cancellation and progress reporting seams.
use crate::filter::errors::FilterResult;
use ndarray::Array1;

/// Polled by the driver between periods.
pub trait CancellationCheck {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool> CancellationCheck for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Never requests cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationCheck for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Receives per-period summaries when `trace > 0`.
///
/// A failing report is logged and the run continues.
pub trait ProgressReporter {
    fn report(
        &self, period: usize, ess: f64, cloud_mean: &Array1<f64>, stats_mean: &Array1<f64>,
    ) -> FilterResult<()>;
}

/// Writes one `info` line per period through the `log` facade.
///
/// Periods are printed 1-based.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(
        &self, period: usize, ess: f64, cloud_mean: &Array1<f64>, stats_mean: &Array1<f64>,
    ) -> FilterResult<()> {
        log::info!("{}", ess_line(period, ess));
        log::info!("  mean particle: {}", fmt_vec(cloud_mean));
        if !stats_mean.is_empty() {
            log::info!("  mean statistics: {}", fmt_vec(stats_mean));
        }
        Ok(())
    }
}

/// Hooks consulted by [`particle_filter`](crate::filter::particle_filter).
pub struct FilterHooks<'a> {
    pub cancel: &'a dyn CancellationCheck,
    pub reporter: &'a dyn ProgressReporter,
}

impl Default for FilterHooks<'_> {
    fn default() -> Self {
        Self { cancel: &NeverCancel, reporter: &LogReporter }
    }
}

// ---- Helper Methods ----

fn ess_line(period: usize, ess: f64) -> String {
    format!("Effective sample size at {:4}: {ess:12.1}", period + 1)
}

fn fmt_vec(v: &Array1<f64>) -> String {
    v.iter().map(|x| format!("{x:10.4}")).collect::<Vec<_>>().join(" ")
}
