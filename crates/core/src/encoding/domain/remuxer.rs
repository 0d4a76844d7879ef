use std::path::Path;

use crate::shared::error::CaptureError;

/// Outcome of a successful remux.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemuxReport {
    pub packets_read: usize,
    pub packets_written: usize,
    /// Sum of all written packet durations, in `time_base` units.
    pub duration_ticks: i64,
    /// Output stream time base as `(numerator, denominator)`.
    pub time_base: (i32, i32),
}

impl RemuxReport {
    pub fn duration_secs(&self) -> f64 {
        let (num, den) = self.time_base;
        if den == 0 {
            return 0.0;
        }
        self.duration_ticks as f64 * num as f64 / den as f64
    }
}

/// Rewrites a finished elementary stream into its final container.
pub trait Remuxer: Send {
    fn remux(&self, input: &Path, output: &Path) -> Result<RemuxReport, CaptureError>;
}
