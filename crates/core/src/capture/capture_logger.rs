use std::collections::HashMap;
use std::time::Instant;

/// Observer for capture events.
///
/// The controller reports through this trait so hosts decide where frame
/// counts and stage timings end up.
pub trait CaptureLogger: Send {
    /// Called after every frame attempt with the running totals.
    fn frame(&mut self, accepted: usize, dropped: usize);

    /// Record how long a named stage took, in milliseconds.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-capture summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullCaptureLogger;

impl CaptureLogger for NullCaptureLogger {
    fn frame(&mut self, _accepted: usize, _dropped: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Tracks per-stage timings and frame counts and logs a summary when the
/// capture stops.
///
/// Progress lines are throttled to every `throttle_frames` accepted frames.
pub struct StatsCaptureLogger {
    throttle_frames: usize,
    timings: HashMap<String, Vec<f64>>,
    start_time: Instant,
    accepted: usize,
    dropped: usize,
    messages: Vec<String>,
}

impl StatsCaptureLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            start_time: Instant::now(),
            accepted: 0,
            dropped: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.accepted == 0 && self.dropped == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Capture summary ({} frames, {} dropped, {:.1}s total):",
            self.accepted,
            self.dropped,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                total_ms / durations.len() as f64
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({} calls)",
                durations.len()
            ));
        }

        if self.accepted > 0 && elapsed_ms > 0.0 {
            let fps = self.accepted as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn frames(&self) -> (usize, usize) {
        (self.accepted, self.dropped)
    }
}

impl Default for StatsCaptureLogger {
    fn default() -> Self {
        Self::new(25)
    }
}

impl CaptureLogger for StatsCaptureLogger {
    fn frame(&mut self, accepted: usize, dropped: usize) {
        let newly_accepted = accepted > self.accepted;
        self.accepted = accepted;
        self.dropped = dropped;
        if newly_accepted && accepted % self.throttle_frames == 0 {
            log::info!("Captured {accepted} frames ({dropped} dropped)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
