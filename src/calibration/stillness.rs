//! Per-sensor stillness detector contract.
//!
//! The detector's internal window statistics are an external collaborator
//! whose correctness [`crate::calibration::gyro_cal`] assumes rather than
//! re-derives. This module defines the contract
//! ([`StillnessDetector`]) and a variance/threshold reference
//! implementation so the calibration pipeline is exercisable end-to-end on
//! a host; a real deployment is expected to substitute a detector tuned
//! per-sensor.

/// Snapshot produced by [`StillnessDetector::compute`] once a window has
/// accumulated enough samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StillnessResult {
    /// Confidence in `[0, 1]` that the sensor was still over the window.
    pub stillness_confidence: f32,
    pub prev_mean: [f32; 3],
    pub prev_variance: [f32; 3],
    pub last_sample_time_nanos: u64,
    pub window_start_time_nanos: u64,
}

/// Feeds raw samples into a per-sensor stillness window and reports a
/// confidence once the window matures.
pub trait StillnessDetector {
    /// Feed one sample. `win_end_time_nanos` is the caller's current
    /// window deadline, shared across all three sensors for a given
    /// calibrator.
    fn update(&mut self, win_end_time_nanos: u64, sample_time_nanos: u64, x: f32, y: f32, z: f32);

    /// Whether the current window has accumulated enough samples for
    /// [`StillnessDetector::compute`] to be meaningful.
    fn is_window_ready(&self) -> bool;

    /// Compute and return this window's statistics. Only meaningful when
    /// [`StillnessDetector::is_window_ready`] is true.
    fn compute(&mut self) -> StillnessResult;

    /// Start a new window. `reset_stats` additionally clears the previous
    /// window's snapshot (`prev_mean`/`prev_variance`/confidence); when
    /// `false`, only the in-progress accumulators are cleared so the
    /// caller can keep reading the last computed snapshot while a new
    /// window accumulates.
    fn reset(&mut self, reset_stats: bool);
}

/// A simple per-axis variance-threshold detector: confidence is `1.0`
/// while the largest per-axis variance stays at or below
/// `var_threshold`, falling off linearly over `confidence_delta` and
/// clamped to `0.0` beyond that.
#[derive(Debug, Clone, Copy)]
pub struct VarianceStillnessDetector {
    var_threshold: f32,
    confidence_delta: f32,

    window_start_nanos: u64,
    window_end_nanos: u64,
    last_sample_time_nanos: u64,
    count: u32,
    sum: [f32; 3],
    sum_sq: [f32; 3],

    prev_mean: [f32; 3],
    prev_variance: [f32; 3],
    prev_confidence: f32,
}

impl VarianceStillnessDetector {
    #[must_use]
    pub fn new(var_threshold: f32, confidence_delta: f32) -> Self {
        Self {
            var_threshold,
            confidence_delta,
            window_start_nanos: 0,
            window_end_nanos: 0,
            last_sample_time_nanos: 0,
            count: 0,
            sum: [0.0; 3],
            sum_sq: [0.0; 3],
            prev_mean: [0.0; 3],
            prev_variance: [0.0; 3],
            prev_confidence: 0.0,
        }
    }
}

impl StillnessDetector for VarianceStillnessDetector {
    fn update(&mut self, win_end_time_nanos: u64, sample_time_nanos: u64, x: f32, y: f32, z: f32) {
        if self.count == 0 {
            self.window_start_nanos = sample_time_nanos;
        }
        self.window_end_nanos = win_end_time_nanos;
        self.last_sample_time_nanos = sample_time_nanos;
        self.sum[0] += x;
        self.sum[1] += y;
        self.sum[2] += z;
        self.sum_sq[0] += x * x;
        self.sum_sq[1] += y * y;
        self.sum_sq[2] += z * z;
        self.count += 1;
    }

    fn is_window_ready(&self) -> bool {
        self.count >= 2 && self.last_sample_time_nanos >= self.window_end_nanos
    }

    fn compute(&mut self) -> StillnessResult {
        let n = f32::from(u16::try_from(self.count).unwrap_or(u16::MAX));
        let mean = [self.sum[0] / n, self.sum[1] / n, self.sum[2] / n];
        let variance = [
            (self.sum_sq[0] / n - mean[0] * mean[0]).max(0.0),
            (self.sum_sq[1] / n - mean[1] * mean[1]).max(0.0),
            (self.sum_sq[2] / n - mean[2] * mean[2]).max(0.0),
        ];
        let max_variance = variance[0].max(variance[1]).max(variance[2]);
        let over = (max_variance - self.var_threshold).max(0.0);
        let confidence = (1.0 - over / self.confidence_delta.max(f32::MIN_POSITIVE)).clamp(0.0, 1.0);

        self.prev_mean = mean;
        self.prev_variance = variance;
        self.prev_confidence = confidence;

        StillnessResult {
            stillness_confidence: confidence,
            prev_mean: mean,
            prev_variance: variance,
            last_sample_time_nanos: self.last_sample_time_nanos,
            window_start_time_nanos: self.window_start_nanos,
        }
    }

    fn reset(&mut self, reset_stats: bool) {
        self.count = 0;
        self.sum = [0.0; 3];
        self.sum_sq = [0.0; 3];
        self.window_start_nanos = 0;
        if reset_stats {
            self.prev_mean = [0.0; 3];
            self.prev_variance = [0.0; 3];
            self.prev_confidence = 0.0;
        }
    }
}
