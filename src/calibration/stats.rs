//! Small running-statistics trackers shared by [`super::gyro_cal::GyroCal`].
//!
//! Both trackers follow the same four-operation shape: `update` folds in
//! one more sample, `store` snapshots the live accumulator into the
//! caller-visible field, `evaluate` reports whether the accumulated range
//! has exceeded a caller-supplied limit without touching anything, and
//! `reset` clears the live accumulator.

/// Running mean/min/max of a scalar, used to track temperature drift
/// across a stillness period.
#[derive(Debug, Clone, Copy)]
pub struct ScalarStats {
    sum: f32,
    count: u32,
    min: f32,
    max: f32,
    stored_mean: f32,
}

impl ScalarStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: f32::MAX,
            max: f32::MIN,
            stored_mean: 0.0,
        }
    }

    /// Fold in one more sample.
    pub fn update(&mut self, value: f32) {
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Copy the live running mean into the stored snapshot returned by
    /// [`ScalarStats::stored_mean`].
    pub fn store(&mut self) {
        if self.count > 0 {
            self.stored_mean = self.sum / self.count as f32;
        }
    }

    /// The mean as of the last [`ScalarStats::store`] call.
    #[must_use]
    pub fn stored_mean(&self) -> f32 {
        self.stored_mean
    }

    /// `true` once the live min/max range exceeds `limit`. Does not reset
    /// anything.
    #[must_use]
    pub fn range_exceeds(&self, limit: f32) -> bool {
        self.count > 0 && (self.max - self.min) > limit
    }

    /// Clear the live accumulator. The stored snapshot is untouched.
    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
        self.min = f32::MAX;
        self.max = f32::MIN;
    }
}

impl Default for ScalarStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Running per-axis mean/min/max, used to track how much a detector's
/// per-window mean drifts across consecutive windows during the same
/// stillness period.
#[derive(Debug, Clone, Copy)]
pub struct AxisMeanTracker {
    min: [f32; 3],
    max: [f32; 3],
}

impl AxisMeanTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
        }
    }

    /// Fold in the mean of a just-completed window.
    pub fn update(&mut self, mean: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(mean[axis]);
            self.max[axis] = self.max[axis].max(mean[axis]);
        }
    }

    /// Largest per-axis range seen since the last reset. Does not reset
    /// anything.
    #[must_use]
    pub fn max_range(&self) -> f32 {
        (0..3)
            .map(|axis| {
                if self.max[axis] < self.min[axis] {
                    0.0
                } else {
                    self.max[axis] - self.min[axis]
                }
            })
            .fold(0.0_f32, f32::max)
    }

    pub fn reset(&mut self) {
        self.min = [f32::MAX; 3];
        self.max = [f32::MIN; 3];
    }
}

impl Default for AxisMeanTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_stats_tracks_running_mean_and_range() {
        let mut s = ScalarStats::new();
        s.update(10.0);
        s.update(12.0);
        s.update(14.0);
        s.store();
        assert_eq!(s.stored_mean(), 12.0);
        assert!(s.range_exceeds(3.0));
        assert!(!s.range_exceeds(5.0));
    }

    #[test]
    fn scalar_stats_reset_clears_live_not_stored() {
        let mut s = ScalarStats::new();
        s.update(5.0);
        s.store();
        s.reset();
        assert_eq!(s.stored_mean(), 5.0);
        assert!(!s.range_exceeds(0.0));
    }

    #[test]
    fn axis_mean_tracker_range_grows_across_windows() {
        let mut t = AxisMeanTracker::new();
        t.update([0.0, 0.0, 0.0]);
        assert_eq!(t.max_range(), 0.0);
        t.update([0.01, -0.02, 0.0]);
        assert!((t.max_range() - 0.03).abs() < 1e-6);
        t.reset();
        assert_eq!(t.max_range(), 0.0);
    }
}
