//! Online gyroscope bias calibration driven by device stillness.
//!
//! Three stillness detectors (accelerometer, gyroscope, magnetometer)
//! each watch a shared time window. When all required detectors agree
//! the device has been still for long enough, the gyroscope's own
//! window mean over that period becomes a new bias estimate.

use super::stats::{AxisMeanTracker, ScalarStats};
use super::stillness::{StillnessDetector, StillnessResult};

/// Upper bound on the magnitude of any accepted bias axis, in rad/s.
/// A computed mean outside this range is assumed to be real rotation,
/// not sensor offset, and is rejected.
pub const MAX_GYRO_BIAS: f32 = 0.1;

/// `1000 * 180 / pi`, converts rad/s to millidegrees/s for debug output.
pub const RAD_TO_MILLI_DEGREES: f32 = 1000.0 * 180.0 / core::f32::consts::PI;

/// Tunable thresholds for [`GyroCal`]. Defaults live in
/// [`crate::config::RuntimeConfig`].
#[derive(Debug, Clone, Copy)]
pub struct GyroCalConfig {
    pub stillness_threshold: f32,
    pub stillness_mean_delta_limit: f32,
    pub temperature_delta_limit_celsius: f32,
    pub min_still_duration_nanos: u64,
    pub max_still_duration_nanos: u64,
    pub window_time_duration_nanos: u64,
    pub using_mag_sensor: bool,
}

/// Online gyroscope bias calibrator. Generic over the stillness detector
/// implementation so a host build can use a lightweight reference
/// detector while a target build supplies one tuned to its sensors.
pub struct GyroCal<D: StillnessDetector> {
    accel: D,
    gyro: D,
    mag: D,

    gyro_mean_tracker: AxisMeanTracker,
    temperature_stats: ScalarStats,
    last_temperature_celsius: Option<f32>,

    bias: [f32; 3],
    bias_temperature_celsius: f32,
    calibration_time_nanos: u64,
    last_stillness_confidence: f32,
    new_gyro_cal_available: bool,
    calibration_count: u32,

    prev_still: bool,
    start_still_time_nanos: u64,
    stillness_win_endtime_nanos: u64,

    gyro_watchdog_start_nanos: u64,
    gyro_watchdog_timeout_duration_nanos: u64,
    watchdog_timeout_count: u32,
    watchdog_timed_out: bool,

    using_mag_sensor: bool,
    enabled: bool,

    stillness_threshold: f32,
    stillness_mean_delta_limit: f32,
    temperature_delta_limit_celsius: f32,
    min_still_duration_nanos: u64,
    max_still_duration_nanos: u64,
    window_time_duration_nanos: u64,
}

impl<D: StillnessDetector> GyroCal<D> {
    pub fn new(accel: D, gyro: D, mag: D, config: GyroCalConfig) -> Self {
        Self {
            accel,
            gyro,
            mag,
            gyro_mean_tracker: AxisMeanTracker::new(),
            temperature_stats: ScalarStats::new(),
            last_temperature_celsius: None,
            bias: [0.0; 3],
            bias_temperature_celsius: 0.0,
            calibration_time_nanos: 0,
            last_stillness_confidence: 0.0,
            new_gyro_cal_available: false,
            calibration_count: 0,
            prev_still: false,
            start_still_time_nanos: 0,
            stillness_win_endtime_nanos: 0,
            gyro_watchdog_start_nanos: 0,
            gyro_watchdog_timeout_duration_nanos: 2 * config.window_time_duration_nanos,
            watchdog_timeout_count: 0,
            watchdog_timed_out: false,
            using_mag_sensor: config.using_mag_sensor,
            enabled: true,
            stillness_threshold: config.stillness_threshold,
            stillness_mean_delta_limit: config.stillness_mean_delta_limit,
            temperature_delta_limit_celsius: config.temperature_delta_limit_celsius,
            min_still_duration_nanos: config.min_still_duration_nanos,
            max_still_duration_nanos: config.max_still_duration_nanos,
            window_time_duration_nanos: config.window_time_duration_nanos,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn update_accel(&mut self, sample_time_nanos: u64, x: f32, y: f32, z: f32) {
        self.accel
            .update(self.stillness_win_endtime_nanos, sample_time_nanos, x, y, z);
        self.device_stillness_check(sample_time_nanos);
    }

    pub fn update_mag(&mut self, sample_time_nanos: u64, x: f32, y: f32, z: f32) {
        self.mag
            .update(self.stillness_win_endtime_nanos, sample_time_nanos, x, y, z);
        self.using_mag_sensor = true;
        self.device_stillness_check(sample_time_nanos);
    }

    pub fn update_gyro(&mut self, sample_time_nanos: u64, x: f32, y: f32, z: f32, temperature_celsius: f32) {
        if self.stillness_win_endtime_nanos == 0 {
            self.stillness_win_endtime_nanos = sample_time_nanos + self.window_time_duration_nanos;
            self.gyro_watchdog_start_nanos = sample_time_nanos;
        }

        let temperature_changed = match self.last_temperature_celsius {
            Some(prev) => (temperature_celsius - prev).abs() > f32::MIN_POSITIVE,
            None => true,
        };
        if temperature_changed {
            self.temperature_stats.update(temperature_celsius);
            self.last_temperature_celsius = Some(temperature_celsius);
        }

        self.gyro
            .update(self.stillness_win_endtime_nanos, sample_time_nanos, x, y, z);
        self.device_stillness_check(sample_time_nanos);
    }

    /// Current bias estimate: `(bx, by, bz, bias_temperature_celsius)`.
    #[must_use]
    pub fn get_bias(&self) -> (f32, f32, f32, f32) {
        (self.bias[0], self.bias[1], self.bias[2], self.bias_temperature_celsius)
    }

    pub fn set_bias(&mut self, bx: f32, by: f32, bz: f32, calibration_time_nanos: u64) {
        self.bias = [bx, by, bz];
        self.calibration_time_nanos = calibration_time_nanos;
    }

    /// `true` iff a calibration landed since the last call. Self-clearing:
    /// the flag is reset on every call regardless of the enable gate.
    pub fn new_bias_available(&mut self) -> bool {
        let available = self.enabled && self.new_gyro_cal_available;
        self.new_gyro_cal_available = false;
        available
    }

    /// Subtract the current bias, or pass through unchanged when
    /// disabled.
    #[must_use]
    pub fn remove_bias(&self, xi: f32, yi: f32, zi: f32) -> (f32, f32, f32) {
        if self.enabled {
            (xi - self.bias[0], yi - self.bias[1], zi - self.bias[2])
        } else {
            (xi, yi, zi)
        }
    }

    #[must_use]
    pub fn bias_millidegrees_per_sec(&self) -> (f32, f32, f32) {
        (
            self.bias[0] * RAD_TO_MILLI_DEGREES,
            self.bias[1] * RAD_TO_MILLI_DEGREES,
            self.bias[2] * RAD_TO_MILLI_DEGREES,
        )
    }

    #[must_use]
    pub fn watchdog_timeout_count(&self) -> u32 {
        self.watchdog_timeout_count
    }

    /// Sticky flag raised by a watchdog recovery; never cleared
    /// internally. A deployment clears it (by dropping and replacing the
    /// value it reads) once it has logged the event.
    #[must_use]
    pub fn watchdog_timed_out(&self) -> bool {
        self.watchdog_timed_out
    }

    #[must_use]
    pub fn calibration_count(&self) -> u32 {
        self.calibration_count
    }

    #[must_use]
    pub fn stillness_confidence(&self) -> f32 {
        self.last_stillness_confidence
    }

    fn device_stillness_check(&mut self, sample_time_nanos: u64) {
        self.check_watchdog(sample_time_nanos);

        let mag_ready = self.mag.is_window_ready();
        if (self.using_mag_sensor && !mag_ready) || !self.accel.is_window_ready() || !self.gyro.is_window_ready() {
            return;
        }

        self.stillness_win_endtime_nanos = sample_time_nanos + self.window_time_duration_nanos;

        let accel_r = self.accel.compute();
        let gyro_r = self.gyro.compute();
        let mag_r = if self.using_mag_sensor {
            self.mag.compute()
        } else {
            StillnessResult {
                stillness_confidence: 1.0,
                ..StillnessResult::default()
            }
        };

        self.gyro_mean_tracker.update(gyro_r.prev_mean);

        let conf_not_rot = gyro_r.stillness_confidence * mag_r.stillness_confidence;
        let conf_not_accel = accel_r.stillness_confidence;
        let conf_still = conf_not_rot * conf_not_accel;

        let mean_not_stable = self.gyro_mean_tracker.max_range() > self.stillness_mean_delta_limit;
        let temp_exceeded = self.temperature_stats.range_exceeds(self.temperature_delta_limit_celsius);

        let device_is_still = conf_still > self.stillness_threshold && !mean_not_stable && !temp_exceeded;

        if device_is_still {
            if !self.prev_still {
                self.start_still_time_nanos = gyro_r.window_start_time_nanos;
            }
            self.temperature_stats.store();

            let duration_exceeded =
                gyro_r.last_sample_time_nanos.saturating_sub(self.start_still_time_nanos) > self.max_still_duration_nanos;

            if duration_exceeded {
                self.emit_calibration(gyro_r.last_sample_time_nanos, &accel_r, &gyro_r, &mag_r);
                self.reset_all(true);
                self.prev_still = false;
            } else {
                self.reset_all(false);
                self.prev_still = true;
            }
        } else {
            let too_short =
                gyro_r.window_start_time_nanos.saturating_sub(self.start_still_time_nanos) < self.min_still_duration_nanos;
            if self.prev_still && !too_short {
                self.emit_calibration(gyro_r.window_start_time_nanos, &accel_r, &gyro_r, &mag_r);
            }
            self.reset_all(true);
            self.prev_still = false;
        }

        self.gyro_watchdog_start_nanos = sample_time_nanos;
    }

    fn check_watchdog(&mut self, sample_time_nanos: u64) {
        if self.gyro_watchdog_start_nanos == 0 {
            return;
        }
        let timed_out = sample_time_nanos > self.gyro_watchdog_timeout_duration_nanos + self.gyro_watchdog_start_nanos;
        if !timed_out {
            return;
        }

        self.reset_all(true);
        self.stillness_win_endtime_nanos = 0;
        self.last_stillness_confidence = 0.0;
        self.prev_still = false;
        if self.using_mag_sensor && !self.mag.is_window_ready() {
            self.using_mag_sensor = false;
        }
        self.watchdog_timeout_count += 1;
        self.watchdog_timed_out = true;
        self.gyro_watchdog_start_nanos = 0;
    }

    fn emit_calibration(
        &mut self,
        calibration_time_nanos: u64,
        accel_r: &StillnessResult,
        gyro_r: &StillnessResult,
        mag_r: &StillnessResult,
    ) {
        let mean = gyro_r.prev_mean;
        let in_range = mean.iter().all(|axis| *axis > -MAX_GYRO_BIAS && *axis < MAX_GYRO_BIAS);
        if !in_range {
            return;
        }

        self.bias = mean;
        self.bias_temperature_celsius = self.temperature_stats.stored_mean();
        self.calibration_time_nanos = calibration_time_nanos;
        self.last_stillness_confidence =
            accel_r.stillness_confidence * gyro_r.stillness_confidence * mag_r.stillness_confidence;
        self.new_gyro_cal_available = true;
        self.calibration_count += 1;
    }

    fn reset_all(&mut self, reset_stats: bool) {
        self.accel.reset(reset_stats);
        self.gyro.reset(reset_stats);
        self.mag.reset(reset_stats);
        if reset_stats {
            self.gyro_mean_tracker.reset();
            self.temperature_stats.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::stillness::VarianceStillnessDetector;

    const WINDOW_NANOS: u64 = 500_000_000;

    fn config() -> GyroCalConfig {
        GyroCalConfig {
            stillness_threshold: 0.95,
            stillness_mean_delta_limit: 0.000_313,
            temperature_delta_limit_celsius: 1.5,
            min_still_duration_nanos: 1_500_000_000,
            max_still_duration_nanos: 5_000_000_000,
            window_time_duration_nanos: WINDOW_NANOS,
            using_mag_sensor: false,
        }
    }

    fn new_cal() -> GyroCal<VarianceStillnessDetector> {
        GyroCal::new(
            VarianceStillnessDetector::new(0.001, 0.01),
            VarianceStillnessDetector::new(0.001, 0.01),
            VarianceStillnessDetector::new(0.001, 0.01),
            config(),
        )
    }

    fn drive_still(cal: &mut GyroCal<VarianceStillnessDetector>, start_nanos: u64, end_nanos: u64) {
        let mut t = start_nanos;
        while t <= end_nanos {
            cal.update_accel(t, 0.0, 0.0, 9.81);
            cal.update_gyro(t, 0.0001, -0.0001, 0.0, 25.0);
            t += 100_000_000;
        }
    }

    #[test]
    fn long_stillness_emits_calibration_and_clears_available_once() {
        let mut cal = new_cal();
        drive_still(&mut cal, 0, 6_000_000_000);
        assert!(cal.new_bias_available());
        assert!(!cal.new_bias_available());
        let (bx, by, bz, _temp) = cal.get_bias();
        assert!(bx.abs() < MAX_GYRO_BIAS);
        assert!(by.abs() < MAX_GYRO_BIAS);
        assert!(bz.abs() < MAX_GYRO_BIAS);
        assert_eq!(cal.calibration_count(), 1);
    }

    /// Shakes the accelerometer while the gyroscope keeps reading the same
    /// small, in-range values: the accelerometer's confidence collapses
    /// (device picked up and jostled) while the gyro mean stays usable,
    /// matching the still-to-not-still emission path.
    fn drive_accel_jitter(cal: &mut GyroCal<VarianceStillnessDetector>, start_nanos: u64, samples: u32) {
        let mut t = start_nanos;
        for i in 0..samples {
            let jitter = if i % 2 == 0 { 5.0 } else { -5.0 };
            cal.update_accel(t, jitter, jitter, 9.81);
            cal.update_gyro(t, 0.0001, -0.0001, 0.0, 25.0);
            t += 100_000_000;
        }
    }

    #[test]
    fn stillness_then_accel_jitter_emits_on_transition_out() {
        let mut cal = new_cal();
        drive_still(&mut cal, 0, 2_000_000_000);
        drive_accel_jitter(&mut cal, 2_100_000_000, 5);
        assert!(cal.new_bias_available());
        assert_eq!(cal.calibration_count(), 1);
    }

    #[test]
    fn stillness_shorter_than_minimum_does_not_emit() {
        let mut cal = new_cal();
        drive_still(&mut cal, 0, 600_000_000);
        drive_accel_jitter(&mut cal, 700_000_000, 5);
        assert!(!cal.new_bias_available());
        assert_eq!(cal.calibration_count(), 0);
    }

    #[test]
    fn watchdog_disarms_window_after_stalled_gyro_stream() {
        let mut cal = new_cal();
        cal.update_gyro(1_000_000, 0.0, 0.0, 0.0, 25.0);
        assert_ne!(cal.stillness_win_endtime_nanos, 0);
        cal.update_gyro(1_600_000_000, 0.0, 0.0, 0.0, 25.0);
        assert_eq!(cal.stillness_win_endtime_nanos, 0);
        assert_eq!(cal.watchdog_timeout_count(), 1);
        assert!(cal.watchdog_timed_out());
    }

    #[test]
    fn new_bias_available_is_gated_by_enable_flag() {
        let mut cal = new_cal();
        drive_still(&mut cal, 0, 6_000_000_000);
        cal.set_enabled(false);
        assert!(!cal.new_bias_available());
    }

    #[test]
    fn remove_bias_passes_through_when_disabled() {
        let mut cal = new_cal();
        cal.set_bias(0.01, -0.02, 0.03, 0);
        cal.set_enabled(false);
        assert_eq!(cal.remove_bias(1.0, 1.0, 1.0), (1.0, 1.0, 1.0));
        cal.set_enabled(true);
        let (x, y, z) = cal.remove_bias(1.0, 1.0, 1.0);
        assert!((x - 0.99).abs() < 1e-6);
        assert!((y - 1.02).abs() < 1e-6);
        assert!((z - 0.97).abs() < 1e-6);
    }
}
