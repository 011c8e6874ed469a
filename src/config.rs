//! Runtime configuration parameters.
//!
//! The fixed-capacity kernel tables (task registry, event queue, embedded
//! subscription arrays, internal-action slab) size themselves from the
//! `pub const` capacities declared alongside each kernel module — those are
//! build-time constants on a real co-processor target and are not provisioned
//! at runtime. `RuntimeConfig` carries the values that genuinely are
//! provisionable: the tid allocation range and the gyro calibration
//! thresholds. Values can be overridden at boot from a provisioning blob the
//! host application processor delivers over its transport.

use serde::{Deserialize, Serialize};

/// Core runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Tid allocation range ---
    /// Lowest tid ever handed out by `allocate_tid`.
    pub first_valid_tid: u32,
    /// Highest tid ever handed out by `allocate_tid`.
    pub last_valid_tid: u32,

    // --- Gyro calibration gating ---
    /// Combined stillness-confidence threshold `conf_still` must exceed.
    pub stillness_threshold: f32,
    /// Max per-axis window-mean range before the mean-stability gate fails.
    pub stillness_mean_delta_limit: f32,
    /// Max temperature range (°C) before the temperature gate fails.
    pub temperature_delta_limit_celsius: f32,
    /// Minimum still duration (ns) required to emit a calibration on the
    /// still-to-not-still transition.
    pub min_still_duration_nanos: u64,
    /// Still duration (ns) after which a still period emits a calibration
    /// and restarts rather than continuing to accumulate.
    pub max_still_duration_nanos: u64,
    /// Stillness window duration (ns); the watchdog timeout is `2x` this.
    pub window_time_duration_nanos: u64,
    /// Whether the magnetometer detector participates in the stillness
    /// gate (disabled automatically by the watchdog if it never reports).
    pub using_mag_sensor: bool,

    // --- Per-sensor stillness detector tuning ---
    /// Variance threshold and confidence rolloff for the gyroscope's own
    /// stillness detector.
    pub gyro_var_threshold: f32,
    pub gyro_confidence_delta: f32,
    /// Variance threshold and confidence rolloff for the accelerometer's
    /// stillness detector.
    pub accel_var_threshold: f32,
    pub accel_confidence_delta: f32,
    /// Variance threshold and confidence rolloff for the magnetometer's
    /// stillness detector.
    pub mag_var_threshold: f32,
    pub mag_confidence_delta: f32,
}

impl RuntimeConfig {
    /// Build a [`crate::calibration::GyroCalConfig`] from the calibration
    /// gating fields.
    #[must_use]
    pub fn to_gyro_cal_config(&self) -> crate::calibration::GyroCalConfig {
        crate::calibration::GyroCalConfig {
            stillness_threshold: self.stillness_threshold,
            stillness_mean_delta_limit: self.stillness_mean_delta_limit,
            temperature_delta_limit_celsius: self.temperature_delta_limit_celsius,
            min_still_duration_nanos: self.min_still_duration_nanos,
            max_still_duration_nanos: self.max_still_duration_nanos,
            window_time_duration_nanos: self.window_time_duration_nanos,
            using_mag_sensor: self.using_mag_sensor,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            // Tid allocation range
            first_valid_tid: 1,
            last_valid_tid: 0x7FFF_FFFF,

            // Gyro calibration gating
            stillness_threshold: 0.95,
            stillness_mean_delta_limit: 0.000_313, // ~0.018 deg/s, matches gyro_cal.c default
            temperature_delta_limit_celsius: 1.5,
            min_still_duration_nanos: 5 * 1_000_000_000, // 5 s
            max_still_duration_nanos: 600 * 1_000_000_000, // 10 min
            window_time_duration_nanos: 1_500_000_000,   // 1.5 s
            using_mag_sensor: true,

            gyro_var_threshold: 0.000_015_26,
            gyro_confidence_delta: 0.000_244,
            accel_var_threshold: 0.001_95,
            accel_confidence_delta: 0.001_95,
            mag_var_threshold: 0.000_862,
            mag_confidence_delta: 0.001_72,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_gyro_cal_config_carries_gating_fields() {
        let cfg = RuntimeConfig::default();
        let gyro_cfg = cfg.to_gyro_cal_config();
        assert_eq!(gyro_cfg.stillness_threshold, cfg.stillness_threshold);
        assert_eq!(gyro_cfg.window_time_duration_nanos, cfg.window_time_duration_nanos);
        assert_eq!(gyro_cfg.using_mag_sensor, cfg.using_mag_sensor);
    }
}
