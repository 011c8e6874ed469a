//! End-to-end scenarios for the gyroscope bias calibrator driven through
//! its public `update_*` entry points, exercising timing edge cases a
//! unit test co-located with `gyro_cal.rs` wouldn't on its own: minimum
//! stillness duration, bias acceptance/rejection at the calibrator
//! boundary, and watchdog recovery from a stalled gyro stream.

use sensorhub_core::calibration::{GyroCal, GyroCalConfig, VarianceStillnessDetector, MAX_GYRO_BIAS};

fn config(min_still_secs: f64, max_still_secs: f64, window_ms: u64) -> GyroCalConfig {
    GyroCalConfig {
        stillness_threshold: 0.95,
        stillness_mean_delta_limit: 0.000_313,
        temperature_delta_limit_celsius: 1.5,
        min_still_duration_nanos: (min_still_secs * 1e9) as u64,
        max_still_duration_nanos: (max_still_secs * 1e9) as u64,
        window_time_duration_nanos: window_ms * 1_000_000,
        using_mag_sensor: false,
    }
}

fn new_cal(cfg: GyroCalConfig) -> GyroCal<VarianceStillnessDetector> {
    GyroCal::new(
        VarianceStillnessDetector::new(0.001, 0.01),
        VarianceStillnessDetector::new(0.001, 0.01),
        VarianceStillnessDetector::new(0.001, 0.01),
        cfg,
    )
}

fn drive_stillness(cal: &mut GyroCal<VarianceStillnessDetector>, start_nanos: u64, end_nanos: u64, gyro: [f32; 3]) {
    let mut t = start_nanos;
    while t <= end_nanos {
        cal.update_accel(t, 0.0, 0.0, 9.81);
        cal.update_gyro(t, gyro[0], gyro[1], gyro[2], 25.0);
        t += 100_000_000;
    }
}

/// Shakes the accelerometer while the gyroscope keeps reporting the same
/// constant reading: the accelerometer's stillness confidence collapses
/// (the device was picked up and jostled) while the gyro mean for this
/// window stays exactly `gyro_bias`, matching the still-to-not-still
/// emission path where the emitted mean comes from the window that just
/// triggered the not-still verdict, not from the still period before it.
fn drive_accel_jitter(cal: &mut GyroCal<VarianceStillnessDetector>, start_nanos: u64, samples: u32, gyro_bias: [f32; 3]) {
    let mut t = start_nanos;
    for i in 0..samples {
        let jitter = if i % 2 == 0 { 5.0 } else { -5.0 };
        cal.update_accel(t, jitter, jitter, 9.81);
        cal.update_gyro(t, gyro_bias[0], gyro_bias[1], gyro_bias[2], 25.0);
        t += 100_000_000;
    }
}

#[test]
fn min_duration_reject_short_stillness_emits_nothing() {
    let mut cal = new_cal(config(1.0, 10.0, 100));
    let bias = [0.001, -0.002, 0.0005];
    drive_stillness(&mut cal, 0, 500_000_000, bias);
    drive_accel_jitter(&mut cal, 600_000_000, 5, bias);
    assert!(!cal.new_bias_available());
    assert_eq!(cal.calibration_count(), 0);
}

#[test]
fn accept_long_stillness_reports_gyro_window_mean_as_bias() {
    let mut cal = new_cal(config(1.0, 10.0, 100));
    let bias = [0.001, -0.002, 0.0005];
    drive_stillness(&mut cal, 0, 2_000_000_000, bias);
    drive_accel_jitter(&mut cal, 2_100_000_000, 3, bias);

    assert!(cal.new_bias_available());
    let (bx, by, bz, temp) = cal.get_bias();
    assert!((bx - bias[0]).abs() < 1e-4);
    assert!((by - bias[1]).abs() < 1e-4);
    assert!((bz - bias[2]).abs() < 1e-4);
    assert!((temp - 25.0).abs() < 1e-3);
}

#[test]
fn reject_out_of_range_mean_keeps_state_resetting_for_next_window() {
    let mut cal = new_cal(config(1.0, 10.0, 100));
    let out_of_range = [0.2, 0.0, 0.0];
    drive_stillness(&mut cal, 0, 2_000_000_000, out_of_range);
    drive_accel_jitter(&mut cal, 2_100_000_000, 3, out_of_range);

    assert!(!cal.new_bias_available());
    assert_eq!(cal.calibration_count(), 0);

    // State still resets cleanly: a subsequent in-range stillness period
    // calibrates normally.
    let in_range = [0.001, 0.001, 0.001];
    drive_stillness(&mut cal, 3_000_000_000, 5_000_000_000, in_range);
    drive_accel_jitter(&mut cal, 5_100_000_000, 3, in_range);
    assert!(cal.new_bias_available());
    let (bx, _, _, _) = cal.get_bias();
    assert!(bx.abs() < MAX_GYRO_BIAS);
}

#[test]
fn watchdog_recovers_from_stalled_gyro_stream() {
    let mut cal = new_cal(config(1.0, 10.0, 500));
    cal.update_gyro(1_000_000, 0.0, 0.0, 0.0, 25.0);

    // No sample arrives until well past two window durations later.
    cal.update_gyro(1_600_000_000, 0.0, 0.0, 0.0, 25.0);

    assert_eq!(cal.watchdog_timeout_count(), 1);
    assert!(cal.watchdog_timed_out());
}
