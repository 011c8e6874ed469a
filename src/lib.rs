//! Sensor-hub micro-runtime core.
//!
//! Exposes the event dispatch kernel (task registry, event queue,
//! subscription table, dispatch loop, app lifecycle) and the gyroscope
//! online bias-calibration pipeline. All code here is host-testable; a
//! concrete co-processor target supplies the flash-programming, MPU and
//! transport layers behind the trait boundaries in `kernel::ports`.

#![deny(unused_must_use)]

pub mod calibration;
pub mod config;
pub mod diagnostics;
pub mod kernel;

mod error;

pub use error::Error;
