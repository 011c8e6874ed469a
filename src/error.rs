#![allow(dead_code)] // Error variants reserved for callers beyond this crate's own tests

//! Unified error types for the sensor-hub runtime core.
//!
//! Follows embedded best practice: a single `Error` enum that every
//! subsystem can convert into, keeping a host application's error handling
//! uniform. All variants are `Copy` so they can be cheaply passed around
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level runtime error
// ---------------------------------------------------------------------------

/// Every fallible operation in the runtime core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A kernel-level operation (registry, queue, subscriptions) failed.
    Kernel(KernelError),
    /// A flash app-region entry was malformed or a lifecycle op failed.
    Flash(FlashError),
    /// A gyroscope calibration invariant was violated.
    Calibration(CalibrationError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel(e) => write!(f, "kernel: {e}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Kernel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The task registry is at `MAX_TASKS` capacity.
    RegistryFull,
    /// No live task matches the requested tid or app id.
    TaskNotFound,
    /// The event queue is full and the event was not discardable.
    QueueFull,
    /// The internal-action slab has no free slots.
    SlabExhausted,
    /// A subscription-list heap growth allocation failed.
    SubscriptionAllocFailed,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryFull => write!(f, "task registry full"),
            Self::TaskNotFound => write!(f, "task not found"),
            Self::QueueFull => write!(f, "event queue full"),
            Self::SlabExhausted => write!(f, "internal action slab exhausted"),
            Self::SubscriptionAllocFailed => write!(f, "subscription list allocation failed"),
        }
    }
}

impl From<KernelError> for Error {
    fn from(e: KernelError) -> Self {
        Self::Kernel(e)
    }
}

// ---------------------------------------------------------------------------
// Flash app-region errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Entry marker nibbles disagree and the id is not `BL_FLASH_APP_ID`.
    MarkerMismatch,
    /// CRC-32 footer does not match header+payload.
    CrcMismatch,
    /// Payload `AppHdr` magic, format version, or marker is invalid.
    InvalidHeader,
    /// The next entry would run past the end of the shared region.
    RegionOverrun,
    /// App load or init failed; the task slot has been reclaimed.
    LoadFailed,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkerMismatch => write!(f, "entry marker mismatch"),
            Self::CrcMismatch => write!(f, "entry CRC mismatch"),
            Self::InvalidHeader => write!(f, "invalid app header"),
            Self::RegionOverrun => write!(f, "entry overruns region"),
            Self::LoadFailed => write!(f, "app load/init failed"),
        }
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// A computed bias axis exceeded `MAX_GYRO_BIAS`; calibration rejected.
    BiasOutOfRange,
    /// The gyro sample stream stalled past the watchdog timeout.
    WatchdogTimeout,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BiasOutOfRange => write!(f, "bias out of range"),
            Self::WatchdogTimeout => write!(f, "sensor stream watchdog timeout"),
        }
    }
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Runtime-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
