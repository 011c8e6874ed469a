//! Hexagonal ports: trait boundaries the kernel consumes but does not
//! implement. A real co-processor target provides concrete adapters; the
//! crate's own tests provide simple in-memory ones.

use super::apps::AppHdr;
use super::dispatch::RetentionSlot;
use super::task::PlatformInfo;

/// Loads, initializes, tears down and delivers events to an app. Models
/// the external CPU app loader/executor (`cpuAppLoad`/`cpuAppInit`/
/// `cpuAppEnd`/`cpuAppUnload`/`cpuAppHandle` in the reference kernel).
pub trait AppRuntime {
    /// Load the app described by `hdr`, producing its platform-specific
    /// state. Returns `None` on load failure.
    fn load(&mut self, hdr: &AppHdr) -> Option<PlatformInfo>;

    /// Initialize a freshly loaded app now that it has been assigned
    /// `tid`. Returns `false` on init failure, in which case the caller
    /// unloads the app and reclaims the task slot.
    fn init(&mut self, hdr: &AppHdr, platform_info: &mut PlatformInfo, tid: u32) -> bool;

    /// Tear down a running app before it is unloaded.
    fn end(&mut self, hdr: &AppHdr, platform_info: &mut PlatformInfo);

    /// Release platform resources for an app that is not (or no longer)
    /// running.
    fn unload(&mut self, hdr: &AppHdr, platform_info: &mut PlatformInfo);

    /// Deliver an event to a running app. `retention` lets the app take
    /// ownership of `data` past the end of this call; see
    /// [`RetentionSlot`].
    fn handle(
        &mut self,
        hdr: &AppHdr,
        platform_info: &mut PlatformInfo,
        evt_type: u32,
        data: *mut u8,
        retention: &mut RetentionSlot<'_>,
    );
}

/// Read/erase access to the shared flash app region. A real target gates
/// writes behind flash-key authentication and briefly toggles MPU RAM
/// execution around the write; this crate's tests use a plain byte
/// buffer.
pub trait FlashPort {
    /// The current contents of the shared app region.
    fn region(&self) -> &[u8];

    /// Overwrite the 2-byte marker field at `marker_offset` (an absolute
    /// offset into `region()`) with `marker`'s on-wire encoding. Returns
    /// `false` if the write could not be committed.
    fn write_marker(&mut self, marker_offset: usize, marker: super::apps::AppHdrMarker) -> bool;
}
