//! Shared-flash app region: framing, validation, and app lifecycle passes.

use super::ports::{AppRuntime, FlashPort};
use super::task::{PlatformInfo, Task, TaskRegistry};

/// Bytes an `AppHdr.magic` field must start with to be considered valid.
pub const APP_HDR_MAGIC: [u8; 4] = *b"SHUB";

/// Current on-wire `AppHdr` format version.
pub const APP_HDR_VER_CUR: u16 = 1;

/// Marker-nibble wildcard: an entry whose low nibble equals this value is
/// accepted regardless of whether it agrees with the high nibble.
pub const BL_FLASH_APP_ID: u8 = 0x0F;

/// Size in bytes of the on-wire `AppHdr` (magic + format_version + marker
/// + app_id + app_ver + rel_end).
pub const APP_HDR_WIRE_SIZE: usize = 24;

/// Byte offset of the `marker` field within the on-wire `AppHdr`, used to
/// address the in-place erase write.
const MARKER_FIELD_OFFSET: usize = 6;

/// Sentinel meaning "match any vendor" / "match any sequence id" in an
/// [`AppIdQuery`].
pub const APP_ID_ANY: u32 = u32::MAX;

/// `marker` field of an [`AppHdr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppHdrMarker {
    Valid,
    Deleted,
    Internal,
    /// Any on-wire value other than the three known markers.
    Unknown(u16),
}

impl AppHdrMarker {
    const VALID: u16 = 1;
    const DELETED: u16 = 2;
    const INTERNAL: u16 = 3;

    #[must_use]
    fn from_wire(v: u16) -> Self {
        match v {
            Self::VALID => Self::Valid,
            Self::DELETED => Self::Deleted,
            Self::INTERNAL => Self::Internal,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    fn to_wire(self) -> u16 {
        match self {
            Self::Valid => Self::VALID,
            Self::Deleted => Self::DELETED,
            Self::Internal => Self::INTERNAL,
            Self::Unknown(v) => v,
        }
    }
}

/// Immutable app descriptor at the head of every flash entry's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppHdr {
    pub app_id: u64,
    pub app_ver: u32,
    pub rel_end: u32,
    pub marker: AppHdrMarker,
}

impl AppHdr {
    /// Build a header with the current magic/format-version already set.
    #[must_use]
    pub fn new(app_id: u64, app_ver: u32, rel_end: u32, marker: AppHdrMarker) -> Self {
        Self {
            app_id,
            app_ver,
            rel_end,
            marker,
        }
    }

    /// High 32 bits of `app_id`: the vendor.
    #[must_use]
    pub fn vendor(&self) -> u32 {
        (self.app_id >> 32) as u32
    }

    /// Low 32 bits of `app_id`: the sequence id.
    #[must_use]
    pub fn seq_id(&self) -> u32 {
        self.app_id as u32
    }

    /// Parse from a payload buffer. Returns `None` if too short, the
    /// magic doesn't match, or the format version isn't current.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < APP_HDR_WIRE_SIZE {
            return None;
        }
        if payload[0..4] != APP_HDR_MAGIC {
            return None;
        }
        let format_version = u16::from_le_bytes([payload[4], payload[5]]);
        if format_version != APP_HDR_VER_CUR {
            return None;
        }
        let marker = AppHdrMarker::from_wire(u16::from_le_bytes([payload[6], payload[7]]));
        let app_id = u64::from_le_bytes(payload[8..16].try_into().unwrap());
        let app_ver = u32::from_le_bytes(payload[16..20].try_into().unwrap());
        let rel_end = u32::from_le_bytes(payload[20..24].try_into().unwrap());
        Some(Self {
            app_id,
            app_ver,
            rel_end,
            marker,
        })
    }

    /// Serialize into a fresh `APP_HDR_WIRE_SIZE`-byte buffer.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; APP_HDR_WIRE_SIZE] {
        let mut out = [0u8; APP_HDR_WIRE_SIZE];
        out[0..4].copy_from_slice(&APP_HDR_MAGIC);
        out[4..6].copy_from_slice(&APP_HDR_VER_CUR.to_le_bytes());
        out[6..8].copy_from_slice(&self.marker.to_wire().to_le_bytes());
        out[8..16].copy_from_slice(&self.app_id.to_le_bytes());
        out[16..20].copy_from_slice(&self.app_ver.to_le_bytes());
        out[20..24].copy_from_slice(&self.rel_end.to_le_bytes());
        out
    }

    /// True if this header is a well-formed, live app descriptor: its
    /// payload is long enough, magic/version already checked at parse
    /// time, and the marker is `VALID`.
    #[must_use]
    fn is_valid(&self, payload_len: usize) -> bool {
        payload_len >= APP_HDR_WIRE_SIZE && self.marker == AppHdrMarker::Valid
    }
}

/// One entry found while walking the shared app region.
#[derive(Debug, Clone, Copy)]
pub struct AppRegionEntry<'a> {
    pub payload: &'a [u8],
    /// Absolute byte offset of `payload` within the region, needed to
    /// address the marker field for an in-place erase.
    pub payload_offset: usize,
}

impl<'a> AppRegionEntry<'a> {
    #[must_use]
    pub fn header(&self) -> Option<AppHdr> {
        AppHdr::parse(self.payload)
    }

    /// Absolute offset of the `marker` field, for [`FlashPort::write_marker`].
    #[must_use]
    pub fn marker_offset(&self) -> usize {
        self.payload_offset + MARKER_FIELD_OFFSET
    }
}

/// Forward iterator over the shared app region's length-prefixed,
/// marker-nibble-validated entries.
pub struct AppRegionIterator<'a> {
    region: &'a [u8],
    pos: usize,
}

impl<'a> AppRegionIterator<'a> {
    #[must_use]
    pub fn new(region: &'a [u8]) -> Self {
        Self { region, pos: 0 }
    }
}

impl<'a> Iterator for AppRegionIterator<'a> {
    type Item = AppRegionEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos + 4 > self.region.len() {
                return None;
            }
            let marker_byte = self.region[self.pos];
            let len = (u32::from(self.region[self.pos + 1]) << 16)
                | (u32::from(self.region[self.pos + 2]) << 8)
                | u32::from(self.region[self.pos + 3]);
            let padded = (len + 3) & !3;
            let total_len = 4 + padded as usize + 4;
            if self.pos + total_len > self.region.len() {
                return None;
            }
            let payload_offset = self.pos + 4;
            let payload = &self.region[payload_offset..payload_offset + len as usize];
            self.pos += total_len;

            let id1 = marker_byte & 0x0F;
            let id2 = (marker_byte >> 4) & 0x0F;
            if id1 != id2 && id1 != BL_FLASH_APP_ID {
                continue;
            }
            return Some(AppRegionEntry {
                payload,
                payload_offset,
            });
        }
    }
}

/// Matches an `app_id` by optionally-wildcarded vendor/sequence-id.
#[derive(Debug, Clone, Copy)]
pub struct AppIdQuery {
    pub vendor: u32,
    pub seq_id: u32,
}

impl AppIdQuery {
    /// Matches any app.
    pub const ANY: Self = Self {
        vendor: APP_ID_ANY,
        seq_id: APP_ID_ANY,
    };

    #[must_use]
    pub fn matches(&self, app_id: u64) -> bool {
        let vendor = (app_id >> 32) as u32;
        let seq_id = app_id as u32;
        (self.vendor == APP_ID_ANY || self.vendor == vendor)
            && (self.seq_id == APP_ID_ANY || self.seq_id == seq_id)
    }
}

/// Packed counters returned by a start/stop/erase pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MgmtStatus {
    pub app_count: u8,
    pub task_count: u8,
    pub op_count: u8,
    pub erase_count: u8,
}

impl MgmtStatus {
    #[must_use]
    pub fn pack(self) -> u32 {
        u32::from(self.app_count)
            | (u32::from(self.task_count) << 8)
            | (u32::from(self.op_count) << 16)
            | (u32::from(self.erase_count) << 24)
    }
}

/// An app linked directly into the image rather than living in flash.
#[derive(Debug, Clone, Copy)]
pub struct StaticAppEntry {
    pub header: AppHdr,
}

fn load_app<R: AppRuntime>(
    registry: &mut TaskRegistry,
    runtime: &mut R,
    hdr: AppHdr,
) -> Option<u32> {
    if registry.is_full() {
        log::warn!("app {:#018x} cannot be started: task registry full", hdr.app_id);
        return None;
    }
    let mut platform_info = runtime.load(&hdr)?;
    let tid = registry.allocate_tid();
    if !runtime.init(&hdr, &mut platform_info, tid) {
        log::warn!("app {:#018x} failed to init", hdr.app_id);
        runtime.unload(&hdr, &mut platform_info);
        return None;
    }
    registry
        .insert(Task::new(tid, hdr, platform_info))
        .ok()
        .map(|()| tid)
}

fn stop_task<R: AppRuntime>(registry: &mut TaskRegistry, runtime: &mut R, tid: u32) -> bool {
    let Some(mut task) = registry.remove(tid) else {
        return false;
    };
    runtime.end(&task.app_header, &mut task.platform_info);
    runtime.unload(&task.app_header, &mut task.platform_info);
    true
}

/// Enumerate internal apps first (skipping duplicates already represented
/// in the registry), then run a flash-region start pass over every app id.
pub fn start_tasks<R: AppRuntime, F: FlashPort>(
    registry: &mut TaskRegistry,
    runtime: &mut R,
    flash: &mut F,
    internal_apps: &[StaticAppEntry],
) -> MgmtStatus {
    for entry in internal_apps {
        let hdr = entry.header;
        if hdr.marker != AppHdrMarker::Internal {
            log::warn!("invalid marker on internal app {:#018x}; ignored", hdr.app_id);
            continue;
        }
        if registry.find_by_app_id(hdr.app_id).is_some() {
            log::warn!(
                "internal app {:#018x} attempted to update an already-started internal app; ignored",
                hdr.app_id
            );
            continue;
        }
        load_app(registry, runtime, hdr);
    }
    start_apps(registry, runtime, flash, AppIdQuery::ANY)
}

/// Start-apps pass: for each valid flash entry matching `query`, keep
/// only the most recent copy, erasing older duplicates in flash by
/// writing `AppHdrMarker::Deleted` over their marker, skip apps already
/// represented in the registry, and start the rest.
pub fn start_apps<R: AppRuntime, F: FlashPort>(
    registry: &mut TaskRegistry,
    runtime: &mut R,
    flash: &mut F,
    query: AppIdQuery,
) -> MgmtStatus {
    let mut status = MgmtStatus::default();

    // Collect by value first, so the region borrow ends before `flash` is
    // needed mutably for `write_marker`.
    let entries: Vec<(AppHdr, usize, usize)> = AppRegionIterator::new(flash.region())
        .filter_map(|e| {
            let hdr = e.header()?;
            query.matches(hdr.app_id).then_some((hdr, e.payload.len(), e.marker_offset()))
        })
        .collect();

    // Group by app_id, keeping only the most recent (last-seen) copy;
    // older duplicates are erased in flash immediately.
    let mut seen_ids: Vec<u64> = Vec::new();
    let mut most_recent: Vec<(AppHdr, usize)> = Vec::new();
    for (hdr, payload_len, marker_offset) in entries.into_iter().rev() {
        if seen_ids.contains(&hdr.app_id) {
            if flash.write_marker(marker_offset, AppHdrMarker::Deleted) {
                status.erase_count = status.erase_count.saturating_add(1);
            }
            continue;
        }
        seen_ids.push(hdr.app_id);
        most_recent.push((hdr, payload_len));
    }
    most_recent.reverse();

    for (hdr, payload_len) in most_recent {
        if !hdr.is_valid(payload_len) {
            continue;
        }
        status.app_count = status.app_count.saturating_add(1);

        if registry.find_by_app_id(hdr.app_id).is_some() {
            status.task_count = status.task_count.saturating_add(1);
            continue;
        }

        if load_app(registry, runtime, hdr).is_some() {
            status.op_count = status.op_count.saturating_add(1);
        }
    }

    status
}

/// Stop (and optionally erase) every live task whose flash entry matches
/// `query`.
pub fn stop_or_erase_apps<R: AppRuntime, F: FlashPort>(
    registry: &mut TaskRegistry,
    runtime: &mut R,
    flash: &mut F,
    query: AppIdQuery,
    do_erase: bool,
) -> MgmtStatus {
    let mut status = MgmtStatus::default();

    // Collect the matches (header + payload length + marker offset) by
    // value first, so the region borrow ends before we need `flash` again
    // mutably for `write_marker`.
    let matches: Vec<(AppHdr, usize, usize)> = AppRegionIterator::new(flash.region())
        .filter_map(|e| {
            let hdr = e.header()?;
            query.matches(hdr.app_id).then_some((hdr, e.payload.len(), e.marker_offset()))
        })
        .collect();

    for (hdr, payload_len, marker_offset) in matches {
        if !hdr.is_valid(payload_len) {
            continue;
        }
        status.app_count = status.app_count.saturating_add(1);

        let Some(tid) = registry.tid_for_app_id(hdr.app_id) else {
            continue;
        };
        status.task_count = status.task_count.saturating_add(1);

        if hdr.marker != AppHdrMarker::Valid {
            continue;
        }
        if !stop_task(registry, runtime, tid) {
            continue;
        }
        status.op_count = status.op_count.saturating_add(1);

        if do_erase && flash.write_marker(marker_offset, AppHdrMarker::Deleted) {
            status.erase_count = status.erase_count.saturating_add(1);
        }
    }

    status
}
