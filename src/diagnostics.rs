//! Reset/fault logging and on-demand runtime metrics.
//!
//! Stores up to 4 fault entries in a ring buffer behind [`DiagnosticsStore`]
//! (a real target backs this with NVS or a reserved flash page; tests use a
//! plain in-memory map). Entries capture uptime, a short reason, and the
//! `error::Error` discriminant that triggered the fault, mirroring how the
//! kernel never panics on capacity exhaustion or malformed input (see
//! `error.rs`) but still wants a durable trail of what happened.

use serde::{Deserialize, Serialize};

const FAULT_RING_SLOTS: usize = 4;
const FAULT_INDEX_KEY: &str = "fault_idx";

/// Read/write/delete access to small named byte blobs. A real target
/// backs this with NVS or a reserved flash page; tests use a plain
/// in-memory map.
pub trait DiagnosticsStore {
    fn read(&self, key: &str, buf: &mut [u8]) -> Option<usize>;
    fn write(&mut self, key: &str, data: &[u8]) -> bool;
    fn delete(&mut self, key: &str);
    fn exists(&self, key: &str) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultEntry {
    pub uptime_secs: u64,
    pub reason: heapless::String<64>,
    pub code: u32,
}

impl FaultEntry {
    pub fn new(uptime_secs: u64, reason: &str, code: u32) -> Self {
        let mut r = heapless::String::new();
        let _ = r.push_str(&reason[..reason.len().min(63)]);
        Self {
            uptime_secs,
            reason: r,
            code,
        }
    }
}

/// Ring buffer of recent fault entries, persisted through a
/// [`DiagnosticsStore`].
#[derive(Default)]
pub struct FaultLog {
    write_index: usize,
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the write index from the store, or default to 0.
    pub fn init(&mut self, store: &dyn DiagnosticsStore) {
        let mut buf = [0u8; 4];
        if let Some(4) = store.read(FAULT_INDEX_KEY, &mut buf) {
            self.write_index = u32::from_le_bytes(buf) as usize % FAULT_RING_SLOTS;
        }
    }

    /// Write a fault entry to the next ring slot and advance the index.
    pub fn write_entry(&mut self, store: &mut dyn DiagnosticsStore, entry: &FaultEntry) {
        let slot_key = Self::slot_key(self.write_index);
        if let Ok(bytes) = postcard::to_allocvec(entry) {
            let _ = store.write(&slot_key, &bytes);
        }

        self.write_index = (self.write_index + 1) % FAULT_RING_SLOTS;
        let idx_bytes = (self.write_index as u32).to_le_bytes();
        let _ = store.write(FAULT_INDEX_KEY, &idx_bytes);
    }

    /// Read all stored fault entries (up to 4).
    pub fn read_all(&self, store: &dyn DiagnosticsStore) -> heapless::Vec<FaultEntry, FAULT_RING_SLOTS> {
        let mut entries = heapless::Vec::new();
        for i in 0..FAULT_RING_SLOTS {
            let slot_key = Self::slot_key(i);
            let mut buf = [0u8; 128];
            if let Some(len) = store.read(&slot_key, &mut buf) {
                if let Ok(entry) = postcard::from_bytes::<FaultEntry>(&buf[..len]) {
                    let _ = entries.push(entry);
                }
            }
        }
        entries
    }

    /// Erase all fault entries and reset the index.
    pub fn clear(&mut self, store: &mut dyn DiagnosticsStore) {
        for i in 0..FAULT_RING_SLOTS {
            store.delete(&Self::slot_key(i));
        }
        store.delete(FAULT_INDEX_KEY);
        self.write_index = 0;
    }

    pub fn count(&self, store: &dyn DiagnosticsStore) -> usize {
        (0..FAULT_RING_SLOTS).filter(|i| store.exists(&Self::slot_key(*i))).count()
    }

    fn slot_key(index: usize) -> heapless::String<16> {
        let mut s = heapless::String::new();
        let _ = core::fmt::Write::write_fmt(&mut s, format_args!("f{index}"));
        s
    }
}

/// A point-in-time snapshot of kernel occupancy and calibration health,
/// collected on demand (e.g. for a diagnostics RPC response).
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeMetrics {
    pub uptime_secs: u64,
    pub task_count: usize,
    pub task_capacity: usize,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub watchdog_timeout_count: u32,
    pub calibration_count: u32,
}

impl RuntimeMetrics {
    #[allow(clippy::too_many_arguments)]
    pub fn collect(
        uptime_secs: u64,
        task_count: usize,
        task_capacity: usize,
        queue_depth: usize,
        queue_capacity: usize,
        watchdog_timeout_count: u32,
        calibration_count: u32,
    ) -> Self {
        Self {
            uptime_secs,
            task_count,
            task_capacity,
            queue_depth,
            queue_capacity,
            watchdog_timeout_count,
            calibration_count,
        }
    }
}

/// Install a panic hook that logs before the default handler aborts.
///
/// The dispatch loop itself never panics on capacity exhaustion or
/// malformed input (see `error.rs`); this hook exists for genuine bugs
/// that still reach `panic!`, so at least the reason is logged before the
/// process (or, on a real target, the watchdog) takes the process down.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        log::error!("PANIC: {reason}");
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MockStore {
        data: RefCell<HashMap<String, Vec<u8>>>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                data: RefCell::new(HashMap::new()),
            }
        }
    }

    impl DiagnosticsStore for MockStore {
        fn read(&self, key: &str, buf: &mut [u8]) -> Option<usize> {
            let v = self.data.borrow().get(key)?.clone();
            let len = v.len().min(buf.len());
            buf[..len].copy_from_slice(&v[..len]);
            Some(len)
        }

        fn write(&mut self, key: &str, data: &[u8]) -> bool {
            self.data.borrow_mut().insert(key.to_string(), data.to_vec());
            true
        }

        fn delete(&mut self, key: &str) {
            self.data.borrow_mut().remove(key);
        }

        fn exists(&self, key: &str) -> bool {
            self.data.borrow().contains_key(key)
        }
    }

    #[test]
    fn fault_log_starts_at_zero() {
        let log = FaultLog::new();
        assert_eq!(log.write_index, 0);
    }

    #[test]
    fn write_and_read_single_entry() {
        let mut store = MockStore::new();
        let mut log = FaultLog::new();
        let entry = FaultEntry::new(42, "queue full", 7);

        log.write_entry(&mut store, &entry);
        let entries = log.read_all(&store);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].uptime_secs, 42);
        assert_eq!(entries[0].code, 7);
    }

    #[test]
    fn ring_buffer_wraps() {
        let mut store = MockStore::new();
        let mut log = FaultLog::new();

        for i in 0..6 {
            let entry = FaultEntry::new(i as u64, &format!("fault_{i}"), i as u32);
            log.write_entry(&mut store, &entry);
        }
        let entries = log.read_all(&store);
        assert_eq!(entries.len(), FAULT_RING_SLOTS);
    }

    #[test]
    fn clear_erases_all() {
        let mut store = MockStore::new();
        let mut log = FaultLog::new();

        log.write_entry(&mut store, &FaultEntry::new(1, "x", 0));
        log.write_entry(&mut store, &FaultEntry::new(2, "y", 0));
        log.clear(&mut store);

        let entries = log.read_all(&store);
        assert_eq!(entries.len(), 0);
        assert_eq!(log.write_index, 0);
    }

    #[test]
    fn fault_entry_truncates_long_reason() {
        let long = "a".repeat(200);
        let entry = FaultEntry::new(0, &long, 0);
        assert!(entry.reason.len() <= 63);
    }

    #[test]
    fn count_matches_entries() {
        let mut store = MockStore::new();
        let mut log = FaultLog::new();

        assert_eq!(log.count(&store), 0);
        log.write_entry(&mut store, &FaultEntry::new(1, "a", 0));
        assert_eq!(log.count(&store), 1);
        log.write_entry(&mut store, &FaultEntry::new(2, "b", 0));
        assert_eq!(log.count(&store), 2);
    }

    #[test]
    fn runtime_metrics_collects_reported_fields() {
        let m = RuntimeMetrics::collect(100, 3, 16, 2, 512, 1, 4);
        assert_eq!(m.task_count, 3);
        assert_eq!(m.watchdog_timeout_count, 1);
        assert_eq!(m.calibration_count, 4);
    }
}
