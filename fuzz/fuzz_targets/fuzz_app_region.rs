//! Fuzz target: `AppRegionIterator`
//!
//! Drives arbitrary byte sequences through the shared flash app-region
//! iterator and asserts it never panics on malformed framing (short
//! length, truncated payload, garbage marker nibbles) and never yields a
//! header whose declared size runs past the region it was parsed from.
//!
//! cargo fuzz run fuzz_app_region

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensorhub_core::kernel::apps::AppRegionIterator;

fuzz_target!(|data: &[u8]| {
    for entry in AppRegionIterator::new(data) {
        if let Some(hdr) = entry.header() {
            assert!(entry.marker_offset() <= data.len(), "marker offset escaped the region");
            assert!(hdr.rel_end as usize <= data.len(), "app size exceeds region length");
        }
    }
});
